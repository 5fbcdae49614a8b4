//! Content digests for published documents.
//!
//! The stored digest is what external parties recompute to confirm a
//! fetched diploma has not drifted from the ledger.

use sha2::{Digest, Sha256};
use std::io::Read;

/// Read in 1 MiB chunks so arbitrarily large documents hash in bounded
/// memory.
const HASH_CHUNK: usize = 1 << 20;

/// SHA-256 of everything `reader` yields, as lowercase hex.
pub fn sha256_hex_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(&hasher.finalize()))
}

/// SHA-256 of an in-memory buffer, as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn known_vectors() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn reader_matches_buffer_across_chunk_boundaries() {
        // 3 MiB + 17 bytes forces several chunks plus a ragged tail.
        let data: Vec<u8> = (0..(3 * HASH_CHUNK + 17)).map(|i| (i % 251) as u8).collect();
        let whole = sha256_hex(&data);
        let streamed = sha256_hex_reader(Cursor::new(&data)).unwrap();
        assert_eq!(whole, streamed);
        assert_eq!(whole.len(), 64);
        assert!(whole.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
