//! Reading the diploma template and compositing overlays onto it.

pub mod merge;
pub mod overlay;

use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId};

use crate::error::{Error, Result};

/// The fixed-layout background document every diploma is built on.
#[derive(Debug)]
pub struct Template {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// First-page width and height in points (1/72 inch).
    pub page_size: (f32, f32),
}

impl Template {
    /// Load the template, probing a handful of locations because deployed
    /// working directories differ from local ones.
    pub fn open(configured: &Path) -> Result<Self> {
        let path = resolve_template_path(configured)?;
        let bytes = std::fs::read(&path)?;
        let doc = Document::load_mem(&bytes)?;
        let page = first_page(&doc)?;
        let page_size = page_size(&doc, page)?;
        Ok(Self {
            path,
            bytes,
            page_size,
        })
    }
}

/// Try the configured path as-is, then relative to the current directory,
/// the executable's directory, and an `assets/` subdirectory.
fn resolve_template_path(configured: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = vec![configured.to_path_buf()];

    if configured.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(configured));
            if let Some(name) = configured.file_name() {
                candidates.push(cwd.join("assets").join(name));
            }
        }
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            candidates.push(exe_dir.join(configured));
        }
    }

    for candidate in &candidates {
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }

    let probed = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::TemplateNotFound(probed))
}

pub(crate) fn first_page(doc: &Document) -> Result<ObjectId> {
    doc.get_pages()
        .into_iter()
        .next()
        .map(|(_, id)| id)
        .ok_or_else(|| Error::MalformedPdf("document has no pages".into()))
}

/// Page width and height from the MediaBox, walking up to the page tree
/// when the attribute is inherited.
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> Result<(f32, f32)> {
    let mut dict = doc.get_object(page_id)?.as_dict()?;
    loop {
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let media_box = match media_box {
                Object::Reference(id) => doc.get_object(*id)?,
                other => other,
            };
            let coords = media_box.as_array()?;
            if coords.len() != 4 {
                return Err(Error::MalformedPdf("MediaBox is not a 4-element array".into()));
            }
            let mut nums = [0f32; 4];
            for (slot, obj) in nums.iter_mut().zip(coords.iter()) {
                *slot = number(obj)
                    .ok_or_else(|| Error::MalformedPdf("non-numeric MediaBox entry".into()))?;
            }
            return Ok((nums[2] - nums[0], nums[3] - nums[1]));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => dict = doc.get_object(*parent)?.as_dict()?,
            _ => return Err(Error::MalformedPdf("page has no MediaBox".into())),
        }
    }
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_template_reports_probed_paths() {
        let err = Template::open(Path::new("no-such-template.pdf")).unwrap_err();
        match err {
            Error::TemplateNotFound(probed) => {
                assert!(probed.contains("no-such-template.pdf"));
                // Several candidates, comma separated.
                assert!(probed.contains(", "));
            }
            other => panic!("expected TemplateNotFound, got {other:?}"),
        }
    }

    #[test]
    fn reads_page_size_from_generated_document() {
        let bytes = crate::pdf::merge::tests_support::blank_document(842.0, 595.0, "PLANTILLA");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&bytes).unwrap();

        let template = Template::open(&path).unwrap();
        assert!((template.page_size.0 - 842.0).abs() < 0.01);
        assert!((template.page_size.1 - 595.0).abs() < 0.01);
        assert_eq!(template.bytes, bytes);
    }
}
