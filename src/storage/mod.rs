//! Document publishing: local output directory or a Supabase-style object
//! storage bucket. Either way a publish returns a [`Locator`] tagged with
//! the backend kind, which is what the ledger persists.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{Config, RemoteStorageConfig};
use crate::error::{Error, Result};

/// Where a published document lives. Persisted next to the locator so
/// display code never has to sniff URL prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "storage_kind")]
pub enum StorageKind {
    #[sqlx(rename = "LOCAL")]
    #[serde(rename = "LOCAL")]
    Local,
    #[sqlx(rename = "REMOTE")]
    #[serde(rename = "REMOTE")]
    Remote,
}

/// A stable reference to published document bytes: a filesystem path for
/// local mode, a public HTTPS URL for remote mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locator {
    pub kind: StorageKind,
    pub value: String,
}

impl Locator {
    /// Href the portal hands to a browser. Local documents are served from
    /// the /pdfs route rather than exposing filesystem paths.
    pub fn public_href(&self) -> String {
        match self.kind {
            StorageKind::Remote => self.value.clone(),
            StorageKind::Local => {
                let name = Path::new(&self.value)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("/pdfs/{}", name)
            }
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Local { dir: PathBuf },
    Remote(RemoteStore),
}

impl Storage {
    pub fn from_config(config: &Config) -> Self {
        match &config.remote_storage {
            Some(remote) => Self::remote(remote.clone()),
            None => Self::local(config.output_dir.clone()),
        }
    }

    pub fn local(dir: PathBuf) -> Self {
        Self {
            backend: Backend::Local { dir },
        }
    }

    pub fn remote(config: RemoteStorageConfig) -> Self {
        Self {
            backend: Backend::Remote(RemoteStore::new(config)),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self.backend {
            Backend::Local { .. } => StorageKind::Local,
            Backend::Remote(_) => StorageKind::Remote,
        }
    }

    /// The remote store, when one is configured. The sync pass needs it
    /// directly because it uploads regardless of the default backend.
    pub fn remote_store(&self) -> Option<&RemoteStore> {
        match &self.backend {
            Backend::Remote(store) => Some(store),
            Backend::Local { .. } => None,
        }
    }

    /// Persist `bytes` under `name`, overwriting any previous object with
    /// the same name. Republish under the same name is how regeneration
    /// flows repair storage.
    pub async fn publish(&self, bytes: &[u8], name: &str) -> Result<Locator> {
        match &self.backend {
            Backend::Local { dir } => {
                let path = dir.join(name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| Error::PublishError(format!("{}: {}", parent.display(), e)))?;
                }
                std::fs::write(&path, bytes)
                    .map_err(|e| Error::PublishError(format!("{}: {}", path.display(), e)))?;
                Ok(Locator {
                    kind: StorageKind::Local,
                    value: path.to_string_lossy().replace('\\', "/"),
                })
            }
            Backend::Remote(store) => store.publish(bytes, name).await,
        }
    }

    /// Remove the object named `name`. Returns whether anything was there.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        match &self.backend {
            Backend::Local { dir } => match std::fs::remove_file(dir.join(name)) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            },
            Backend::Remote(store) => store.delete(name).await,
        }
    }

    /// Locator for `name` without touching the backend.
    pub fn public_locator(&self, name: &str) -> Locator {
        match &self.backend {
            Backend::Local { dir } => Locator {
                kind: StorageKind::Local,
                value: dir.join(name).to_string_lossy().replace('\\', "/"),
            },
            Backend::Remote(store) => store.public_locator(name),
        }
    }
}

/// Supabase Storage v1 client: bearer-token auth, upsert-by-name uploads,
/// public-bucket URLs.
#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl RemoteStore {
    pub fn new(config: RemoteStorageConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.base_url,
            service_key: config.service_key,
            bucket: config.bucket,
        }
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, name)
    }

    pub async fn publish(&self, bytes: &[u8], name: &str) -> Result<Locator> {
        let resp = self
            .client
            .post(self.object_url(name))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .header("x-upsert", "true")
            .body(bytes.to_vec())
            .send()
            .await?;

        match resp.status().as_u16() {
            200 | 201 | 204 => Ok(self.public_locator(name)),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::PublishError(format!("{} {}", status, body)))
            }
        }
    }

    pub async fn delete(&self, name: &str) -> Result<bool> {
        let resp = self
            .client
            .delete(self.object_url(name))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?;
        Ok(matches!(resp.status().as_u16(), 200 | 204))
    }

    pub fn public_locator(&self, name: &str) -> Locator {
        Locator {
            kind: StorageKind::Remote,
            value: format!(
                "{}/storage/v1/object/public/{}/{}",
                self.base_url, self.bucket, name
            ),
        }
    }
}

pub fn ensure_dirs(output_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(output_dir)
}
