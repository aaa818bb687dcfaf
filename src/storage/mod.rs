pub mod fs;
pub mod in_memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

pub use fs::FsBlobStore;
pub use in_memory::InMemoryBlobStore;
pub use supabase::SupabaseBlobStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob pathname: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// An object held by the blob store. `pathname` is relative to the store
/// root, e.g. `gallery/3f2c.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobObject {
    pub pathname: String,
    pub url: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Object storage used as the catalog's only persistence.
///
/// `list` is not recursive: it returns the objects directly inside `folder`,
/// ordered by pathname. `get` always reads the latest stored bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list(&self, folder: &str) -> Result<Vec<BlobObject>>;
    async fn get(&self, pathname: &str) -> Result<Vec<u8>>;
    async fn put(&self, pathname: &str, bytes: Vec<u8>, content_type: &str) -> Result<BlobObject>;
    /// Missing pathnames are ignored.
    async fn delete(&self, pathnames: &[String]) -> Result<()>;
}

/// Reject pathnames that could escape the store root or address a folder.
pub fn validate_pathname(pathname: &str) -> Result<()> {
    let invalid = pathname.is_empty()
        || pathname.starts_with('/')
        || pathname.ends_with('/')
        || pathname.contains('\\')
        || pathname.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(StorageError::InvalidPath(pathname.to_string()));
    }
    Ok(())
}

pub(crate) fn normalize_folder(folder: &str) -> &str {
    folder.trim_matches('/')
}

/// Build the configured blob store.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.backend {
        StorageBackend::Supabase => {
            let store = SupabaseBlobStore::new(&config.supabase)?;
            info!(bucket = %config.supabase.bucket.as_deref().unwrap_or_default(), "Using Supabase blob store");
            Arc::new(store)
        }
        StorageBackend::Fs => {
            info!(root = %config.root.display(), "Using filesystem blob store");
            Arc::new(FsBlobStore::new(config.root.clone()))
        }
        StorageBackend::Memory => {
            info!("Using in-memory blob store");
            Arc::new(InMemoryBlobStore::new())
        }
    };
    Ok(store)
}
