use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{normalize_folder, validate_pathname, BlobObject, BlobStore, Result, StorageError};

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
    uploaded_at: DateTime<Utc>,
}

/// In-memory blob store for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<Mutex<BTreeMap<String, StoredBlob>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> MutexGuard<'_, BTreeMap<String, StoredBlob>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn object_for(pathname: &str, blob: &StoredBlob) -> BlobObject {
        BlobObject {
            pathname: pathname.to_string(),
            url: format!("memory://{}", pathname),
            size: blob.bytes.len() as u64,
            uploaded_at: Some(blob.uploaded_at),
        }
    }

    /// Store raw bytes without validation. Lets tests seed arbitrary legacy
    /// or malformed blobs.
    pub fn insert_raw(&self, pathname: &str, bytes: impl Into<Vec<u8>>) {
        self.blobs().insert(
            pathname.to_string(),
            StoredBlob {
                bytes: bytes.into(),
                content_type: "application/octet-stream".to_string(),
                uploaded_at: Utc::now(),
            },
        );
    }

    pub fn contains(&self, pathname: &str) -> bool {
        self.blobs().contains_key(pathname)
    }

    pub fn content_type(&self, pathname: &str) -> Option<String> {
        self.blobs().get(pathname).map(|blob| blob.content_type.clone())
    }

    pub fn pathnames(&self) -> Vec<String> {
        self.blobs().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn list(&self, folder: &str) -> Result<Vec<BlobObject>> {
        let folder = normalize_folder(folder);
        let blobs = self.blobs();
        let objects = blobs
            .iter()
            .filter(|(pathname, _)| match pathname.rsplit_once('/') {
                Some((parent, _)) => parent == folder,
                None => folder.is_empty(),
            })
            .map(|(pathname, blob)| Self::object_for(pathname, blob))
            .collect();
        Ok(objects)
    }

    async fn get(&self, pathname: &str) -> Result<Vec<u8>> {
        self.blobs()
            .get(pathname)
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(pathname.to_string()))
    }

    async fn put(&self, pathname: &str, bytes: Vec<u8>, content_type: &str) -> Result<BlobObject> {
        validate_pathname(pathname)?;
        let blob = StoredBlob {
            bytes,
            content_type: content_type.to_string(),
            uploaded_at: Utc::now(),
        };
        let object = Self::object_for(pathname, &blob);
        self.blobs().insert(pathname.to_string(), blob);

        debug!("Stored blob {} ({} bytes)", pathname, object.size);
        Ok(object)
    }

    async fn delete(&self, pathnames: &[String]) -> Result<()> {
        let mut blobs = self.blobs();
        for pathname in pathnames {
            if blobs.remove(pathname).is_some() {
                debug!("Deleted blob {}", pathname);
            }
        }
        Ok(())
    }
}
