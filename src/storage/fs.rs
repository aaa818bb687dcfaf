use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{normalize_folder, validate_pathname, BlobObject, BlobStore, Result, StorageError};

/// Blob store backed by a local directory tree. Pathnames map directly onto
/// paths below `root`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, pathname: &str) -> Result<PathBuf> {
        validate_pathname(pathname)?;
        Ok(self.root.join(pathname))
    }

    fn object_for(pathname: String, path: &Path, metadata: &std::fs::Metadata) -> BlobObject {
        BlobObject {
            url: format!("file://{}", path.display()),
            pathname,
            size: metadata.len(),
            uploaded_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn list(&self, folder: &str) -> Result<Vec<BlobObject>> {
        let folder = normalize_folder(folder);
        let dir = if folder.is_empty() {
            self.root.clone()
        } else {
            validate_pathname(folder)?;
            self.root.join(folder)
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // A partition nothing has been written to yet
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let pathname = if folder.is_empty() {
                name
            } else {
                format!("{}/{}", folder, name)
            };
            objects.push(Self::object_for(pathname, &entry.path(), &metadata));
        }
        objects.sort_by(|a, b| a.pathname.cmp(&b.pathname));

        Ok(objects)
    }

    async fn get(&self, pathname: &str) -> Result<Vec<u8>> {
        let path = self.path_for(pathname)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(pathname.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, pathname: &str, bytes: Vec<u8>, _content_type: &str) -> Result<BlobObject> {
        let path = self.path_for(pathname)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &bytes).await?;
        let metadata = fs::metadata(&path).await?;

        debug!("Wrote blob {} to {}", pathname, path.display());
        Ok(Self::object_for(pathname.to_string(), &path, &metadata))
    }

    async fn delete(&self, pathnames: &[String]) -> Result<()> {
        for pathname in pathnames {
            let path = self.path_for(pathname)?;
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed blob {}", pathname),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
