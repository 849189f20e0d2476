use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{ImageStore, ImageUpload, UploadError};

/// Writes uploads into a directory that the router serves under `/uploads`.
#[derive(Debug, Clone)]
pub struct DiskImageStore {
    dir: PathBuf,
    public_base_url: String,
}

impl DiskImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn upload(&self, image: &ImageUpload, extension: &str) -> Result<String, UploadError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| UploadError(format!("cannot create {}: {}", self.dir.display(), e)))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|e| UploadError(format!("cannot write {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), bytes = image.bytes.len(), "Stored image");
        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            file_name
        ))
    }
}
