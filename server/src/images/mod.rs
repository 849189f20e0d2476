//! Image collaborator: takes raw bytes, hands back a durable public URL.

use async_trait::async_trait;
use thiserror::Error;

use crate::utils::error::AppError;

pub mod disk;
pub mod memory;

pub use disk::DiskImageStore;
pub use memory::MemoryImageStore;

#[derive(Debug, Error)]
#[error("image upload failed: {0}")]
pub struct UploadError(pub String);

/// An image as received from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: Option<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// File extension for the upload, from its content type or, failing
    /// that, its file name. Anything but png/jpeg/webp/gif is rejected.
    pub fn extension(&self) -> Result<&'static str, AppError> {
        if self.bytes.is_empty() {
            return Err(AppError::ValidationError("Image file is empty".to_string()));
        }

        let from_type = self
            .content_type
            .as_deref()
            .and_then(|ct| match ct.trim().to_lowercase().as_str() {
                "image/png" => Some("png"),
                "image/jpeg" | "image/jpg" => Some("jpg"),
                "image/webp" => Some("webp"),
                "image/gif" => Some("gif"),
                _ => None,
            });

        let from_name = || {
            let name = self.file_name.as_deref()?;
            let (_, ext) = name.rsplit_once('.')?;
            match ext.to_lowercase().as_str() {
                "png" => Some("png"),
                "jpg" | "jpeg" => Some("jpg"),
                "webp" => Some("webp"),
                "gif" => Some("gif"),
                _ => None,
            }
        };

        from_type.or_else(from_name).ok_or_else(|| {
            AppError::ValidationError(
                "Unsupported image type: expected png, jpeg, webp or gif".to_string(),
            )
        })
    }
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persists the image and returns its public URL.
    async fn upload(&self, image: &ImageUpload, extension: &str) -> Result<String, UploadError>;
}
