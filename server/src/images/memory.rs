use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{ImageStore, ImageUpload, UploadError};

/// Keeps uploaded images in memory. Can be switched into a failing mode.
#[derive(Default)]
pub struct MemoryImageStore {
    urls: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.urls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(&self, _image: &ImageUpload, extension: &str) -> Result<String, UploadError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(UploadError("image store unavailable".to_string()));
        }

        let url = format!("memory://images/{}.{}", Uuid::new_v4(), extension);
        self.urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.clone());
        Ok(url)
    }
}
