//! Post image validation and storage.

use std::sync::Arc;

use bytes::Bytes;
use image::ImageFormat;
use yatube_common::{AppError, AppResult, StorageBackend, generate_storage_key};

/// Storage prefix for post images.
const POST_IMAGE_PREFIX: &str = "posts";

/// Shown next to the image field when an upload is refused.
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A file received from an upload form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Name the client gave the file.
    pub filename: String,
    /// Raw file contents.
    pub data: Bytes,
}

impl ImageUpload {
    /// Whether the form field was left empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An upload that decoded as a supported image.
#[derive(Debug, Clone)]
pub struct CheckedImage {
    data: Bytes,
    format: ImageFormat,
}

/// Validates uploads and writes them to storage.
#[derive(Clone)]
pub struct ImageService {
    storage: Arc<dyn StorageBackend>,
}

impl ImageService {
    /// Create a new image service.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Check that `upload` is a JPEG, PNG, GIF or WebP image that decodes.
    ///
    /// `None` means the upload was refused. Decoding runs on the blocking pool.
    pub async fn check(&self, upload: &ImageUpload) -> AppResult<Option<CheckedImage>> {
        let upload = upload.clone();
        tokio::task::spawn_blocking(move || decode(upload))
            .await
            .map_err(|e| AppError::Internal(format!("Image check failed: {e}")))
    }

    /// Store a checked image and return its storage key.
    pub async fn store(&self, image: &CheckedImage) -> AppResult<String> {
        let extension = image.format.extensions_str().first().copied().unwrap_or("bin");
        let key = generate_storage_key(POST_IMAGE_PREFIX, extension);

        self.storage
            .upload(&key, &image.data, image.format.to_mime_type())
            .await?;

        Ok(key)
    }

    /// Public URL of a stored image.
    #[must_use]
    pub fn url(&self, key: &str) -> String {
        self.storage.public_url(key)
    }

    /// Remove a stored image that no post refers to any more.
    ///
    /// The post row is already written, so a failure is logged, not returned.
    pub async fn discard(&self, key: &str) {
        match self.storage.delete(key).await {
            Ok(()) => tracing::debug!(key, "Removed image"),
            Err(e) => tracing::warn!(key, error = %e, "Failed to remove image"),
        }
    }
}

fn decode(upload: ImageUpload) -> Option<CheckedImage> {
    let format = image::guess_format(&upload.data).ok()?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
    ) {
        tracing::debug!(?format, filename = %upload.filename, "Rejected image format");
        return None;
    }

    if let Err(e) = image::load_from_memory_with_format(&upload.data, format) {
        tracing::debug!(error = %e, filename = %upload.filename, "Rejected image upload");
        return None;
    }

    Some(CheckedImage {
        data: upload.data,
        format,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use yatube_common::LocalStorage;

    /// A 2x1 GIF.
    pub(crate) const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn service() -> (ImageService, std::path::PathBuf) {
        let suffix = yatube_common::IdGenerator::new().generate();
        let dir = std::env::temp_dir().join(format!("yatube-media-{suffix}"));
        let storage = LocalStorage::new(dir.clone(), "/media".to_string());
        (ImageService::new(Arc::new(storage)), dir)
    }

    fn upload(data: &'static [u8]) -> ImageUpload {
        ImageUpload {
            filename: "small.gif".to_string(),
            data: Bytes::from_static(data),
        }
    }

    #[tokio::test]
    async fn test_accepts_gif() {
        let (service, _) = service();
        let checked = service.check(&upload(SMALL_GIF)).await.unwrap().unwrap();
        assert_eq!(checked.format, ImageFormat::Gif);
    }

    #[tokio::test]
    async fn test_rejects_text() {
        let (service, _) = service();
        let checked = service.check(&upload(b"definitely not an image")).await.unwrap();
        assert!(checked.is_none());
    }

    #[tokio::test]
    async fn test_rejects_truncated_gif() {
        let (service, _) = service();
        assert!(service.check(&upload(&SMALL_GIF[..12])).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_and_discard() {
        let (service, dir) = service();
        let checked = service.check(&upload(SMALL_GIF)).await.unwrap().unwrap();

        let key = service.store(&checked).await.unwrap();

        assert!(key.starts_with("posts/"));
        assert!(key.ends_with(".gif"));
        assert_eq!(service.url(&key), format!("/media/{key}"));
        assert!(dir.join(&key).exists());

        service.discard(&key).await;
        assert!(!dir.join(&key).exists());
        // already gone: still fine
        service.discard(&key).await;

        let _ = std::fs::remove_dir_all(dir);
    }
}
