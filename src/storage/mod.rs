// Submodules for local file system storage and S3 storage
mod local;
mod s3;

pub use local::LocalStorage;
pub use s3::S3Storage;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::info;

use crate::config::Config;

// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String), // Returned when a blob cannot be found

    #[error("Io Error: {0}")]
    IoError(#[from] std::io::Error), // Wraps standard I/O errors

    #[error("Upload Error: {0}")]
    UploadError(String), // Transport errors during upload

    #[error("Delete Error: {0}")]
    DeleteError(String), // Errors during deletion from storage
}

/// Upload progress callback, called with a percentage in `0..=100`.
pub type Progress<'a> = &'a (dyn Fn(u8) + Send + Sync);

// Async Storage trait
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload a blob to the storage backend.
    /// Returns the public URL the blob can be fetched from.
    async fn upload(&self, file_path: &str, content: Bytes, progress: Progress<'_>)
    -> Result<String, StorageError>;

    /// Download a blob from the storage backend.
    async fn download(&self, file_path: &str) -> Result<Bytes, StorageError>;

    /// Delete a blob. Used only to drop blobs of an upload that did not complete.
    async fn delete(&self, file_path: &str) -> Result<(), StorageError>;
}

// Enum to represent storage backends
#[derive(Clone)]
pub enum StorageBackend {
    Local(LocalStorage),  // Local filesystem storage
    S3(S3Storage),        // AWS S3 or MinIO storage
}

// Delegates calls to the chosen backend
#[async_trait]
impl Storage for StorageBackend {
    async fn upload(&self, file_path: &str, content: Bytes, progress: Progress<'_>)
    -> Result<String, StorageError> {
        match self {
            StorageBackend::Local(s) => s.upload(file_path, content, progress).await,
            StorageBackend::S3(s) => s.upload(file_path, content, progress).await,
        }
    }

    async fn download(&self, file_path: &str) -> Result<Bytes, StorageError> {
        match self {
            StorageBackend::Local(s) => s.download(file_path).await,
            StorageBackend::S3(s) => s.download(file_path).await,
        }
    }

    async fn delete(&self, file_path: &str) -> Result<(), StorageError> {
        match self {
            StorageBackend::Local(s) => s.delete(file_path).await,
            StorageBackend::S3(s) => s.delete(file_path).await,
        }
    }
}

/// Public URL for a blob served by this service's `/blobs` route.
pub fn blob_url(public_base_url: &str, file_path: &str) -> String {
    format!("{}/blobs/{}", public_base_url.trim_end_matches('/'), file_path)
}

// Initialize the storage backend based on config
pub async fn init_storage(config: &Config) -> Result<StorageBackend, StorageError> {
    if config.use_s3 {
        info!("Initializing S3 storage");
        Ok(StorageBackend::S3(S3Storage::new(config).await))
    } else {
        info!("Initializing Local storage");
        Ok(StorageBackend::Local(
            LocalStorage::new(&config.upload_dir, &config.public_base_url).await?,
        ))
    }
}
