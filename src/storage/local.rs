use std::path::{Component, Path, PathBuf};
use bytes::Bytes;
use super::{Progress, Storage, StorageError, blob_url};
use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};

const CHUNK_SIZE: usize = 64 * 1024;

// Local filesystem storage
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf, // Base directory where blobs are stored
    public_base_url: String,
}

impl LocalStorage {
    /// Creates a new LocalStorage instance and ensures the blob directory exists
    pub async fn new(base_path: impl AsRef<Path>, public_base_url: &str) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(base_path.join("files")).await?;
        Ok(Self {
            base_path,
            public_base_url: public_base_url.to_string(),
        })
    }

    /// Resolves a blob path below the base directory, refusing traversal
    fn get_full_path(&self, file_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(file_path);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(StorageError::NotFound(file_path.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {

    /// Writes content to a file in chunks, reporting progress after each one
    async fn upload(&self, file_path: &str, content: Bytes, progress: Progress<'_>)
    -> Result<String, StorageError> {
        let full_path = self.get_full_path(file_path)?;

        // Ensure parent directories exist
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let total = content.len();
        let mut written = 0;
        progress(0);

        let mut file = fs::File::create(&full_path).await?;
        for chunk in content.chunks(CHUNK_SIZE) {
            file.write_all(chunk).await?;
            written += chunk.len();
            progress((written * 100 / total) as u8);
        }
        file.flush().await?;
        if total == 0 {
            progress(100);
        }

        tracing::info!("Saved blob at {:?}", full_path);

        Ok(blob_url(&self.public_base_url, file_path))
    }

    /// Reads a blob from the local filesystem
    async fn download(&self, file_path: &str) -> Result<Bytes, StorageError> {
        let full_path = self.get_full_path(file_path)?;

        if !full_path.exists() {
            return Err(StorageError::NotFound(file_path.to_string()));
        }

        let content = fs::read(&full_path).await?;
        Ok(Bytes::from(content))
    }

    /// Deletes a blob from the local filesystem; a missing blob is not an error
    async fn delete(&self, file_path: &str) -> Result<(), StorageError> {
        let full_path = self.get_full_path(file_path)?;

        if full_path.exists() {
            fs::remove_file(&full_path)
                .await
                .map_err(|e| StorageError::DeleteError(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[tokio::test]
    async fn upload_reports_progress_and_returns_public_url() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:3000").await.unwrap();
        let seen = Mutex::new(Vec::new());
        let content = Bytes::from(vec![7u8; CHUNK_SIZE * 2 + 10]);

        let url = storage
            .upload("files/file_1_x", content.clone(), &|p: u8| seen.lock().unwrap().push(p))
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:3000/blobs/files/file_1_x");
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(storage.download("files/file_1_x").await.unwrap(), content);
    }

    #[tokio::test]
    async fn empty_upload_still_completes() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:3000").await.unwrap();
        let seen = Mutex::new(Vec::new());
        storage
            .upload("files/empty", Bytes::new(), &|p: u8| seen.lock().unwrap().push(p))
            .await
            .unwrap();
        assert_eq!(seen.into_inner().unwrap(), vec![0, 100]);
    }

    #[tokio::test]
    async fn delete_removes_blob_and_ignores_missing() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:3000").await.unwrap();
        storage
            .upload("files/gone", Bytes::from_static(b"x"), &|_: u8| {})
            .await
            .unwrap();

        storage.delete("files/gone").await.unwrap();
        assert!(matches!(
            storage.download("files/gone").await,
            Err(StorageError::NotFound(_))
        ));
        storage.delete("files/gone").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_and_missing_blobs_are_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:3000").await.unwrap();
        assert!(matches!(
            storage.download("../secret").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.download("files/absent").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
