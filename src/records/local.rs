use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::{fs, sync::Mutex};

use super::{FileFilter, FolderFilter, RecordError, RecordStore};
use crate::models::{FileRecord, FolderRecord};

const FILES: &str = "files";
const FOLDERS: &str = "folders";

// Local fallback store: one JSON list per collection, rewritten in full on
// every mutation
#[derive(Clone)]
pub struct LocalStore {
    base_path: PathBuf,
    write_lock: Arc<Mutex<()>>, // Serializes read-modify-write cycles
}

impl LocalStore {
    /// Opens (and creates if needed) a store rooted at `base_path`.
    pub async fn open(base_path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await?;
        Ok(Self {
            base_path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn list_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", collection))
    }

    /// Reads a whole collection. A missing list is an empty list.
    async fn read_list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, RecordError> {
        match fs::read(self.list_path(collection)).await {
            Ok(raw) if raw.is_empty() => Ok(Vec::new()),
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces a whole collection via temp file and rename.
    async fn write_list<T: Serialize>(&self, collection: &str, items: &[T]) -> Result<(), RecordError> {
        let path = self.list_path(collection);
        let tmp = self.base_path.join(format!(".{}.json.tmp", collection));
        fs::write(&tmp, serde_json::to_vec(items)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Returns every file satisfying `predicate`, in insertion order.
    pub async fn find_files_where<P>(&self, predicate: P) -> Result<Vec<FileRecord>, RecordError>
    where
        P: Fn(&FileRecord) -> bool + Send,
    {
        let files: Vec<FileRecord> = self.read_list(FILES).await?;
        Ok(files.into_iter().filter(|f| predicate(f)).collect())
    }
}

fn take<T>(items: impl Iterator<Item = T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(n) => items.take(n).collect(),
        None => items.collect(),
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn create_file(&self, file: &FileRecord) -> Result<(), RecordError> {
        let _guard = self.write_lock.lock().await;
        let mut files: Vec<FileRecord> = self.read_list(FILES).await?;
        if files.iter().any(|f| f.id == file.id) {
            return Err(RecordError::Conflict(file.id.clone()));
        }
        files.push(file.clone());
        self.write_list(FILES, &files).await?;

        tracing::info!("Stored file record {} locally", file.id);
        Ok(())
    }

    async fn create_folder(&self, folder: &FolderRecord) -> Result<(), RecordError> {
        let _guard = self.write_lock.lock().await;
        let mut folders: Vec<FolderRecord> = self.read_list(FOLDERS).await?;
        if folders.iter().any(|f| f.id == folder.id) {
            return Err(RecordError::Conflict(folder.id.clone()));
        }
        folders.push(folder.clone());
        self.write_list(FOLDERS, &folders).await?;

        tracing::info!("Stored folder record {} locally", folder.id);
        Ok(())
    }

    async fn list_files(
        &self,
        filter: &FileFilter,
        limit: Option<usize>,
    ) -> Result<Vec<FileRecord>, RecordError> {
        let files: Vec<FileRecord> = self.read_list(FILES).await?;
        Ok(take(files.into_iter().filter(|f| filter.matches(f)), limit))
    }

    async fn list_folders(
        &self,
        filter: &FolderFilter,
        limit: Option<usize>,
    ) -> Result<Vec<FolderRecord>, RecordError> {
        let folders: Vec<FolderRecord> = self.read_list(FOLDERS).await?;
        Ok(take(folders.into_iter().filter(|f| filter.matches(f)), limit))
    }

    async fn increment_download_count(&self, id: &str) -> Result<i64, RecordError> {
        let _guard = self.write_lock.lock().await;
        let mut files: Vec<FileRecord> = self.read_list(FILES).await?;
        let file = files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| RecordError::NotFound(format!("file {}", id)))?;
        file.download_count += 1;
        let count = file.download_count;
        self.write_list(FILES, &files).await?;
        Ok(count)
    }
}
