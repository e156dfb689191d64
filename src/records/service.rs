use std::sync::Arc;

use tracing::{info, warn};

use super::{FileFilter, FolderFilter, RecordError, RecordStore, local::LocalStore};
use crate::models::{FileRecord, FolderRecord};

/// Routes every record operation to the remote store first and to the local
/// fallback store when the remote path fails.
#[derive(Clone)]
pub struct RecordService {
    remote: Option<Arc<dyn RecordStore>>,
    local: LocalStore,
}

impl RecordService {
    pub fn new(remote: Option<Arc<dyn RecordStore>>, local: LocalStore) -> Self {
        Self { remote, local }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Persists a file record. Falls back to the local store when the remote
    /// store is unavailable; only a failure in both is returned.
    pub async fn create_file(&self, file: FileRecord) -> Result<FileRecord, RecordError> {
        if let Some(folder_id) = &file.folder_id {
            self.check_folder(folder_id).await?;
        }

        if let Some(remote) = &self.remote {
            self.ensure_not_local_file(&file.id).await?;
            match remote.create_file(&file).await {
                Ok(()) => {
                    info!("Stored file record {} remotely", file.id);
                    return Ok(file);
                }
                Err(RecordError::RemoteUnavailable(e)) => {
                    warn!("Record store not ready, saving {} locally: {}", file.id, e);
                }
                Err(e) => return Err(e),
            }
        }

        self.local.create_file(&file).await?;
        Ok(file)
    }

    pub async fn create_folder(&self, folder: FolderRecord) -> Result<FolderRecord, RecordError> {
        if let Some(remote) = &self.remote {
            if !self.local.list_folders(&FolderFilter::by_id(&folder.id), Some(1)).await?.is_empty() {
                return Err(RecordError::Conflict(folder.id.clone()));
            }
            match remote.create_folder(&folder).await {
                Ok(()) => {
                    info!("Stored folder record {} remotely", folder.id);
                    return Ok(folder);
                }
                Err(RecordError::RemoteUnavailable(e)) => {
                    warn!("Record store not ready, saving folder {} locally: {}", folder.id, e);
                }
                Err(e) => return Err(e),
            }
        }

        self.local.create_folder(&folder).await?;
        Ok(folder)
    }

    // An id already in the local list must not be written remotely as well
    async fn ensure_not_local_file(&self, id: &str) -> Result<(), RecordError> {
        if self.local.list_files(&FileFilter::by_id(id), Some(1)).await?.is_empty() {
            Ok(())
        } else {
            Err(RecordError::Conflict(id.to_string()))
        }
    }

    /// Rejects a folder reference only when every reachable store says the
    /// folder does not exist. An unreachable remote store cannot answer, so
    /// the reference is accepted.
    async fn check_folder(&self, folder_id: &str) -> Result<(), RecordError> {
        let filter = FolderFilter::by_id(folder_id);
        let mut remote_answered = true;
        if let Some(remote) = &self.remote {
            match remote.list_folders(&filter, Some(1)).await {
                Ok(folders) if !folders.is_empty() => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    warn!("Could not verify folder {} remotely: {}", folder_id, e);
                    remote_answered = false;
                }
            }
        }

        if !self.local.list_folders(&filter, Some(1)).await?.is_empty() {
            return Ok(());
        }
        if remote_answered {
            return Err(RecordError::Validation(format!("unknown folder {}", folder_id)));
        }

        warn!("Accepting unverified folder reference {}", folder_id);
        Ok(())
    }

    /// Looks a file up by id in the remote store, then the local store.
    pub async fn find_file_by_id(&self, id: &str) -> Result<FileRecord, RecordError> {
        let filter = FileFilter::by_id(id);
        if let Some(file) = self.first_remote_file(&filter).await {
            return Ok(file);
        }

        self.local
            .list_files(&filter, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RecordError::NotFound(format!("file {}", id)))
    }

    /// Lists the files uploaded under `name`.
    ///
    /// The remote store compares names exactly. The local fallback compares
    /// them case-insensitively, and is consulted only when the remote store
    /// fails.
    pub async fn find_files_by_uploader(&self, name: &str) -> Result<Vec<FileRecord>, RecordError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RecordError::Validation("uploader name is required".into()));
        }

        if let Some(remote) = &self.remote {
            match remote.list_files(&FileFilter::by_uploader(name), None).await {
                Ok(files) => return Ok(files),
                Err(e) => warn!("Uploader search failed remotely, scanning local store: {}", e),
            }
        }

        let wanted = name.to_lowercase();
        self.local
            .find_files_where(move |f| {
                f.uploader_name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase() == wanted)
            })
            .await
    }

    /// Resolves a secret code to at most one file. No match is `Ok(None)`.
    pub async fn find_file_by_secret_code(&self, code: &str) -> Result<Option<FileRecord>, RecordError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(RecordError::Validation("secret code is required".into()));
        }

        let filter = FileFilter::by_secret_code(code);
        if let Some(file) = self.first_remote_file(&filter).await {
            return Ok(Some(file));
        }

        Ok(self.local.list_files(&filter, Some(1)).await?.into_iter().next())
    }

    /// Records one completed download and returns the new counter value.
    pub async fn increment_download_count(&self, id: &str) -> Result<i64, RecordError> {
        if let Some(remote) = &self.remote {
            match remote.increment_download_count(id).await {
                Ok(count) => return Ok(count),
                Err(RecordError::NotFound(_)) => {}
                Err(e) => warn!("Could not update download count remotely for {}: {}", id, e),
            }
        }

        self.local.increment_download_count(id).await
    }

    pub async fn find_folder_by_id(&self, id: &str) -> Result<FolderRecord, RecordError> {
        let filter = FolderFilter::by_id(id);
        if let Some(remote) = &self.remote {
            match remote.list_folders(&filter, Some(1)).await {
                Ok(mut folders) if !folders.is_empty() => return Ok(folders.remove(0)),
                Ok(_) => {}
                Err(e) => warn!("Folder lookup failed remotely, trying local store: {}", e),
            }
        }

        self.local
            .list_folders(&filter, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RecordError::NotFound(format!("folder {}", id)))
    }

    /// Files attached to a folder, in the order they were stored. Files
    /// written during an outage live in the local store, so both stores are
    /// merged.
    pub async fn list_folder_files(&self, folder_id: &str) -> Result<Vec<FileRecord>, RecordError> {
        let filter = FileFilter::by_folder(folder_id);
        let mut files = Vec::new();
        if let Some(remote) = &self.remote {
            match remote.list_files(&filter, None).await {
                Ok(remote_files) => files = remote_files,
                Err(e) => warn!("Folder listing failed remotely, using local store: {}", e),
            }
        }

        for file in self.local.list_files(&filter, None).await? {
            if !files.iter().any(|f| f.id == file.id) {
                files.push(file);
            }
        }

        // Stable, so records sharing a timestamp keep their store order
        files.sort_by_key(|f| f.created_at);
        Ok(files)
    }

    // First remote match, or `None` when the remote path is absent, empty or failing
    async fn first_remote_file(&self, filter: &FileFilter) -> Option<FileRecord> {
        let remote = self.remote.as_ref()?;
        match remote.list_files(filter, Some(1)).await {
            Ok(files) => files.into_iter().next(),
            Err(e) => {
                warn!("Record store lookup failed, trying local store: {}", e);
                None
            }
        }
    }
}
