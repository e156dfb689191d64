// Submodules for the remote record store, the local fallback store and the
// service that routes between them
pub mod local;
pub mod postgres;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::Config,
    models::{FileRecord, FolderRecord},
    records::{local::LocalStore, postgres::PgRecordStore, service::RecordService},
};

// Record persistence error types
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record store unavailable: {0}")]
    RemoteUnavailable(String), // Remote store unreachable or not provisioned

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate record id: {0}")]
    Conflict(String),

    #[error("Local store error: {0}")]
    LocalStore(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Exact-match conditions for listing files. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub id: Option<String>,
    pub uploader_name: Option<String>,
    pub secret_code: Option<String>,
    pub folder_id: Option<String>,
}

impl FileFilter {
    pub fn by_id(id: &str) -> Self {
        Self { id: Some(id.to_string()), ..Default::default() }
    }

    pub fn by_uploader(name: &str) -> Self {
        Self { uploader_name: Some(name.to_string()), ..Default::default() }
    }

    pub fn by_secret_code(code: &str) -> Self {
        Self { secret_code: Some(code.to_string()), ..Default::default() }
    }

    pub fn by_folder(folder_id: &str) -> Self {
        Self { folder_id: Some(folder_id.to_string()), ..Default::default() }
    }

    pub fn matches(&self, file: &FileRecord) -> bool {
        fn eq(want: &Option<String>, have: Option<&str>) -> bool {
            want.as_deref().is_none_or(|w| have == Some(w))
        }

        eq(&self.id, Some(&file.id))
            && eq(&self.uploader_name, file.uploader_name.as_deref())
            && eq(&self.secret_code, file.secret_code.as_deref())
            && eq(&self.folder_id, file.folder_id.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FolderFilter {
    pub id: Option<String>,
}

impl FolderFilter {
    pub fn by_id(id: &str) -> Self {
        Self { id: Some(id.to_string()) }
    }

    pub fn matches(&self, folder: &FolderRecord) -> bool {
        self.id.as_deref().is_none_or(|id| folder.id == id)
    }
}

// Async record store trait, implemented by both the remote database and the
// local fallback lists
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_file(&self, file: &FileRecord) -> Result<(), RecordError>;

    async fn create_folder(&self, folder: &FolderRecord) -> Result<(), RecordError>;

    /// Lists files matching `filter` in insertion order.
    async fn list_files(
        &self,
        filter: &FileFilter,
        limit: Option<usize>,
    ) -> Result<Vec<FileRecord>, RecordError>;

    async fn list_folders(
        &self,
        filter: &FolderFilter,
        limit: Option<usize>,
    ) -> Result<Vec<FolderRecord>, RecordError>;

    /// Adds one to a file's download counter and returns the new value.
    async fn increment_download_count(&self, id: &str) -> Result<i64, RecordError>;
}

// Build the record service, probing the remote store once at startup
pub async fn init_records(config: &Config, pool: Option<PgPool>) -> Result<RecordService, RecordError> {
    let local = LocalStore::open(&config.local_store_dir).await?;

    let Some(pool) = pool else {
        info!("No database configured, using local record store only");
        return Ok(RecordService::new(None, local));
    };

    let remote = PgRecordStore::new(pool);
    if config.db_auto_migrate {
        if let Err(e) = remote.ensure_schema().await {
            warn!("Could not provision record tables: {}", e);
        }
    }

    match remote.probe().await {
        Ok(()) => {
            info!("Remote record store available");
            Ok(RecordService::new(Some(Arc::new(remote)), local))
        }
        Err(e) => {
            warn!("Remote record store unavailable, using local fallback: {}", e);
            Ok(RecordService::new(None, local))
        }
    }
}
