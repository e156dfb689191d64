use crate::config::Config;
use crate::records::service::RecordService;
use crate::storage::StorageBackend;

/// Central application state shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// File and folder records, remote first with a local fallback.
    pub records: RecordService,

    /// Abstracted blob storage backend (local filesystem or S3).
    pub storage: StorageBackend,

    /// Application configuration loaded from environment variables or `.env`.
    pub config: Config,
}
