pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod records;
pub mod state;
pub mod storage;
pub mod utils;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        acknowledge_download, get_blob, get_file, get_folder, health_check,
        search_by_secret_code, search_by_uploader, upload_files,
    },
    state::AppState,
};

// Multipart framing per file part, plus the text fields
const PART_OVERHEAD: u64 = 16 * 1024;

/// Build the HTTP router over the given state.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = upload_body_limit(state.config.max_file_size, state.config.max_files_per_upload);

    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload_files))
        .route("/files/{id}", get(get_file))
        .route("/files/{id}/download", post(acknowledge_download))
        .route("/folders/{id}", get(get_folder))
        .route("/search/uploader", get(search_by_uploader))
        .route("/search/secret", get(search_by_secret_code))
        .route("/blobs/{*path}", get(get_blob))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Largest request body an upload of `max_files` full-size files needs.
pub fn upload_body_limit(max_file_size: u64, max_files: usize) -> usize {
    let files = max_files as u64;
    (files * (max_file_size + PART_OVERHEAD) + PART_OVERHEAD) as usize
}
