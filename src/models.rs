use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use chrono::{DateTime, SubsecRound, Utc};

use crate::utils::generate_record_id;

/// Metadata for one uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub public_url: String,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FolderRecord {
    pub fn new(name: impl Into<String>, uploader_name: Option<String>) -> Self {
        Self {
            id: generate_record_id("folder"),
            name: name.into(),
            uploader_name,
            created_at: now(),
        }
    }
}

/// Current time truncated to microseconds, the precision PostgreSQL keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    pub public_url: String,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub uploader_name: Option<String>,
    pub folder_id: Option<String>,
    pub share_url: String,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            share_url: format!("/file/{}", file.id),
            id: file.id,
            original_name: file.original_name,
            size: file.file_size,
            mime_type: file.mime_type,
            public_url: file.public_url,
            download_count: file.download_count,
            created_at: file.created_at,
            uploader_name: file.uploader_name,
            folder_id: file.folder_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    pub id: String,
    pub name: String,
    pub uploader_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub share_url: String,
}

impl From<FolderRecord> for FolderSummary {
    fn from(folder: FolderRecord) -> Self {
        Self {
            share_url: format!("/folder/{}", folder.id),
            id: folder.id,
            name: folder.name,
            uploader_name: folder.uploader_name,
            created_at: folder.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub files: Vec<FileResponse>,
    pub folder: Option<FolderSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderResponse {
    pub folder: FolderSummary,
    pub files: Vec<FileResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub id: String,
    pub download_count: i64,
    pub public_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UploaderQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SecretCodeQuery {
    pub code: String,
}
