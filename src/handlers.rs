use axum::{Json, extract::{Multipart, Path, Query, State, multipart::MultipartError}, http::{StatusCode, header}, response::Response};
use bytes::Bytes;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::{
    error::AppError,
    models::*,
    records::RecordError,
    state::AppState,
    storage::{Storage, StorageError},
    utils::{generate_record_id, non_blank},
};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// One file part read from the multipart body.
struct IncomingFile {
    name: String,
    mime_type: String,
    data: Bytes,
}

/// Form fields accompanying an upload.
#[derive(Debug, Validate)]
struct UploadForm {
    #[validate(length(min = 1, message = "Please enter your name"))]
    uploader_name: String,
    secret_code: Option<String>,
    folder_name: Option<String>,
}

/// Upload one or more files using multipart/form-data.
///
/// Several files, or an explicit `folderName`, are grouped under a new folder.
pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut files: Vec<IncomingFile> = Vec::new();
    let mut uploader_name: Option<String> = None;
    let mut secret_code: Option<String> = None;
    let mut folder_name: Option<String> = None;

    // Parse multipart fields
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Failed to parse multipart form"))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let name = field.file_name().unwrap_or("unnamed").to_string();
                let mime_type = field.content_type().unwrap_or(DEFAULT_MIME_TYPE).to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, "Failed to read the file"))?;
                files.push(IncomingFile { name, mime_type, data });
            }
            "uploaderName" => uploader_name = Some(read_text(field).await?),
            "secretCode" => secret_code = Some(read_text(field).await?),
            "folderName" => folder_name = Some(read_text(field).await?),
            _ => {}
        }
    }

    let form = UploadForm {
        uploader_name: non_blank(uploader_name).unwrap_or_default(),
        secret_code: non_blank(secret_code),
        folder_name: non_blank(folder_name),
    };
    form.validate()
        .map_err(|_| AppError::BadRequest("Please enter your name".into()))?;

    if files.is_empty() {
        return Err(AppError::BadRequest("No file provided".into()));
    }
    if files.len() > state.config.max_files_per_upload {
        return Err(AppError::PayloadTooLarge(format!(
            "At most {} files can be uploaded at once",
            state.config.max_files_per_upload
        )));
    }

    // Enforce maximum file size
    let max = state.config.max_file_size;
    if let Some(big) = files.iter().find(|f| f.data.len() as u64 > max) {
        error!("File {} ({} bytes) exceeds maximum limit of {} bytes", big.name, big.data.len(), max);
        return Err(AppError::PayloadTooLarge(format!(
            "File size {} exceeds maximum limit of {} bytes",
            big.data.len(), max
        )));
    }

    // Store every blob before creating any record
    let mut pending = Vec::with_capacity(files.len());
    for file in files {
        let file_id = generate_record_id("file");
        let storage_path = format!("files/{}", file_id);
        let size = file.data.len() as i64;

        let uploaded = state
            .storage
            .upload(&storage_path, file.data, &|percent: u8| {
                debug!(file_id = %file_id, percent, "upload progress");
            })
            .await;
        let public_url = match uploaded {
            Ok(url) => url,
            Err(e) => {
                remove_orphans(&state, &pending).await;
                return Err(e.into());
            }
        };

        pending.push(FileRecord {
            id: file_id,
            original_name: file.name,
            file_size: size,
            mime_type: file.mime_type,
            storage_path,
            public_url,
            download_count: 0,
            created_at: now(),
            uploader_name: Some(form.uploader_name.clone()),
            secret_code: form.secret_code.clone(),
            folder_id: None,
        });
    }

    let folder = if pending.len() > 1 || form.folder_name.is_some() {
        let name = form
            .folder_name
            .clone()
            .unwrap_or_else(|| format!("{} files", pending.len()));
        let folder = state
            .records
            .create_folder(FolderRecord::new(name, Some(form.uploader_name.clone())))
            .await?;
        Some(folder)
    } else {
        None
    };

    let mut created = Vec::with_capacity(pending.len());
    for mut record in pending {
        record.folder_id = folder.as_ref().map(|f| f.id.clone());
        let record = state.records.create_file(record).await?;
        info!("File uploaded: {} ({} bytes)", record.id, record.file_size);
        created.push(FileResponse::from(record));
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            files: created,
            folder: folder.map(FolderSummary::from),
        }),
    ))
}

/// Get metadata for a single file by its ID.
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    let file = state.records.find_file_by_id(&id).await.map_err(not_found("File not found"))?;
    Ok(Json(file.into()))
}

/// Acknowledge a download: bumps the counter and hands back the blob URL.
pub async fn acknowledge_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DownloadResponse>, AppError> {
    let file = state.records.find_file_by_id(&id).await.map_err(not_found("File not found"))?;
    let download_count = state
        .records
        .increment_download_count(&file.id)
        .await
        .map_err(not_found("File not found"))?;

    info!("Download acknowledged for {} (count {})", file.id, download_count);

    Ok(Json(DownloadResponse {
        id: file.id,
        download_count,
        public_url: file.public_url,
    }))
}

/// Get a folder and its files in upload order.
pub async fn get_folder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FolderResponse>, AppError> {
    let folder = state.records.find_folder_by_id(&id).await.map_err(not_found("Folder not found"))?;
    let files = state.records.list_folder_files(&folder.id).await?;

    Ok(Json(FolderResponse {
        folder: folder.into(),
        files: files.into_iter().map(FileResponse::from).collect(),
    }))
}

/// List files uploaded under a given name.
pub async fn search_by_uploader(
    State(state): State<AppState>,
    Query(query): Query<UploaderQuery>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let files = state.records.find_files_by_uploader(&query.name).await?;
    Ok(Json(files.into_iter().map(FileResponse::from).collect()))
}

/// Resolve a secret code to its file.
pub async fn search_by_secret_code(
    State(state): State<AppState>,
    Query(query): Query<SecretCodeQuery>,
) -> Result<Json<FileResponse>, AppError> {
    let file = state
        .records
        .find_file_by_secret_code(&query.code)
        .await?
        .ok_or_else(|| AppError::NotFound("No file found with this secret code".into()))?;
    Ok(Json(file.into()))
}

/// Serve a stored blob, named after its file record when one exists.
pub async fn get_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let content = state.storage.download(&path).await.map_err(|e| match e {
        StorageError::NotFound(_) => AppError::NotFound("Blob not found".to_string()),
        other => {
            error!("Error reading blob {}: {}", path, other);
            AppError::InternalServerError("Failed to read file".to_string())
        }
    })?;

    let record = match path.rsplit('/').next() {
        Some(id) => state.records.find_file_by_id(id).await.ok(),
        None => None,
    };

    let mut response = Response::new(content.into());
    let mime_type = record.as_ref().map_or(DEFAULT_MIME_TYPE, |r| r.mime_type.as_str());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_str(mime_type)
            .unwrap_or_else(|_| header::HeaderValue::from_static(DEFAULT_MIME_TYPE)),
    );

    // Preserve the original filename for downloads
    if let Some(record) = &record {
        response.headers_mut().insert(
            header::CONTENT_DISPOSITION,
            header::HeaderValue::from_str(&format!("attachment; filename=\"{}\"", record.original_name))
                .unwrap_or_else(|_| header::HeaderValue::from_static("attachment")),
        );
    }

    Ok(response)
}

pub async fn health_check() -> &'static str {
    "OK"
}

// Keeps the 413 from a body that exceeded the request limit
fn multipart_error(err: MultipartError, context: &str) -> AppError {
    error!("{}: {}", context, err);
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the request size limit".to_string())
    } else {
        AppError::MultipartError(format!("{}: {}", context, err))
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    let name = field.name().unwrap_or("").to_string();
    field
        .text()
        .await
        .map_err(|e| multipart_error(e, &format!("Failed to read field {}", name)))
}

// Blobs stored earlier in a request whose later upload failed
async fn remove_orphans(state: &AppState, stored: &[FileRecord]) {
    for file in stored {
        if let Err(e) = state.storage.delete(&file.storage_path).await {
            warn!("Could not remove orphaned blob {}: {}", file.storage_path, e);
        }
    }
}

// Maps a record-layer miss to a user-facing message
fn not_found(message: &'static str) -> impl Fn(RecordError) -> AppError {
    move |e| match e {
        RecordError::NotFound(_) => AppError::NotFound(message.to_string()),
        other => AppError::Record(other),
    }
}
