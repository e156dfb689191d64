use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::{FileFilter, FolderFilter, RecordError, RecordStore};
use crate::models::{FileRecord, FolderRecord};

const FILE_COLUMNS: &str = "id, original_name, file_size, mime_type, storage_path, public_url, \
     download_count, created_at, uploader_name, secret_code, folder_id";

const FOLDER_COLUMNS: &str = "id, name, uploader_name, created_at";

// `seq` keeps insertion order; folder references are checked by the service
// because a folder may live in the local store
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS folders (
    seq BIGSERIAL NOT NULL,
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    uploader_name TEXT,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS files (
    seq BIGSERIAL NOT NULL,
    id TEXT PRIMARY KEY,
    original_name TEXT NOT NULL,
    file_size BIGINT NOT NULL,
    mime_type TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    public_url TEXT NOT NULL,
    download_count BIGINT NOT NULL DEFAULT 0 CHECK (download_count >= 0),
    created_at TIMESTAMPTZ NOT NULL,
    uploader_name TEXT,
    secret_code TEXT,
    folder_id TEXT
);
CREATE INDEX IF NOT EXISTS files_uploader_name_idx ON files (uploader_name);
CREATE INDEX IF NOT EXISTS files_secret_code_idx ON files (secret_code);
CREATE INDEX IF NOT EXISTS files_folder_id_idx ON files (folder_id);
"#;

/// Remote record store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the record tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), RecordError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        info!("Record tables provisioned");
        Ok(())
    }

    /// Fails when either record table is missing or the database is unreachable.
    pub async fn probe(&self) -> Result<(), RecordError> {
        sqlx::query("SELECT 1 FROM files LIMIT 0")
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        sqlx::query("SELECT 1 FROM folders LIMIT 0")
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }
}

fn map_db_error(err: sqlx::Error) -> RecordError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RecordError::Conflict(db.message().to_string())
        }
        _ => RecordError::RemoteUnavailable(err.to_string()),
    }
}

fn push_limit(qb: &mut QueryBuilder<'_, Postgres>, limit: Option<usize>) {
    if let Some(limit) = limit {
        qb.push(" LIMIT ").push_bind(limit as i64);
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create_file(&self, file: &FileRecord) -> Result<(), RecordError> {
        sqlx::query(
            r#"
            INSERT INTO files (
                id, original_name, file_size, mime_type, storage_path, public_url,
                download_count, created_at, uploader_name, secret_code, folder_id
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            "#,
        )
        .bind(&file.id)
        .bind(&file.original_name)
        .bind(file.file_size)
        .bind(&file.mime_type)
        .bind(&file.storage_path)
        .bind(&file.public_url)
        .bind(file.download_count)
        .bind(file.created_at)
        .bind(&file.uploader_name)
        .bind(&file.secret_code)
        .bind(&file.folder_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn create_folder(&self, folder: &FolderRecord) -> Result<(), RecordError> {
        sqlx::query("INSERT INTO folders (id, name, uploader_name, created_at) VALUES ($1,$2,$3,$4)")
            .bind(&folder.id)
            .bind(&folder.name)
            .bind(&folder.uploader_name)
            .bind(folder.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }

    async fn list_files(
        &self,
        filter: &FileFilter,
        limit: Option<usize>,
    ) -> Result<Vec<FileRecord>, RecordError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM files WHERE TRUE", FILE_COLUMNS));
        if let Some(id) = &filter.id {
            qb.push(" AND id = ").push_bind(id.clone());
        }
        if let Some(name) = &filter.uploader_name {
            qb.push(" AND uploader_name = ").push_bind(name.clone());
        }
        if let Some(code) = &filter.secret_code {
            qb.push(" AND secret_code = ").push_bind(code.clone());
        }
        if let Some(folder_id) = &filter.folder_id {
            qb.push(" AND folder_id = ").push_bind(folder_id.clone());
        }
        qb.push(" ORDER BY seq");
        push_limit(&mut qb, limit);

        qb.build_query_as::<FileRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn list_folders(
        &self,
        filter: &FolderFilter,
        limit: Option<usize>,
    ) -> Result<Vec<FolderRecord>, RecordError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM folders WHERE TRUE", FOLDER_COLUMNS));
        if let Some(id) = &filter.id {
            qb.push(" AND id = ").push_bind(id.clone());
        }
        qb.push(" ORDER BY seq");
        push_limit(&mut qb, limit);

        qb.build_query_as::<FolderRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn increment_download_count(&self, id: &str) -> Result<i64, RecordError> {
        let count: Option<i64> = sqlx::query_scalar(
            "UPDATE files SET download_count = download_count + 1 WHERE id = $1 RETURNING download_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        count.ok_or_else(|| RecordError::NotFound(format!("file {}", id)))
    }
}
