use std::env;

use dotenvy::dotenv;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Clone, Validate)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_auto_migrate: bool,
    #[validate(length(min = 1))]
    pub local_store_dir: String,
    #[validate(length(min = 1))]
    pub upload_dir: String,
    #[validate(length(min = 1))]
    pub public_base_url: String,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_public_url: Option<String>,
    #[validate(range(min = 1, max = 104857600))] // Max 100MB
    pub max_file_size: u64,
    #[validate(range(min = 1, max = 100))]
    pub max_files_per_upload: usize,
    pub use_s3: bool,
    pub port: u16,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ValidationErrors> {
        // Load environment variables from `.env` file (if it exists)
        dotenv().ok();

        let config = Config {
            database_url: non_empty_var("DATABASE_URL"),
            db_auto_migrate: var_or("DB_AUTO_MIGRATE", "true").parse().unwrap_or(true),
            local_store_dir: var_or("LOCAL_STORE_DIR", "data"),
            upload_dir: var_or("UPLOAD_DIR", "uploads"),
            public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:3000"),
            s3_endpoint: non_empty_var("S3_ENDPOINT"),
            s3_region: var_or("S3_REGION", "us-east-1"),
            s3_bucket: var_or("S3_BUCKET", "filedrop"),
            s3_access_key: var_or("S3_ACCESS_KEY", "minioadmin"),
            s3_secret_key: var_or("S3_SECRET_KEY", "minioadmin"),
            s3_public_url: non_empty_var("S3_PUBLIC_URL"),
            max_file_size: var_or("MAX_FILE_SIZE", "10485760")
                .parse()
                .unwrap_or(10_485_760),
            max_files_per_upload: var_or("MAX_FILES_PER_UPLOAD", "10").parse().unwrap_or(10),
            use_s3: var_or("USE_S3", "false").parse().unwrap_or(false),
            port: var_or("PORT", "3000").parse().unwrap_or(3000),
        };

        // Validate configuration values (e.g. file size range)
        config.validate()?;
        Ok(config)
    }

    /// Local-only settings rooted at `dir`, used by tests and offline runs.
    pub fn local(dir: &std::path::Path) -> Self {
        Config {
            database_url: None,
            db_auto_migrate: false,
            local_store_dir: dir.join("data").to_string_lossy().into_owned(),
            upload_dir: dir.join("uploads").to_string_lossy().into_owned(),
            public_base_url: "http://localhost:3000".to_string(),
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_bucket: "filedrop".to_string(),
            s3_access_key: String::new(),
            s3_secret_key: String::new(),
            s3_public_url: None,
            max_file_size: 10_485_760,
            max_files_per_upload: 10,
            use_s3: false,
            port: 3000,
        }
    }
}
