use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use aws_sdk_s3::{Client, primitives::ByteStream};
use bytes::Bytes;
use tracing::info;
use async_trait::async_trait;
use crate::{config::Config, storage::{Progress, Storage, StorageError, blob_url}};

// AWS S3 Storage backend
#[derive(Clone)]
pub struct S3Storage {
    client: Client,  // AWS S3 client
    bucket: String,  // S3 bucket name
    public_url: Option<String>, // Direct public base for objects, if the bucket is public
    public_base_url: String,    // This service, used when objects are proxied
}

impl S3Storage {
    /// Initialize S3 client and ensure the bucket exists
    pub async fn new(config: &Config) -> Self {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()))
            .or_default_provider()
            .or_else(Region::new("us-east-1"));

        let mut aws_config_builder = aws_config::from_env().region(region_provider);

        // Custom endpoint (e.g., for MinIO)
        if let Some(endpoint) = &config.s3_endpoint {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);

            let credentials = Credentials::new(
                config.s3_access_key.clone(),
                config.s3_secret_key.clone(),
                None,
                None,
                "custom",
            );

            aws_config_builder = aws_config_builder.credentials_provider(credentials);
        }

        let aws_config = aws_config_builder.load().await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true) // Required for MinIO
                .build()
        );

        Self::ensure_bucket_exists(&client, &config.s3_bucket).await;

        Self {
            client,
            bucket: config.s3_bucket.clone(),
            public_url: config.s3_public_url.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Ensure the S3 bucket exists, or create it if possible
    async fn ensure_bucket_exists(client: &Client, bucket: &str) {
        match client.create_bucket().bucket(bucket).send().await {
            Ok(_) => {
                tracing::info!("Bucket {} created successfully", bucket);
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("BucketAlreadyOwnedByYou") ||
                   err_msg.contains("BucketAlreadyExists") ||
                   err_msg.contains("YourPreviousRequestToCreateTheBucket") {
                    tracing::info!("Bucket {} already exists", bucket);
                } else {
                    tracing::warn!("Could not create bucket {}: {}", bucket, err_msg);
                    match client.head_bucket().bucket(bucket).send().await {
                        Ok(_) => tracing::info!("Bucket {} exists (verified)", bucket),
                        Err(check_err) => tracing::error!("Bucket {} does not exist and cannot be created: {}", bucket, check_err),
                    }
                }
            }
        }
    }

    fn public_url_for(&self, key: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => blob_url(&self.public_base_url, key),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {

    /// Uploads content to the bucket in a single request
    async fn upload(&self, file_path: &str, content: Bytes, progress: Progress<'_>)
    -> Result<String, StorageError> {
        progress(0);
        let body = ByteStream::from(content);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(file_path)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::UploadError(e.to_string()))?;

        progress(100);
        info!("Uploaded object {} to bucket {}", file_path, self.bucket);
        Ok(self.public_url_for(file_path))
    }

    /// Downloads content from S3 bucket
    async fn download(&self, file_path: &str) -> Result<Bytes, StorageError> {
        tracing::debug!("S3 GET key = {}", file_path);
        let response = self.client
            .get_object()
            .bucket(&self.bucket)
            .key(file_path)
            .send()
            .await
            .map_err(|e| StorageError::NotFound(e.to_string()))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::IoError(std::io::Error::other(e.to_string())))?;

        Ok(data.into_bytes())
    }

    /// Deletes an object from the bucket
    async fn delete(&self, file_path: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(file_path)
            .send()
            .await
            .map_err(|e| StorageError::DeleteError(e.to_string()))?;

        info!("Object deleted from s3: {}", file_path);
        Ok(())
    }
}
