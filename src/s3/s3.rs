use crate::config::S3Config;
use crate::s3::error::StorageError;
use crate::s3::storage::AssetStore;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

/// Real S3 implementation of the AssetStore trait
#[derive(Clone)]
pub struct S3AssetStore {
    client: Client,
    bucket: String,
}

impl S3AssetStore {
    /// Create a new S3AssetStore instance from configuration
    pub async fn new(config: &S3Config) -> Result<Self, StorageError> {
        info!(
            "Creating S3AssetStore with endpoint={:?}, region={}, bucket={}",
            config.endpoint, config.region, config.bucket
        );

        // MinIO requires path-style requests
        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .force_path_style(true);

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "StaticCredentialsProvider",
            );
            s3_config_builder = s3_config_builder.credentials_provider(credentials);
        }

        if let Some(endpoint) = &config.endpoint {
            info!("Setting custom endpoint: {}", endpoint);
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Created S3 client for region {}", config.region);

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StorageError> {
        debug!("Uploading asset to S3: {} ({} bytes)", name, data.len());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::WriteError(name.to_string(), e.to_string()))?;

        debug!("Successfully uploaded asset: {}", name);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        debug!("Deleting asset from S3: {}", name);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| StorageError::DeleteError(name.to_string(), e.to_string()))?;

        debug!("Successfully deleted asset: {}", name);
        Ok(())
    }

    #[cfg(test)]
    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                let error_str = e.to_string();
                if error_str.contains("NoSuchKey") || error_str.contains("NotFound") {
                    StorageError::ObjectNotFound(name.to_string())
                } else {
                    StorageError::Other(anyhow::anyhow!(
                        "Failed to get object '{}': {}",
                        name,
                        error_str
                    ))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Other(anyhow::anyhow!("Failed to read body: {}", e)))?
            .into_bytes();

        Ok(data)
    }
}
