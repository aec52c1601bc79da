use super::ObjectStore;
use crate::models::Config;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Region, Client as S3Client};

pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    pub async fn new(
        access_key_id: String,
        secret_access_key: String,
        endpoint: String,
        region: String,
        bucket: String,
        public_base_url: String,
    ) -> Result<Self> {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "product-image-store",
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region))
            .endpoint_url(endpoint)
            .load()
            .await;

        // Self-hosted and backend-provided S3 endpoints address buckets by path.
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let access_key_id = config
            .storage_access_key_id
            .clone()
            .ok_or_else(|| Error::Storage("STORAGE_ACCESS_KEY_ID not set".to_string()))?;
        let secret_access_key = config
            .storage_secret_access_key
            .clone()
            .ok_or_else(|| Error::Storage("STORAGE_SECRET_ACCESS_KEY not set".to_string()))?;

        Self::new(
            access_key_id,
            secret_access_key,
            config.storage_endpoint.clone(),
            config.storage_region.clone(),
            config.storage_bucket.clone(),
            config.storage_public_url.clone(),
        )
        .await
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<String> {
        let body = ByteStream::from(data.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .cache_control("max-age=3600")
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Failed to upload {}: {}", key, e)))?;

        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Failed to delete {}: {}", key, e)))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| Error::Storage(format!("Failed to list {}: {}", prefix, e)))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}
