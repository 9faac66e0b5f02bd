//! S3-compatible object storage backend.
//!
//! Clients move bytes directly to and from the bucket using presigned URLs;
//! the server only signs requests, checks object sizes and deletes objects.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use tracing::{debug, info, warn};

use cloudbox_core::config::S3StorageConfig;
use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::storage::{
    BackendKind, ByteStream, DownloadRequest, DownloadTarget, StorageBackend,
};

/// Largest batch accepted by a single `DeleteObjects` call.
const DELETE_BATCH_LIMIT: usize = 1000;

/// S3-compatible storage backend.
#[derive(Debug, Clone)]
pub struct S3StorageBackend {
    client: Client,
    bucket: String,
}

impl S3StorageBackend {
    /// Build a client from configuration.
    ///
    /// Static credentials are used when both keys are set; otherwise the
    /// default AWS provider chain applies.
    pub async fn new(config: &S3StorageConfig) -> AppResult<Self> {
        if config.bucket.is_empty() {
            return Err(AppError::configuration("storage.s3.bucket is required"));
        }
        let bucket = config.bucket.clone();
        let endpoint = if config.endpoint.is_empty() {
            "aws"
        } else {
            config.endpoint.as_str()
        };

        info!(
            endpoint,
            region = %config.region,
            bucket = %bucket,
            "Initializing S3 storage backend"
        );

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if !config.endpoint.is_empty() {
            loader = loader.endpoint_url(&config.endpoint);
        }
        if !config.access_key.is_empty() && !config.secret_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "cloudbox-config",
            ));
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket,
        })
    }

    fn presigning(ttl: Duration) -> AppResult<PresigningConfig> {
        PresigningConfig::expires_in(ttl).map_err(|e| {
            AppError::with_source(ErrorKind::Validation, "Invalid presigned URL lifetime", e)
        })
    }
}

fn sdk_error<E>(message: &str, e: E) -> AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AppError::with_source(ErrorKind::Storage, message.to_string(), e)
}

#[async_trait]
impl StorageBackend for S3StorageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn health_check(&self) -> AppResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(bucket = %self.bucket, error = %e, "S3 health check failed");
                Ok(false)
            }
        }
    }

    async fn put_stream(&self, _key: &str, _stream: ByteStream) -> AppResult<u64> {
        Err(AppError::not_implemented(
            "Remote storage receives uploads through presigned URLs",
        ))
    }

    async fn upload_url(&self, key: &str, content_type: &str, ttl: Duration) -> AppResult<String> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(Self::presigning(ttl)?)
            .await
            .map_err(|e| sdk_error("Failed to presign upload", e))?;

        debug!(key, ttl_secs = ttl.as_secs(), "Issued upload URL");
        Ok(presigned.uri().to_string())
    }

    async fn download(&self, key: &str, request: &DownloadRequest) -> AppResult<DownloadTarget> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition(request.disposition.header_value(&request.filename))
            .set_response_content_type(request.content_type.clone())
            .presigned(Self::presigning(request.ttl)?)
            .await
            .map_err(|e| sdk_error("Failed to presign download", e))?;

        Ok(DownloadTarget::Redirect {
            url: presigned.uri().to_string(),
        })
    }

    async fn object_size(&self, key: &str) -> AppResult<Option<u64>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(
                output.content_length().unwrap_or_default().max(0) as u64,
            )),
            Err(SdkError::ServiceError(ref service)) if service.err().is_not_found() => Ok(None),
            Err(e) => Err(sdk_error("Failed to read object metadata", e)),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("Failed to delete object", e))?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<()> {
        for batch in keys.chunks(DELETE_BATCH_LIMIT) {
            let objects = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| sdk_error("Failed to build delete request", e))?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| sdk_error("Failed to build delete request", e))?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| sdk_error("Failed to delete objects", e))?;

            let failures = output.errors();
            if !failures.is_empty() {
                for failure in failures {
                    warn!(
                        key = failure.key().unwrap_or_default(),
                        code = failure.code().unwrap_or_default(),
                        message = failure.message().unwrap_or_default(),
                        "Object delete failed"
                    );
                }
                return Err(AppError::storage(format!(
                    "{} of {} objects could not be deleted",
                    failures.len(),
                    batch.len()
                )));
            }
        }

        debug!(count = keys.len(), "Deleted objects");
        Ok(())
    }
}
