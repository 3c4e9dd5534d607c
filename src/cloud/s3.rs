use crate::cloud::{BucketStatus, KeyPage, ObjectStore, MAX_DELETE_BATCH};
use crate::error::{Result, SagectlError};
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use aws_sdk_s3::Client;
use std::path::Path;

/// Region where buckets are created without a location constraint
const DEFAULT_LOCATION: &str = "us-east-1";

/// S3-backed [`ObjectStore`]
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    #[must_use]
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn ensure_bucket(&self, bucket: &str, region: &str) -> Result<BucketStatus> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if region != DEFAULT_LOCATION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(BucketStatus::Created),
            Err(e)
                if e.as_service_error().is_some_and(|se| {
                    se.is_bucket_already_exists() || se.is_bucket_already_owned_by_you()
                }) =>
            {
                Ok(BucketStatus::AlreadyExists)
            }
            Err(e) => Err(SagectlError::Storage(format!(
                "Failed to create bucket {bucket}: {}",
                DisplayErrorContext(&e)
            ))),
        }
    }

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path).await.map_err(|e| {
            SagectlError::Storage(format!("Failed to read {}: {e}", path.display()))
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                SagectlError::Storage(format!(
                    "Failed to upload s3://{bucket}/{key}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<KeyPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| {
                SagectlError::Storage(format!(
                    "Failed to list s3://{bucket}/{prefix}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(ToString::to_string))
            .collect();

        let next = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(ToString::to_string)
        } else {
            None
        };

        Ok(KeyPage { keys, next })
    }

    async fn delete_keys(&self, bucket: &str, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        if keys.len() > MAX_DELETE_BATCH {
            return Err(SagectlError::Storage(format!(
                "Refusing to delete {} keys in one request (limit {MAX_DELETE_BATCH})",
                keys.len()
            )));
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SagectlError::Storage(format!("Invalid object key: {e}")))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| SagectlError::Storage(format!("Invalid delete request: {e}")))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                SagectlError::Storage(format!(
                    "Failed to delete objects from {bucket}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        for error in output.errors() {
            tracing::warn!(
                "Could not delete s3://{bucket}/{}: {}",
                error.key().unwrap_or_default(),
                error.message().unwrap_or_default()
            );
        }

        Ok(keys.len().saturating_sub(output.errors().len()))
    }
}
