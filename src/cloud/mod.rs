//! Remote collaborators: object storage, model hosting control plane,
//! inference data plane and caller identity.
//!
//! Commands only talk to these traits; [`AwsClients`] wires the AWS SDK
//! implementations behind them.

pub mod identity;
pub mod runtime;
pub mod s3;
pub mod sagemaker;

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use std::path::Path;

pub use identity::CallerIdentity;
pub use runtime::SageMakerRuntime;
pub use s3::S3Store;
pub use sagemaker::{serving_image_uri, SageMakerHost};

/// Upper bound of keys per batch delete request
pub const MAX_DELETE_BATCH: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    Created,
    AlreadyExists,
}

/// One page of an object listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPage {
    pub keys: Vec<String>,
    /// Continuation token for the next page, `None` on the last page
    pub next: Option<String>,
}

/// Object storage operations used by prepare and delete
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket; an existing bucket is not an error
    async fn ensure_bucket(&self, bucket: &str, region: &str) -> Result<BucketStatus>;

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<KeyPage>;

    /// Delete up to [`MAX_DELETE_BATCH`] keys; returns how many were deleted
    async fn delete_keys(&self, bucket: &str, keys: &[String]) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Created,
    AlreadyExists,
}

/// Hosted-model registration request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub image: String,
    pub model_data_url: String,
    pub execution_role: String,
}

/// Endpoint configuration request binding one model to instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfigSpec {
    pub name: String,
    pub model_name: String,
    pub instance_type: String,
    pub instance_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointStatus {
    Creating,
    InService,
    Failed(String),
    Other(String),
}

/// Managed-inference control plane
#[async_trait]
pub trait ModelHost: Send + Sync {
    async fn create_model(&self, spec: &ModelSpec) -> Result<ModelStatus>;

    async fn create_endpoint_config(&self, spec: &EndpointConfigSpec) -> Result<()>;

    async fn create_endpoint(&self, name: &str, config_name: &str) -> Result<()>;

    async fn endpoint_status(&self, name: &str) -> Result<EndpointStatus>;

    async fn delete_endpoint(&self, name: &str) -> Result<()>;

    /// Names of every endpoint configuration in the account/region
    async fn list_endpoint_configs(&self) -> Result<Vec<String>>;

    async fn delete_endpoint_config(&self, name: &str) -> Result<()>;

    async fn delete_model(&self, name: &str) -> Result<()>;
}

/// Managed-inference data plane
#[async_trait]
pub trait InferenceRuntime: Send + Sync {
    /// Synchronous invocation; returns the raw response body
    async fn invoke(&self, endpoint: &str, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>>;
}

/// Resolves the execution role from the ambient credentials
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_role(&self) -> Result<String>;
}

/// AWS SDK clients sharing one loaded SDK configuration
pub struct AwsClients {
    pub store: S3Store,
    pub host: SageMakerHost,
    pub runtime: SageMakerRuntime,
    pub identity: CallerIdentity,
}

impl AwsClients {
    /// Load credentials and region from the environment for `config.aws.region`
    pub async fn connect(config: &Config) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws.region.clone()))
            .load()
            .await;

        Self {
            store: S3Store::new(&sdk_config),
            host: SageMakerHost::new(&sdk_config),
            runtime: SageMakerRuntime::new(&sdk_config),
            identity: CallerIdentity::new(&sdk_config),
        }
    }
}
