use crate::cloud::InferenceRuntime;
use crate::error::{Result, SagectlError};
use async_trait::async_trait;
use aws_sdk_sagemakerruntime::error::DisplayErrorContext;
use aws_sdk_sagemakerruntime::primitives::Blob;
use aws_sdk_sagemakerruntime::Client;

/// SageMaker Runtime-backed [`InferenceRuntime`]
#[derive(Debug, Clone)]
pub struct SageMakerRuntime {
    client: Client,
}

impl SageMakerRuntime {
    #[must_use]
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl InferenceRuntime for SageMakerRuntime {
    async fn invoke(&self, endpoint: &str, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let output = self
            .client
            .invoke_endpoint()
            .endpoint_name(endpoint)
            .content_type(content_type)
            .accept(content_type)
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                SagectlError::Invocation(format!(
                    "Endpoint {endpoint} rejected the request: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(output
            .body()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default())
    }
}
