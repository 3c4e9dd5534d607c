use crate::cloud::{EndpointConfigSpec, EndpointStatus, ModelHost, ModelSpec, ModelStatus};
use crate::error::{Result, SagectlError};
use async_trait::async_trait;
use aws_sdk_sagemaker::error::DisplayErrorContext;
use aws_sdk_sagemaker::types::{
    ContainerDefinition, EndpointStatus as SdkEndpointStatus, ProductionVariant,
    ProductionVariantInstanceType,
};
use aws_sdk_sagemaker::Client;

/// Variant name used for the single production variant
const VARIANT_NAME: &str = "AllTraffic";

/// SageMaker-backed [`ModelHost`]
#[derive(Debug, Clone)]
pub struct SageMakerHost {
    client: Client,
}

impl SageMakerHost {
    #[must_use]
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

fn hosting_error<E>(action: &str, name: &str, e: &E) -> SagectlError
where
    E: std::error::Error + 'static,
{
    SagectlError::Hosting(format!("Failed to {action} {name}: {}", DisplayErrorContext(e)))
}

#[async_trait]
impl ModelHost for SageMakerHost {
    async fn create_model(&self, spec: &ModelSpec) -> Result<ModelStatus> {
        let container = ContainerDefinition::builder()
            .image(&spec.image)
            .model_data_url(&spec.model_data_url)
            .build();

        let result = self
            .client
            .create_model()
            .model_name(&spec.name)
            .execution_role_arn(&spec.execution_role)
            .primary_container(container)
            .send()
            .await;

        match result {
            Ok(_) => Ok(ModelStatus::Created),
            // The service reports duplicates as a generic validation error
            Err(e)
                if e.as_service_error()
                    .and_then(aws_sdk_sagemaker::error::ProvideErrorMetadata::message)
                    .is_some_and(|m| m.contains("Cannot create already existing model")) =>
            {
                Ok(ModelStatus::AlreadyExists)
            }
            Err(e) => Err(hosting_error("create model", &spec.name, &e)),
        }
    }

    async fn create_endpoint_config(&self, spec: &EndpointConfigSpec) -> Result<()> {
        let variant = ProductionVariant::builder()
            .variant_name(VARIANT_NAME)
            .model_name(&spec.model_name)
            .initial_instance_count(spec.instance_count)
            .instance_type(ProductionVariantInstanceType::from(spec.instance_type.as_str()))
            .initial_variant_weight(1.0)
            .build();

        self.client
            .create_endpoint_config()
            .endpoint_config_name(&spec.name)
            .production_variants(variant)
            .send()
            .await
            .map_err(|e| hosting_error("create endpoint config", &spec.name, &e))?;

        Ok(())
    }

    async fn create_endpoint(&self, name: &str, config_name: &str) -> Result<()> {
        self.client
            .create_endpoint()
            .endpoint_name(name)
            .endpoint_config_name(config_name)
            .send()
            .await
            .map_err(|e| hosting_error("create endpoint", name, &e))?;

        Ok(())
    }

    async fn endpoint_status(&self, name: &str) -> Result<EndpointStatus> {
        let output = self
            .client
            .describe_endpoint()
            .endpoint_name(name)
            .send()
            .await
            .map_err(|e| hosting_error("describe endpoint", name, &e))?;

        Ok(match output.endpoint_status() {
            Some(SdkEndpointStatus::InService) => EndpointStatus::InService,
            Some(SdkEndpointStatus::Creating) => EndpointStatus::Creating,
            Some(SdkEndpointStatus::Failed) => EndpointStatus::Failed(
                output
                    .failure_reason()
                    .unwrap_or("no failure reason reported")
                    .to_string(),
            ),
            Some(other) => EndpointStatus::Other(other.as_str().to_string()),
            None => EndpointStatus::Other("unknown".to_string()),
        })
    }

    async fn delete_endpoint(&self, name: &str) -> Result<()> {
        self.client
            .delete_endpoint()
            .endpoint_name(name)
            .send()
            .await
            .map_err(|e| hosting_error("delete endpoint", name, &e))?;
        Ok(())
    }

    async fn list_endpoint_configs(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut pages = self.client.list_endpoint_configs().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| hosting_error("list", "endpoint configs", &e))?;
            names.extend(
                page.endpoint_configs()
                    .iter()
                    .filter_map(|summary| summary.endpoint_config_name().map(str::to_string)),
            );
        }

        Ok(names)
    }

    async fn delete_endpoint_config(&self, name: &str) -> Result<()> {
        self.client
            .delete_endpoint_config()
            .endpoint_config_name(name)
            .send()
            .await
            .map_err(|e| hosting_error("delete endpoint config", name, &e))?;
        Ok(())
    }

    async fn delete_model(&self, name: &str) -> Result<()> {
        self.client
            .delete_model()
            .model_name(name)
            .send()
            .await
            .map_err(|e| hosting_error("delete model", name, &e))?;
        Ok(())
    }
}

/// Registry account hosting the framework serving containers in `region`
fn registry_account(region: &str) -> &'static str {
    match region {
        "af-south-1" => "626614931356",
        "ap-east-1" => "871362719292",
        "ap-south-2" => "772153158452",
        "ap-southeast-3" => "907027046896",
        "ap-southeast-4" => "457447274322",
        "eu-central-2" => "380420809688",
        "eu-south-1" => "692866216735",
        "eu-south-2" => "503227376785",
        "il-central-1" => "780543022126",
        "me-central-1" => "914824155844",
        "me-south-1" => "217643126080",
        "cn-north-1" | "cn-northwest-1" => "727897471807",
        "us-gov-west-1" => "442386744353",
        "us-gov-east-1" => "446045086412",
        _ => "763104351884",
    }
}

/// TensorFlow serving container for a framework version and instance type
#[must_use]
pub fn serving_image_uri(region: &str, framework_version: &str, instance_type: &str) -> String {
    let family = instance_type.trim_start_matches("ml.");
    let processor = if family.starts_with('p') || family.starts_with('g') {
        "gpu"
    } else {
        "cpu"
    };
    let domain = if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    };

    format!(
        "{}.dkr.ecr.{region}.{domain}/tensorflow-inference:{framework_version}-{processor}",
        registry_account(region)
    )
}
