use crate::cloud::{
    serving_image_uri, EndpointConfigSpec, EndpointStatus, IdentityResolver, ModelHost,
    ModelSpec, ModelStatus,
};
use crate::config::{Config, ENV_ROLE};
use crate::error::{Result, SagectlError};
use crate::state::EndpointState;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

/// Last timestamp (unix seconds) handed out for an endpoint name
static LAST_ENDPOINT_STAMP: AtomicI64 = AtomicI64::new(i64::MIN);

/// `<base>-endpoint-<YYYYmmddHHMMSS>` for the given instant
#[must_use]
pub fn format_endpoint_name(base: &str, at: &DateTime<Utc>) -> String {
    format!("{base}-endpoint-{}", at.format("%Y%m%d%H%M%S"))
}

/// Endpoint name that never repeats within this process
///
/// The timestamp is pushed one second past the previous one when the clock
/// has not advanced since the last call.
#[must_use]
pub fn unique_endpoint_name(base: &str) -> String {
    let now = Utc::now();
    let wanted = now.timestamp();
    let previous = LAST_ENDPOINT_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(wanted.max(last.saturating_add(1)))
        })
        .unwrap_or_else(|last| last);
    let stamp = wanted.max(previous.saturating_add(1));

    let at = DateTime::from_timestamp(stamp, 0).unwrap_or(now);
    format_endpoint_name(base, &at)
}

/// Role from config, else from the ambient identity
///
/// Resolution failure prints guidance and yields `None`.
async fn resolve_role(config: &Config, identity: &dyn IdentityResolver) -> Option<String> {
    if let Some(role) = config.aws.role.as_deref().filter(|r| !r.trim().is_empty()) {
        return Some(role.to_string());
    }

    match identity.resolve_role().await {
        Ok(role) => Some(role),
        Err(e) => {
            tracing::error!("Error getting execution role: {e}");
            println!("Error getting execution role: {e}");
            println!(
                "Please set {ENV_ROLE} environment variable with your SageMaker execution role ARN"
            );
            println!(
                "Example: arn:aws:iam::123456789012:role/service-role/AmazonSageMaker-ExecutionRole"
            );
            None
        }
    }
}

/// Register the uploaded artifact and bring up a real-time endpoint
///
/// Returns `Ok(None)` when no execution role could be resolved.
///
/// # Errors
/// - Returns error if registration, endpoint creation or the wait fails
/// - Returns error if the state file cannot be written
pub async fn run(
    config: &Config,
    identity: &dyn IdentityResolver,
    host: &dyn ModelHost,
) -> Result<Option<EndpointState>> {
    let Some(role) = resolve_role(config, identity).await else {
        return Ok(None);
    };

    let model_name = config.resource_name();
    let image = config.model.serving_image.clone().unwrap_or_else(|| {
        serving_image_uri(
            &config.aws.region,
            &config.model.framework_version,
            &config.model.instance_type,
        )
    });

    let spec = ModelSpec {
        name: model_name.clone(),
        image,
        model_data_url: config.artifact_uri(),
        execution_role: role,
    };
    tracing::debug!(?spec, "Registering model");

    if host.create_model(&spec).await? == ModelStatus::AlreadyExists {
        tracing::warn!("Model {model_name} already registered, reusing it");
    }

    println!("Deploying model to SageMaker endpoint...");
    let endpoint_name = unique_endpoint_name(&model_name);

    host.create_endpoint_config(&EndpointConfigSpec {
        name: endpoint_name.clone(),
        model_name,
        instance_type: config.model.instance_type.clone(),
        instance_count: config.model.instance_count,
    })
    .await?;
    host.create_endpoint(&endpoint_name, &endpoint_name).await?;

    wait_in_service(
        host,
        &endpoint_name,
        Duration::from_secs(config.deploy.poll_interval_secs),
        Duration::from_secs(config.deploy.wait_timeout_secs),
    )
    .await?;

    println!("Model deployed successfully!");
    println!("Endpoint name: {endpoint_name}");

    let state = EndpointState::new(endpoint_name, config.aws.region.clone());
    state.save(&config.paths.state_file)?;
    println!(
        "Endpoint configuration saved to {}",
        config.paths.state_file.display()
    );

    Ok(Some(state))
}

/// Poll until the endpoint is in service
async fn wait_in_service(
    host: &dyn ModelHost,
    name: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<()> {
    let started = Instant::now();

    loop {
        match host.endpoint_status(name).await? {
            EndpointStatus::InService => return Ok(()),
            EndpointStatus::Failed(reason) => {
                return Err(SagectlError::Hosting(format!(
                    "Endpoint {name} failed to deploy: {reason}"
                )));
            }
            status => {
                if started.elapsed() >= timeout {
                    return Err(SagectlError::Hosting(format!(
                        "Endpoint {name} not in service after {}s (last status {status:?})",
                        timeout.as_secs()
                    )));
                }
                tracing::info!("Endpoint {name} status {status:?}, waiting");
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_endpoint_name() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            format_endpoint_name("model-x", &at),
            "model-x-endpoint-20240101000000"
        );
    }

    #[test]
    fn test_unique_names_never_collide() {
        let names: Vec<String> = (0..5).map(|_| unique_endpoint_name("model-x")).collect();

        for (i, name) in names.iter().enumerate() {
            assert!(name.starts_with("model-x-endpoint-"));
            assert!(name.len() <= 63, "{name} exceeds the endpoint name limit");
            for other in &names[i + 1..] {
                assert_ne!(name, other);
            }
        }
    }
}
