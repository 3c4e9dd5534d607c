use crate::cloud::{ModelHost, ObjectStore, MAX_DELETE_BATCH};
use crate::config::Config;
use crate::error::Result;
use crate::state::EndpointState;

/// What a teardown removed and what it had to skip
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub endpoint_deleted: Option<String>,
    pub endpoint_configs_deleted: Vec<String>,
    pub model_deleted: bool,
    pub objects_deleted: usize,
    pub state_removed: bool,
    pub warnings: Vec<String>,
}

impl TeardownReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        println!("Warning: {message}");
        self.warnings.push(message);
    }
}

/// Remove the endpoint, its configs, the model, the uploaded objects and the
/// local state file
///
/// Every step runs regardless of earlier failures; failures become warnings
/// in the returned report.
pub async fn run(
    config: &Config,
    host: &dyn ModelHost,
    store: &dyn ObjectStore,
) -> Result<TeardownReport> {
    let mut report = TeardownReport::default();
    let model_name = config.resource_name();

    let endpoint_name = match EndpointState::load(&config.paths.state_file) {
        Ok(state) => state.map(|s| s.endpoint_name),
        Err(e) => {
            report.warn(format!("could not read endpoint state: {e}"));
            None
        }
    };

    if let Some(name) = endpoint_name {
        println!("Deleting endpoint: {name}");
        match host.delete_endpoint(&name).await {
            Ok(()) => report.endpoint_deleted = Some(name),
            Err(e) => report.warn(format!("could not delete endpoint {name}: {e}")),
        }
    }

    delete_endpoint_configs(host, &model_name, &mut report).await;

    println!("Deleting model: {model_name}");
    match host.delete_model(&model_name).await {
        Ok(()) => report.model_deleted = true,
        Err(e) => report.warn(format!("could not delete model {model_name}: {e}")),
    }

    delete_objects(config, store, &mut report).await;

    match EndpointState::remove(&config.paths.state_file) {
        Ok(true) => {
            report.state_removed = true;
            println!("Removed {}", config.paths.state_file.display());
        }
        Ok(false) => {}
        Err(e) => report.warn(format!(
            "could not remove {}: {e}",
            config.paths.state_file.display()
        )),
    }

    Ok(report)
}

/// Delete every endpoint config whose name contains the model name
async fn delete_endpoint_configs(
    host: &dyn ModelHost,
    model_name: &str,
    report: &mut TeardownReport,
) {
    let names = match host.list_endpoint_configs().await {
        Ok(names) => names,
        Err(e) => {
            report.warn(format!("listing endpoint configs failed: {e}"));
            return;
        }
    };

    // TODO: substring matching also catches configs of other models whose
    // names contain this one; tighten once the naming contract is settled.
    for name in names.into_iter().filter(|n| n.contains(model_name)) {
        println!("Deleting endpoint config: {name}");
        match host.delete_endpoint_config(&name).await {
            Ok(()) => report.endpoint_configs_deleted.push(name),
            Err(e) => report.warn(format!("could not delete endpoint config {name}: {e}")),
        }
    }
}

/// Delete everything under the model prefix, page by page in bounded batches
async fn delete_objects(config: &Config, store: &dyn ObjectStore, report: &mut TeardownReport) {
    let bucket = &config.aws.bucket;
    let prefix = config.artifact_prefix();
    println!("Deleting S3 artifacts s3://{bucket}/{prefix}");

    let mut pending: Vec<String> = Vec::with_capacity(MAX_DELETE_BATCH);
    let mut continuation = None;

    loop {
        let page = match store.list_page(bucket, &prefix, continuation.take()).await {
            Ok(page) => page,
            Err(e) => {
                report.warn(format!("could not list s3://{bucket}/{prefix}: {e}"));
                break;
            }
        };

        for key in page.keys {
            pending.push(key);
            if pending.len() == MAX_DELETE_BATCH {
                delete_batch(store, bucket, &mut pending, report).await;
            }
        }

        match page.next {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    if !pending.is_empty() {
        delete_batch(store, bucket, &mut pending, report).await;
    }
}

async fn delete_batch(
    store: &dyn ObjectStore,
    bucket: &str,
    pending: &mut Vec<String>,
    report: &mut TeardownReport,
) {
    match store.delete_keys(bucket, pending).await {
        Ok(deleted) => report.objects_deleted += deleted,
        Err(e) => report.warn(format!(
            "could not delete {} objects from {bucket}: {e}",
            pending.len()
        )),
    }
    pending.clear();
}
