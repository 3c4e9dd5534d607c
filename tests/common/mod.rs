#![allow(dead_code)]

use async_trait::async_trait;
use sagectl::cloud::{
    BucketStatus, EndpointConfigSpec, EndpointStatus, IdentityResolver, InferenceRuntime,
    KeyPage, ModelHost, ModelSpec, ModelStatus, ObjectStore,
};
use sagectl::config::Config;
use sagectl::error::{Result, SagectlError};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Config pointing every local path into `dir`
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.aws.bucket = "cheese-models".to_string();
    config.paths.artifacts_dir = dir.join("artifacts");
    config.paths.data_dir = dir.join("data");
    config.paths.state_file = dir.join("endpoint_config.json");
    config.deploy.poll_interval_secs = 0;
    config
}

/// Write `count` small JPEGs into the config's data directory
pub fn write_images(config: &Config, count: usize) {
    std::fs::create_dir_all(&config.paths.data_dir).unwrap();
    for i in 0..count {
        let shade = u8::try_from(i * 40 % 256).unwrap();
        image::RgbImage::from_pixel(32, 24, image::Rgb([shade, 100, 200]))
            .save(config.paths.data_dir.join(format!("cheese-{i}.jpg")))
            .unwrap();
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub bucket_exists: Mutex<bool>,
    pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Keys returned per listing page; 0 means 1000
    pub page_size: usize,
    /// Zero-based delete calls that should fail
    pub failing_deletes: HashSet<usize>,
    pub fail_listing: bool,
    pub delete_batches: Mutex<Vec<usize>>,
    pub uploads: Mutex<Vec<(String, String)>>,
}

impl FakeStore {
    pub fn with_objects(keys: impl IntoIterator<Item = String>) -> Self {
        let store = Self::default();
        store
            .objects
            .lock()
            .unwrap()
            .extend(keys.into_iter().map(|k| (k, Vec::new())));
        store
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn ensure_bucket(&self, _bucket: &str, _region: &str) -> Result<BucketStatus> {
        let mut exists = self.bucket_exists.lock().unwrap();
        if *exists {
            Ok(BucketStatus::AlreadyExists)
        } else {
            *exists = true;
            Ok(BucketStatus::Created)
        }
    }

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn list_page(
        &self,
        _bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<KeyPage> {
        if self.fail_listing {
            return Err(SagectlError::Storage("listing denied".to_string()));
        }

        // Like S3, the token is the last key served so deletions between
        // pages do not shift the listing
        let page_size = if self.page_size == 0 { 1000 } else { self.page_size };
        let matching: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| continuation.as_ref().map_or(true, |after| *k > after))
            .cloned()
            .collect();

        let keys: Vec<String> = matching.iter().take(page_size).cloned().collect();
        let next = if matching.len() > page_size {
            keys.last().cloned()
        } else {
            None
        };
        Ok(KeyPage { keys, next })
    }

    async fn delete_keys(&self, _bucket: &str, keys: &[String]) -> Result<usize> {
        let call = {
            let mut batches = self.delete_batches.lock().unwrap();
            batches.push(keys.len());
            batches.len() - 1
        };
        assert!(keys.len() <= sagectl::cloud::MAX_DELETE_BATCH);

        if self.failing_deletes.contains(&call) {
            return Err(SagectlError::Storage(format!("batch {call} rejected")));
        }

        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(keys.len())
    }
}

pub struct FakeHost {
    pub calls: Mutex<Vec<String>>,
    pub models: Mutex<HashSet<String>>,
    pub model_specs: Mutex<Vec<ModelSpec>>,
    pub endpoint_configs: Mutex<Vec<String>>,
    pub config_specs: Mutex<Vec<EndpointConfigSpec>>,
    pub endpoints: Mutex<Vec<(String, String)>>,
    /// Statuses handed out by `endpoint_status`; InService once drained
    pub statuses: Mutex<VecDeque<EndpointStatus>>,
    pub fail_delete_endpoint: bool,
    pub fail_list_configs: bool,
    pub fail_delete_model: bool,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            models: Mutex::new(HashSet::new()),
            model_specs: Mutex::new(Vec::new()),
            endpoint_configs: Mutex::new(Vec::new()),
            config_specs: Mutex::new(Vec::new()),
            endpoints: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            fail_delete_endpoint: false,
            fail_list_configs: false,
            fail_delete_model: false,
        }
    }
}

impl FakeHost {
    pub fn with_endpoint_configs(names: &[&str]) -> Self {
        let host = Self::default();
        host.endpoint_configs
            .lock()
            .unwrap()
            .extend(names.iter().map(ToString::to_string));
        host
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ModelHost for FakeHost {
    async fn create_model(&self, spec: &ModelSpec) -> Result<ModelStatus> {
        self.record(format!("create_model {}", spec.name));
        self.model_specs.lock().unwrap().push(spec.clone());
        if self.models.lock().unwrap().insert(spec.name.clone()) {
            Ok(ModelStatus::Created)
        } else {
            Ok(ModelStatus::AlreadyExists)
        }
    }

    async fn create_endpoint_config(&self, spec: &EndpointConfigSpec) -> Result<()> {
        self.record(format!("create_endpoint_config {}", spec.name));
        self.endpoint_configs.lock().unwrap().push(spec.name.clone());
        self.config_specs.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn create_endpoint(&self, name: &str, config_name: &str) -> Result<()> {
        self.record(format!("create_endpoint {name}"));
        self.endpoints
            .lock()
            .unwrap()
            .push((name.to_string(), config_name.to_string()));
        Ok(())
    }

    async fn endpoint_status(&self, name: &str) -> Result<EndpointStatus> {
        self.record(format!("endpoint_status {name}"));
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(EndpointStatus::InService))
    }

    async fn delete_endpoint(&self, name: &str) -> Result<()> {
        self.record(format!("delete_endpoint {name}"));
        if self.fail_delete_endpoint {
            return Err(SagectlError::Hosting(format!("endpoint {name} not found")));
        }
        Ok(())
    }

    async fn list_endpoint_configs(&self) -> Result<Vec<String>> {
        self.record("list_endpoint_configs".to_string());
        if self.fail_list_configs {
            return Err(SagectlError::Hosting("throttled".to_string()));
        }
        Ok(self.endpoint_configs.lock().unwrap().clone())
    }

    async fn delete_endpoint_config(&self, name: &str) -> Result<()> {
        self.record(format!("delete_endpoint_config {name}"));
        self.endpoint_configs.lock().unwrap().retain(|n| n != name);
        Ok(())
    }

    async fn delete_model(&self, name: &str) -> Result<()> {
        self.record(format!("delete_model {name}"));
        if self.fail_delete_model || !self.models.lock().unwrap().remove(name) {
            return Err(SagectlError::Hosting(format!("model {name} not found")));
        }
        Ok(())
    }
}

/// Runtime answering every invocation with a fixed body, or failing
pub struct FakeRuntime {
    pub response: std::result::Result<Vec<u8>, String>,
    pub invocations: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl FakeRuntime {
    pub fn responding(body: &str) -> Self {
        Self {
            response: Ok(body.as_bytes().to_vec()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceRuntime for FakeRuntime {
    async fn invoke(&self, endpoint: &str, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        self.invocations.lock().unwrap().push((
            endpoint.to_string(),
            content_type.to_string(),
            body,
        ));
        self.response
            .clone()
            .map_err(SagectlError::Invocation)
    }
}

pub struct FakeIdentity(pub std::result::Result<String, String>);

#[async_trait]
impl IdentityResolver for FakeIdentity {
    async fn resolve_role(&self) -> Result<String> {
        self.0.clone().map_err(SagectlError::Identity)
    }
}

/// Serve a single HTTP response on localhost; returns the URL for `path`
pub async fn serve_once(status: &str, body: Vec<u8>, path: &str) -> String {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        body.len()
    );
    serve_raw(head, body, path).await
}

/// Serve `head` followed by `body` verbatim, whatever the head claims
pub async fn serve_raw(head: String, body: Vec<u8>, path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.ok();
        socket.shutdown().await.ok();
    });

    format!("http://{addr}{path}")
}
