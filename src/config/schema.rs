use crate::labels::LabelMap;
use crate::payload::PayloadEncoding;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub predict: PredictConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub bucket: String,
    pub role: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_release_url")]
    pub release_url: String,
    #[serde(default = "default_source_file")]
    pub source_file: String,
    #[serde(default = "default_framework_version")]
    pub framework_version: String,
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    #[serde(default = "default_instance_count")]
    pub instance_count: i32,
    /// Serving container override; resolved from the framework version when unset
    pub serving_image: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DataConfig {
    #[serde(default = "default_image_side")]
    pub image_width: u32,
    #[serde(default = "default_image_side")]
    pub image_height: u32,
    #[serde(default = "default_num_channels")]
    pub num_channels: u32,
    /// Class names ordered by model output index
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PathsConfig {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PredictConfig {
    #[serde(default)]
    pub encoding: PayloadEncoding,
    #[serde(default = "default_samples")]
    pub samples: usize,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DeployConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ExportConfig {
    /// Program and leading arguments; the source model path and the export
    /// directory are appended.
    #[serde(default = "default_export_command")]
    pub command: Vec<String>,
}

const EXPORT_SCRIPT: &str = "import sys\n\
import tensorflow as tf\n\
model = tf.keras.models.load_model(sys.argv[1])\n\
if hasattr(model, 'export'):\n    model.export(sys.argv[2])\n\
else:\n    tf.saved_model.save(model, sys.argv[2])\n";

// Default value functions
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_model_name() -> String {
    "model-mobilenetv2_train_base_True.v1".to_string()
}
fn default_release_url() -> String {
    "https://github.com/dlops-io/model-deployment-aws/releases/download/v1.0/mobilenetv2_train_base_True.zip"
        .to_string()
}
fn default_source_file() -> String {
    "mobilenetv2_train_base_True.keras".to_string()
}
fn default_framework_version() -> String {
    "2.13".to_string()
}
fn default_instance_type() -> String {
    "ml.m5.xlarge".to_string()
}
const fn default_instance_count() -> i32 {
    1
}
const fn default_image_side() -> u32 {
    224
}
const fn default_num_channels() -> u32 {
    3
}
fn default_labels() -> Vec<String> {
    ["parmigiano", "gruyere", "brie", "gouda"]
        .iter()
        .map(ToString::to_string)
        .collect()
}
fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_state_file() -> PathBuf {
    PathBuf::from("endpoint_config.json")
}
const fn default_samples() -> usize {
    5
}
const fn default_poll_interval_secs() -> u64 {
    30
}
const fn default_wait_timeout_secs() -> u64 {
    1800
}
fn default_export_command() -> Vec<String> {
    vec![
        "python3".to_string(),
        "-c".to_string(),
        EXPORT_SCRIPT.to_string(),
    ]
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            bucket: String::new(),
            role: None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            release_url: default_release_url(),
            source_file: default_source_file(),
            framework_version: default_framework_version(),
            instance_type: default_instance_type(),
            instance_count: default_instance_count(),
            serving_image: None,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            image_width: default_image_side(),
            image_height: default_image_side(),
            num_channels: default_num_channels(),
            labels: default_labels(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            data_dir: default_data_dir(),
            state_file: default_state_file(),
        }
    }
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            encoding: PayloadEncoding::default(),
            samples: default_samples(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            command: default_export_command(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws: AwsConfig::default(),
            model: ModelConfig::default(),
            data: DataConfig::default(),
            paths: PathsConfig::default(),
            predict: PredictConfig::default(),
            deploy: DeployConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Model name normalised to the hosting service's naming rules
    #[must_use]
    pub fn resource_name(&self) -> String {
        self.model.name.replace(['.', '_'], "-")
    }

    /// Object key of the uploaded model archive
    #[must_use]
    pub fn artifact_key(&self) -> String {
        format!("{}/model.tar.gz", self.model.name)
    }

    /// Prefix under which every uploaded object for this model lives
    #[must_use]
    pub fn artifact_prefix(&self) -> String {
        format!("{}/", self.model.name)
    }

    #[must_use]
    pub fn artifact_uri(&self) -> String {
        format!("s3://{}/{}", self.aws.bucket, self.artifact_key())
    }

    /// Endpoint name used when no state file is present
    #[must_use]
    pub fn default_endpoint_name(&self) -> String {
        format!("{}-endpoint", self.resource_name())
    }

    #[must_use]
    pub fn label_map(&self) -> LabelMap {
        LabelMap::new(self.data.labels.clone())
    }

    /// Local working directory of the model (`artifacts/<model>`)
    #[must_use]
    pub fn local_model_dir(&self) -> PathBuf {
        self.paths.artifacts_dir.join(&self.model.name)
    }

    /// Versioned serving export (`artifacts/<model>/1`)
    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.local_model_dir().join("1")
    }

    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.local_model_dir().join("model.tar.gz")
    }
}
