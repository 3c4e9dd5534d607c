//! Configuration module for sagectl
//!
//! Builds one immutable [`Config`] at startup from three layers:
//!
//! 1. embedded defaults,
//! 2. an optional TOML file (`$SAGECTL_CONFIG`, else
//!    `$XDG_CONFIG_HOME/sagectl/config.toml` when it exists),
//! 3. environment variables (`AWS_REGION`, `S3_MODELS_BUCKET_NAME`,
//!    `SAGEMAKER_ROLE`, `SAGECTL_PAYLOAD_ENCODING`).
//!
//! Partial config files are merged with defaults using serde's default attributes.
//!
//! # Example
//!
//! ```no_run
//! use sagectl::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Bucket: {}", config.aws.bucket);
//! println!("Endpoint fallback: {}", config.default_endpoint_name());
//! ```

pub mod schema;

pub use schema::Config;

use crate::error::{Result, SagectlError};
use std::path::{Path, PathBuf};

/// Channel count of every encoded image
const RGB_CHANNELS: u32 = 3;

pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_BUCKET: &str = "S3_MODELS_BUCKET_NAME";
pub const ENV_ROLE: &str = "SAGEMAKER_ROLE";
pub const ENV_ENCODING: &str = "SAGECTL_PAYLOAD_ENCODING";
pub const ENV_CONFIG_PATH: &str = "SAGECTL_CONFIG";

impl Config {
    /// Load the layered configuration and validate it
    ///
    /// # Errors
    /// - Returns error if an explicitly named config file is missing or malformed
    /// - Returns error if no bucket name is configured
    pub fn load() -> Result<Self> {
        let mut config = match Self::file_path()? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        tracing::debug!(
            region = %config.aws.region,
            bucket = %config.aws.bucket,
            model = %config.model.name,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SagectlError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| SagectlError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Overlay environment variables on top of file/default values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(region) = non_empty_var(ENV_REGION) {
            self.aws.region = region;
        }
        if let Some(bucket) = non_empty_var(ENV_BUCKET) {
            self.aws.bucket = bucket;
        }
        if let Some(role) = non_empty_var(ENV_ROLE) {
            self.aws.role = Some(role);
        }
        if let Some(encoding) = non_empty_var(ENV_ENCODING) {
            self.predict.encoding = encoding.parse()?;
        }
        Ok(())
    }

    /// Check invariants every command relies on
    pub fn validate(&self) -> Result<()> {
        if self.aws.bucket.trim().is_empty() {
            return Err(SagectlError::Config(format!(
                "{ENV_BUCKET} is not set"
            )));
        }
        if self.data.labels.is_empty() {
            return Err(SagectlError::Config(
                "[data] labels must name at least one class".to_string(),
            ));
        }
        if self.data.image_width == 0 || self.data.image_height == 0 {
            return Err(SagectlError::Config(
                "[data] image dimensions must be non-zero".to_string(),
            ));
        }
        if self.data.num_channels != RGB_CHANNELS {
            return Err(SagectlError::Config(format!(
                "[data] num_channels = {} is not supported; images are sent as RGB ({RGB_CHANNELS} channels)",
                self.data.num_channels
            )));
        }
        if self.export.command.is_empty() {
            return Err(SagectlError::Config(
                "[export] command must name a program".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve which config file to read, if any
    fn file_path() -> Result<Option<PathBuf>> {
        if let Some(explicit) = non_empty_var(ENV_CONFIG_PATH) {
            let path = PathBuf::from(explicit);
            if !path.exists() {
                return Err(SagectlError::Config(format!(
                    "{ENV_CONFIG_PATH} points to missing file {}",
                    path.display()
                )));
            }
            return Ok(Some(path));
        }

        Ok(dirs::config_dir()
            .map(|dir| dir.join("sagectl").join("config.toml"))
            .filter(|path| path.exists()))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
