use crate::error::{Result, SagectlError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Endpoint identity persisted between `--deploy` and `--predict`/`--delete`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointState {
    pub endpoint_name: String,
    pub region: String,
}

impl EndpointState {
    #[must_use]
    pub fn new(endpoint_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            region: region.into(),
        }
    }

    /// Load state from file; a missing file is `Ok(None)`
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| SagectlError::State(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Save state atomically (tmp + rename), replacing any previous content
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SagectlError::State(format!("Failed to serialize state: {e}")))?;

        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Remove the state file; returns whether a file was removed
    pub fn remove(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
