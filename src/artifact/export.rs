use crate::error::{Result, SagectlError};
use std::fs;
use std::path::{Path, PathBuf};
use subprocess::{Exec, Redirection};

/// Marker file of a serving export directory
pub const SAVED_MODEL_FILE: &str = "saved_model.pb";

/// Produces the versioned serving export from a downloaded release
///
/// A release may already carry a serving export, in which case it is copied
/// as-is. Otherwise the trained model file is handed to an external exporter
/// command, invoked as `<command...> <source model> <target dir>`.
#[derive(Debug, Clone)]
pub struct ModelExporter {
    command: Vec<String>,
}

impl ModelExporter {
    #[must_use]
    pub const fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Export into `target`, replacing whatever was there
    ///
    /// `skip` is excluded from the search for an existing export so a previous
    /// run's output is never picked up as the source.
    ///
    /// # Errors
    /// - Returns error if neither an export nor `source_file` exist under `search_root`
    /// - Returns error if the exporter command fails or leaves no `saved_model.pb`
    pub fn export(
        &self,
        search_root: &Path,
        source_file: &str,
        target: &Path,
        skip: &Path,
    ) -> Result<()> {
        if target.exists() {
            fs::remove_dir_all(target)?;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Some(existing) = find_saved_model(search_root, skip)? {
            tracing::info!(
                "Release already contains a serving export at {}",
                existing.display()
            );
            copy_dir(&existing, target)?;
        } else {
            let source = search_root.join(source_file);
            if !source.exists() {
                return Err(SagectlError::Export(format!(
                    "Neither a serving export nor {} found under {}",
                    source_file,
                    search_root.display()
                )));
            }
            self.run_exporter(&source, target)?;
        }

        if !target.join(SAVED_MODEL_FILE).is_file() {
            return Err(SagectlError::Export(format!(
                "Export at {} is missing {SAVED_MODEL_FILE}",
                target.display()
            )));
        }

        Ok(())
    }

    fn run_exporter(&self, source: &Path, target: &Path) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| SagectlError::Export("Exporter command is empty".to_string()))?;

        let program = which::which(program).map_err(|e| {
            SagectlError::Export(format!("Exporter '{program}' not found in PATH: {e}"))
        })?;

        tracing::info!(
            "Exporting {} to {} with {}",
            source.display(),
            target.display(),
            program.display()
        );

        let capture = Exec::cmd(&program)
            .args(args)
            .arg(source)
            .arg(target)
            .stdout(Redirection::Pipe)
            .stderr(Redirection::Pipe)
            .capture()
            .map_err(|e| SagectlError::Export(format!("Failed to run exporter: {e}")))?;

        let stdout = capture.stdout_str();
        if !stdout.trim().is_empty() {
            tracing::debug!("exporter stdout: {}", stdout.trim());
        }

        if !capture.exit_status.success() {
            return Err(SagectlError::Export(format!(
                "Exporter exited with {:?}: {}",
                capture.exit_status,
                capture.stderr_str().trim()
            )));
        }

        Ok(())
    }
}

/// First directory under `root` (excluding `skip`) that holds `saved_model.pb`
fn find_saved_model(root: &Path, skip: &Path) -> Result<Option<PathBuf>> {
    if !root.is_dir() || root == skip {
        return Ok(None);
    }
    if root.join(SAVED_MODEL_FILE).is_file() {
        return Ok(Some(root.to_path_buf()));
    }

    let mut children: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    children.sort();

    for child in children {
        if let Some(found) = find_saved_model(&child, skip)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let target = dest.join(entry.file_name());

        if path.is_dir() {
            copy_dir(&path, &target)?;
        } else {
            fs::copy(&path, &target)?;
        }
    }

    Ok(())
}
