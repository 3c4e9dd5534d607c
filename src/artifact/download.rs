use crate::artifact::archive;
use crate::error::{Result, SagectlError};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write buffer size; bounds memory held per chunk of the response body
pub const CHUNK_SIZE: usize = 8192;

/// Free space kept on top of the announced download size
const DISK_MARGIN_BYTES: u64 = 100 * 1024 * 1024;

/// Streaming downloader for model releases
pub struct ArtifactDownloader {
    client: reqwest::Client,
    show_progress: bool,
}

impl ArtifactDownloader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            show_progress: true,
        }
    }

    /// Enable or disable the terminal progress bar
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Download `url` into `dir`, keeping the last path segment as file name
    ///
    /// # Errors
    /// - Returns error on connection failures or non-success HTTP status
    /// - Returns error if the target filesystem lacks space for the body
    pub async fn fetch(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let dest = dir.join(file_name_from_url(url)?);

        tracing::info!("Downloading {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SagectlError::Download(format!("Failed to fetch {url}: {e}")))?;

        let total = response.content_length();
        if let Some(total) = total {
            check_disk_space(dir, total)?;
        }

        let progress = self.progress_bar(total);
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, File::create(&dest)?);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                SagectlError::Download(format!("Connection dropped after {written} bytes: {e}"))
            })?;
            writer.write_all(&chunk)?;
            written += chunk.len() as u64;
            progress.set_position(written);
        }

        writer.flush()?;
        progress.finish_and_clear();

        tracing::info!(
            "Downloaded {} ({})",
            dest.display(),
            format_bytes(written)
        );

        Ok(dest)
    }

    /// Download `url` into `dir` and unpack it there
    pub async fn fetch_and_extract(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let archive_path = self.fetch(url, dir).await?;
        archive::extract(&archive_path, dir)?;
        Ok(archive_path)
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                ) {
                    bar.set_style(style);
                }
                bar
            }
            None => ProgressBar::new_spinner(),
        }
    }
}

impl Default for ArtifactDownloader {
    fn default() -> Self {
        Self::new()
    }
}

/// Last non-empty path segment of a URL
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| SagectlError::Download(format!("Invalid URL {url}: {e}")))?;

    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(ToString::to_string)
        .ok_or_else(|| SagectlError::Download(format!("URL has no file name: {url}")))
}

/// Check if enough disk space is available under `dir`
fn check_disk_space(dir: &Path, required_bytes: u64) -> Result<()> {
    let stats = nix::sys::statvfs::statvfs(dir)
        .map_err(|e| SagectlError::Other(format!("Failed to check disk space: {e}")))?;

    // Content-Length is server-controlled; an absurd value fails the check
    let available_bytes =
        u64::from(stats.blocks_available()).saturating_mul(u64::from(stats.block_size()));
    let required_with_margin = required_bytes.saturating_add(DISK_MARGIN_BYTES);

    if available_bytes < required_with_margin {
        return Err(SagectlError::Download(format!(
            "Not enough disk space in {}: {} required, {} available",
            dir.display(),
            format_bytes(required_with_margin),
            format_bytes(available_bytes)
        )));
    }

    Ok(())
}

/// Format bytes as human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
        assert_eq!(format_bytes(1_610_612_736), "1.50 GB");
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url(
                "https://github.com/dlops-io/model-deployment-aws/releases/download/v1.0/mobilenetv2_train_base_True.zip"
            )
            .unwrap(),
            "mobilenetv2_train_base_True.zip"
        );
        assert_eq!(
            file_name_from_url("http://127.0.0.1:8080/files/model.tar.gz/").unwrap(),
            "model.tar.gz"
        );
        assert!(file_name_from_url("https://example.com/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    #[test]
    fn test_disk_space_check_rejects_huge_download() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_disk_space(dir.path(), u64::MAX / 2).is_err());
    }

    #[test]
    fn test_disk_space_check_saturates_near_max() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_disk_space(dir.path(), u64::MAX - 1);
        assert!(matches!(result, Err(SagectlError::Download(_))));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ArtifactDownloader::new()
            .with_progress(false)
            .fetch("http://127.0.0.1:9/model.zip", dir.path())
            .await;

        assert!(matches!(result, Err(SagectlError::Download(_))));
    }
}
