use crate::artifact::{archive, ArtifactDownloader, ModelExporter};
use crate::cloud::{BucketStatus, ObjectStore};
use crate::config::Config;
use crate::error::Result;
use std::path::PathBuf;

/// Where the packaged model ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedArtifact {
    pub archive_path: PathBuf,
    pub key: String,
    pub uri: String,
}

/// Create the artifact bucket unless it already exists
pub async fn ensure_bucket(config: &Config, store: &dyn ObjectStore) -> Result<BucketStatus> {
    let bucket = &config.aws.bucket;
    let status = store.ensure_bucket(bucket, &config.aws.region).await?;

    match status {
        BucketStatus::Created => println!("Created bucket {bucket}"),
        BucketStatus::AlreadyExists => {
            tracing::info!("Bucket {bucket} already exists");
            println!("Bucket {bucket} already exists");
        }
    }

    Ok(status)
}

/// Download the release, re-export it, archive it and upload the archive
///
/// # Errors
/// - Returns error if the bucket cannot be created for reasons other than existing
/// - Returns error if the download, export, packaging or upload fails
pub async fn run(
    config: &Config,
    store: &dyn ObjectStore,
    downloader: &ArtifactDownloader,
    exporter: &ModelExporter,
) -> Result<PreparedArtifact> {
    ensure_bucket(config, store).await?;

    let artifacts_dir = &config.paths.artifacts_dir;
    downloader
        .fetch_and_extract(&config.model.release_url, artifacts_dir)
        .await?;

    let export_dir = config.export_dir();
    exporter.export(
        artifacts_dir,
        &config.model.source_file,
        &export_dir,
        &config.local_model_dir(),
    )?;
    println!("Exported serving model to {}", export_dir.display());

    let archive_path = config.archive_path();
    archive::package(&export_dir, &archive_path)?;

    let key = config.artifact_key();
    let uri = config.artifact_uri();
    println!("Uploading model to {uri}");
    store
        .upload_file(&config.aws.bucket, &key, &archive_path)
        .await?;
    println!("Model uploaded successfully to S3");

    Ok(PreparedArtifact {
        archive_path,
        key,
        uri,
    })
}
