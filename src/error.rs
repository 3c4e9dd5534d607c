use thiserror::Error;

/// Main error type for sagectl
#[derive(Error, Debug)]
pub enum SagectlError {
    #[error("Config error: {0}\n\nTroubleshooting:\n- Export S3_MODELS_BUCKET_NAME with the bucket that holds model artifacts\n- Check the config file (SAGECTL_CONFIG or ~/.config/sagectl/config.toml)\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("Download error: {0}\n\nTroubleshooting:\n- Check internet connection\n- Verify the release URL in the [model] config section\n- Make sure the artifacts directory is writable")]
    Download(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Export error: {0}\n\nTroubleshooting:\n- The exporter needs python3 with tensorflow installed\n- Override the exporter with [export] command in the config file\n- Check that the release contains the expected model file")]
    Export(String),

    #[error("Storage error: {0}\n\nTroubleshooting:\n- Check AWS credentials (aws sts get-caller-identity)\n- Verify the bucket name and AWS_REGION\n- Make sure the identity may read and write the bucket")]
    Storage(String),

    #[error("Hosting error: {0}\n\nTroubleshooting:\n- Check the SageMaker console for the endpoint and its failure reason\n- Verify the execution role can read the model artifact\n- Make sure the instance type is available in the region")]
    Hosting(String),

    #[error("Invocation error: {0}")]
    Invocation(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SagectlError>;
