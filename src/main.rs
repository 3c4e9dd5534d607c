use clap::{CommandFactory, Parser};
use sagectl::artifact::{ArtifactDownloader, ModelExporter};
use sagectl::cloud::AwsClients;
use sagectl::commands::{delete, deploy, predict, prepare};
use sagectl::config::Config;
use sagectl::error::Result;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sagectl")]
#[command(about = "Package, deploy, query and tear down the cheese classifier endpoint", long_about = None)]
struct Cli {
    /// Download the model release, export it and upload it to S3
    #[arg(long)]
    prepare: bool,
    /// Deploy the uploaded model to a SageMaker endpoint
    #[arg(long)]
    deploy: bool,
    /// Classify sample images from the data directory with the endpoint
    #[arg(long)]
    predict: bool,
    /// Delete endpoint, endpoint configs, model and S3 artifacts
    #[arg(long)]
    delete: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if !(cli.prepare || cli.deploy || cli.predict || cli.delete) {
        Cli::command().print_help()?;
        return Ok(());
    }

    let config = Config::load()?;
    let aws = AwsClients::connect(&config).await;

    if cli.prepare {
        println!("Prepare model and save model to S3 bucket");
        let downloader = ArtifactDownloader::new();
        let exporter = ModelExporter::new(config.export.command.clone());
        prepare::run(&config, &aws.store, &downloader, &exporter).await?;
    } else if cli.deploy {
        println!("Deploy model");
        deploy::run(&config, &aws.identity, &aws.host).await?;
    } else if cli.predict {
        println!("Predict using endpoint");
        let report = predict::run(&config, &aws.runtime, &mut rand::thread_rng()).await?;
        tracing::info!(
            endpoint = %report.endpoint_name,
            sampled = report.samples.len(),
            failed = report.failures(),
            "Prediction run finished"
        );
    } else if cli.delete {
        println!("Delete endpoint, model, and S3 artifacts");
        let report = delete::run(&config, &aws.host, &aws.store).await?;
        if !report.warnings.is_empty() {
            tracing::warn!("Teardown finished with {} warnings", report.warnings.len());
        }
    }

    Ok(())
}
