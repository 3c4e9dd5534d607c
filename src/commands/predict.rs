use crate::cloud::InferenceRuntime;
use crate::config::Config;
use crate::error::Result;
use crate::labels::LabelMap;
use crate::payload::{self, PredictionOutcome, CONTENT_TYPE_JSON};
use crate::state::EndpointState;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Image extensions picked up from the data directory, in listing order
const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

#[derive(Debug, Clone, PartialEq)]
pub enum SampleResult {
    Prediction(PredictionOutcome),
    /// Preprocessing or invocation failed for this image
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplePrediction {
    pub image: PathBuf,
    pub result: SampleResult,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictReport {
    pub endpoint_name: String,
    pub candidates: usize,
    pub samples: Vec<SamplePrediction>,
}

impl PredictReport {
    /// Labels of every sample that resolved to a class
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.samples
            .iter()
            .filter_map(|s| match &s.result {
                SampleResult::Prediction(PredictionOutcome::Label { label, .. }) => {
                    Some(label.as_str())
                }
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| matches!(s.result, SampleResult::Failed(_)))
            .count()
    }
}

/// `*.jpg` files then `*.jpeg` files in `dir`, each group sorted
///
/// A missing directory yields an empty list.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();

    let mut images = Vec::new();
    for ext in IMAGE_EXTENSIONS {
        let mut group: Vec<PathBuf> = files
            .iter()
            .filter(|p| {
                p.extension()
                    .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
            })
            .cloned()
            .collect();
        group.sort();
        images.extend(group);
    }

    Ok(images)
}

/// `min(count, len)` independent indices in `0..len`; repeats are possible
pub fn sample_indices<R: Rng>(len: usize, count: usize, rng: &mut R) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    (0..count.min(len)).map(|_| rng.gen_range(0..len)).collect()
}

/// Endpoint from the state file, else the fixed fallback name
fn endpoint_name(config: &Config) -> String {
    match EndpointState::load(&config.paths.state_file) {
        Ok(Some(state)) => state.endpoint_name,
        Ok(None) => {
            println!(
                "Error: {} not found. Please deploy the model first.",
                config.paths.state_file.display()
            );
            let fallback = config.default_endpoint_name();
            tracing::warn!("No endpoint state, falling back to {fallback}");
            fallback
        }
        Err(e) => {
            let fallback = config.default_endpoint_name();
            tracing::warn!("Ignoring unreadable endpoint state ({e}), falling back to {fallback}");
            fallback
        }
    }
}

/// Classify a random sample of local images with the deployed endpoint
///
/// # Errors
/// - Returns error only if the data directory exists but cannot be read;
///   per-image failures are recorded in the report
pub async fn run<R: Rng>(
    config: &Config,
    runtime: &dyn InferenceRuntime,
    rng: &mut R,
) -> Result<PredictReport> {
    let endpoint_name = endpoint_name(config);
    let labels = config.label_map();

    let images = list_images(&config.paths.data_dir)?;
    println!(
        "image_files: {:?}",
        images.iter().take(5).collect::<Vec<_>>()
    );

    let mut report = PredictReport {
        endpoint_name,
        candidates: images.len(),
        samples: Vec::new(),
    };

    if images.is_empty() {
        println!(
            "No image files found in {} directory",
            config.paths.data_dir.display()
        );
        return Ok(report);
    }

    for index in sample_indices(images.len(), config.predict.samples, rng) {
        let image = images[index].clone();
        println!("Image: {}", image.display());

        let result = classify(config, runtime, &labels, &report.endpoint_name, &image).await;
        report.samples.push(SamplePrediction { image, result });
    }

    Ok(report)
}

async fn classify(
    config: &Config,
    runtime: &dyn InferenceRuntime,
    labels: &LabelMap,
    endpoint_name: &str,
    image: &Path,
) -> SampleResult {
    let body = match payload::preprocess(image, config.data.image_width, config.data.image_height)
        .and_then(|img| payload::encode(&img, config.predict.encoding))
    {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Skipping {}: {e}", image.display());
            return SampleResult::Failed(e.to_string());
        }
    };

    let response = match runtime.invoke(endpoint_name, CONTENT_TYPE_JSON, body).await {
        Ok(response) => response,
        Err(e) => {
            println!("Error invoking endpoint: {e}");
            println!("Make sure the endpoint '{endpoint_name}' exists and is in service");
            return SampleResult::Failed(e.to_string());
        }
    };

    let outcome = payload::parse_response(&response, labels);
    match &outcome {
        PredictionOutcome::Label {
            index,
            label,
            scores,
        } => {
            println!("{scores:?} {index}");
            println!("Label:    {label}\n");
        }
        PredictionOutcome::Unexpected(raw) => {
            tracing::warn!("Unexpected response format from {endpoint_name}");
            println!("Unexpected response format: {raw}");
        }
    }

    SampleResult::Prediction(outcome)
}
