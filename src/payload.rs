//! Request encoding and response decoding for the inference endpoint
//!
//! The same model can be served behind two signatures: one takes the
//! normalised pixel tensor directly, the other takes the encoded image bytes
//! and decodes them server-side. [`PayloadEncoding`] picks between them.

use crate::error::{Result, SagectlError};
use crate::labels::LabelMap;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::str::FromStr;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Transport encoding for a single image instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    /// H x W x C float array scaled to `[0, 1]`
    #[default]
    Tensor,
    /// Base64 JPEG bytes under a `b64` key
    Base64,
}

impl FromStr for PayloadEncoding {
    type Err = SagectlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tensor" => Ok(Self::Tensor),
            "base64" | "b64" => Ok(Self::Base64),
            other => Err(SagectlError::Config(format!(
                "Unknown payload encoding: {other}. Must be 'tensor' or 'base64'"
            ))),
        }
    }
}

/// Result of interpreting one endpoint response
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Label {
        index: usize,
        label: String,
        scores: Vec<f64>,
    },
    /// Response did not carry a usable prediction; holds the raw body
    Unexpected(String),
}

/// Decode an image, convert it to RGB, then resize it (bicubic) to the model
/// input shape
pub fn preprocess(path: &Path, width: u32, height: u32) -> Result<RgbImage> {
    let img = image::open(path)
        .map_err(|e| SagectlError::Image(format!("Failed to decode {}: {e}", path.display())))?;

    Ok(imageops::resize(
        &img.to_rgb8(),
        width,
        height,
        FilterType::CatmullRom,
    ))
}

/// Build the JSON request body for one image
pub fn encode(img: &RgbImage, encoding: PayloadEncoding) -> Result<Vec<u8>> {
    let instance = match encoding {
        PayloadEncoding::Tensor => tensor_instance(img),
        PayloadEncoding::Base64 => {
            let mut jpeg = Vec::new();
            JpegEncoder::new(&mut jpeg)
                .encode_image(img)
                .map_err(|e| SagectlError::Image(format!("Failed to encode JPEG: {e}")))?;
            json!({ "b64": base64::engine::general_purpose::STANDARD.encode(&jpeg) })
        }
    };

    serde_json::to_vec(&json!({ "instances": [instance] }))
        .map_err(|e| SagectlError::Other(format!("Failed to serialize payload: {e}")))
}

fn tensor_instance(img: &RgbImage) -> Value {
    let rows: Vec<Value> = img
        .rows()
        .map(|row| {
            row.map(|pixel| {
                pixel
                    .0
                    .iter()
                    .map(|&channel| f32::from(channel) / 255.0)
                    .collect::<Vec<f32>>()
            })
            .collect::<Vec<_>>()
            .into()
        })
        .collect();

    Value::Array(rows)
}

/// Interpret a response body; anything other than a resolvable
/// `predictions` vector is reported as [`PredictionOutcome::Unexpected`].
#[must_use]
pub fn parse_response(body: &[u8], labels: &LabelMap) -> PredictionOutcome {
    let raw = || String::from_utf8_lossy(body).into_owned();

    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return PredictionOutcome::Unexpected(raw());
    };

    let Some(first) = value
        .get("predictions")
        .and_then(Value::as_array)
        .and_then(|predictions| predictions.first())
        .and_then(Value::as_array)
    else {
        return PredictionOutcome::Unexpected(raw());
    };

    let scores: Vec<f64> = first.iter().filter_map(Value::as_f64).collect();
    if scores.len() != first.len() {
        return PredictionOutcome::Unexpected(raw());
    }

    match labels.resolve(&scores) {
        Some((index, label)) => PredictionOutcome::Label {
            index,
            label: label.to_string(),
            scores,
        },
        None => PredictionOutcome::Unexpected(raw()),
    }
}
