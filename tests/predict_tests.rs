mod common;

use common::{test_config, write_images, FakeRuntime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sagectl::commands::predict::{self, SampleResult};
use sagectl::payload::{PayloadEncoding, PredictionOutcome, CONTENT_TYPE_JSON};
use sagectl::state::EndpointState;
use serde_json::Value;
use tempfile::TempDir;

const GRUYERE: &str = r#"{"predictions": [[0.1, 0.7, 0.1, 0.1]]}"#;

fn save_state(config: &sagectl::config::Config, name: &str) {
    EndpointState::new(name, "us-east-1")
        .save(&config.paths.state_file)
        .unwrap();
}

#[tokio::test]
async fn test_predict_without_images_never_invokes() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    save_state(&config, "cheese-endpoint-20240101000000");
    let runtime = FakeRuntime::responding(GRUYERE);

    let report = predict::run(&config, &runtime, &mut StdRng::seed_from_u64(3))
        .await
        .unwrap();

    assert_eq!(report.candidates, 0);
    assert!(report.samples.is_empty());
    assert_eq!(runtime.invocation_count(), 0);
}

#[tokio::test]
async fn test_predict_labels_every_sample() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    save_state(&config, "cheese-endpoint-20240101000000");
    write_images(&config, 8);
    let runtime = FakeRuntime::responding(GRUYERE);

    let report = predict::run(&config, &runtime, &mut StdRng::seed_from_u64(42))
        .await
        .unwrap();

    assert_eq!(report.endpoint_name, "cheese-endpoint-20240101000000");
    assert_eq!(report.candidates, 8);
    assert_eq!(report.samples.len(), 5);
    assert_eq!(report.labels(), vec!["gruyere"; 5]);
    assert_eq!(report.failures(), 0);

    let invocations = runtime.invocations.lock().unwrap();
    assert_eq!(invocations.len(), 5);
    for (endpoint, content_type, body) in invocations.iter() {
        assert_eq!(endpoint, "cheese-endpoint-20240101000000");
        assert_eq!(content_type, CONTENT_TYPE_JSON);

        let payload: Value = serde_json::from_slice(body).unwrap();
        let instance = &payload["instances"][0];
        assert_eq!(instance.as_array().unwrap().len(), 224);
        assert_eq!(instance[0].as_array().unwrap().len(), 224);
        assert_eq!(instance[0][0].as_array().unwrap().len(), 3);
    }
}

#[tokio::test]
async fn test_predict_samples_at_most_available_images() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    save_state(&config, "cheese-endpoint-20240101000000");
    write_images(&config, 2);
    let runtime = FakeRuntime::responding(GRUYERE);

    let report = predict::run(&config, &runtime, &mut StdRng::seed_from_u64(9))
        .await
        .unwrap();

    assert_eq!(report.samples.len(), 2);
    assert_eq!(runtime.invocation_count(), 2);
}

#[tokio::test]
async fn test_predict_falls_back_without_state() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_images(&config, 1);
    let runtime = FakeRuntime::responding(GRUYERE);

    let report = predict::run(&config, &runtime, &mut StdRng::seed_from_u64(1))
        .await
        .unwrap();

    assert_eq!(report.endpoint_name, config.default_endpoint_name());
    assert_eq!(
        runtime.invocations.lock().unwrap()[0].0,
        config.default_endpoint_name()
    );
}

#[tokio::test]
async fn test_predict_continues_after_invocation_failure() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    save_state(&config, "gone-endpoint");
    write_images(&config, 6);
    let runtime = FakeRuntime::failing("Could not find endpoint gone-endpoint");

    let report = predict::run(&config, &runtime, &mut StdRng::seed_from_u64(5))
        .await
        .unwrap();

    assert_eq!(runtime.invocation_count(), 5);
    assert_eq!(report.failures(), 5);
    assert!(report.labels().is_empty());
}

#[tokio::test]
async fn test_predict_reports_unexpected_response() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    save_state(&config, "cheese-endpoint-20240101000000");
    write_images(&config, 1);
    let runtime = FakeRuntime::responding(r#"{"error": "model not loaded"}"#);

    let report = predict::run(&config, &runtime, &mut StdRng::seed_from_u64(2))
        .await
        .unwrap();

    assert_eq!(report.samples.len(), 1);
    assert!(matches!(
        &report.samples[0].result,
        SampleResult::Prediction(PredictionOutcome::Unexpected(raw)) if raw.contains("model not loaded")
    ));
}

#[tokio::test]
async fn test_predict_skips_undecodable_images() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    save_state(&config, "cheese-endpoint-20240101000000");
    std::fs::create_dir_all(&config.paths.data_dir).unwrap();
    std::fs::write(config.paths.data_dir.join("broken.jpg"), b"not a jpeg").unwrap();
    let runtime = FakeRuntime::responding(GRUYERE);

    let report = predict::run(&config, &runtime, &mut StdRng::seed_from_u64(4))
        .await
        .unwrap();

    assert_eq!(report.failures(), 1);
    assert_eq!(runtime.invocation_count(), 0);
}

#[tokio::test]
async fn test_predict_base64_encoding() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.predict.encoding = PayloadEncoding::Base64;
    save_state(&config, "cheese-endpoint-20240101000000");
    write_images(&config, 1);
    let runtime = FakeRuntime::responding(GRUYERE);

    let report = predict::run(&config, &runtime, &mut StdRng::seed_from_u64(6))
        .await
        .unwrap();

    assert_eq!(report.labels(), vec!["gruyere"]);

    let invocations = runtime.invocations.lock().unwrap();
    let payload: Value = serde_json::from_slice(&invocations[0].2).unwrap();
    let b64 = payload["instances"][0]["b64"].as_str().unwrap();
    assert!(b64.starts_with("/9j/"), "expected base64 JPEG, got {b64:.16}");
}
