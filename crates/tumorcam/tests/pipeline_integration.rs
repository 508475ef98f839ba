//! Integration tests for the classification pipeline.
//!
//! These tests run the full decode, preprocess, predict and explain chain
//! against synthetic checkpoints and images.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use burn::module::Param;
use burn::nn::Linear;
use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use tumorcam::models::{save_model, CheckpointError, EfficientNetConfig};
use tumorcam::transforms::{PreprocessConfig, TransformError};
use tumorcam::{Error, Pipeline, PipelineConfig};

type TestBackend = Autodiff<NdArray>;

/// Save an EfficientNet-B0 whose head strongly favours class 0 (glioma).
fn glioma_biased_checkpoint(dir: &Path) -> PathBuf {
    let device = Default::default();
    let model = EfficientNetConfig::b0(4).init::<TestBackend>(&device);

    let weight = Tensor::<TestBackend, 2>::zeros([1280, 4], &device);
    let bias = Tensor::<TestBackend, 1>::from_floats([8.0, 0.0, 0.0, 0.0], &device);
    let model = model.with_classifier(Linear {
        weight: Param::from_tensor(weight),
        bias: Some(Param::from_tensor(bias)),
    });

    save_model(&model, dir.join("glioma_biased.mpk")).expect("Failed to save checkpoint")
}

/// Small preprocessing so the CPU forward pass stays fast.
fn test_config(checkpoint: PathBuf) -> PipelineConfig {
    PipelineConfig {
        preprocess: PreprocessConfig::new(72, 64),
        ..PipelineConfig::default().with_checkpoint(checkpoint)
    }
}

/// Random RGB noise encoded as PNG.
fn synthetic_scan(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let image = RgbImage::from_fn(width, height, |x, y| {
        // Bright blob in the upper left over a noisy background.
        let blob = if x < width / 3 && y < height / 3 { 120 } else { 0 };
        let noise: u8 = rng.gen_range(0..100);
        Rgb([noise + blob, noise + blob, noise + blob])
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes
}

fn pipeline(dir: &Path) -> Pipeline<TestBackend> {
    let config = test_config(glioma_biased_checkpoint(dir));
    Pipeline::new(config, &Default::default()).expect("Failed to build pipeline")
}

#[test]
fn test_biased_checkpoint_predicts_glioma() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let analysis = pipeline
        .analyze_bytes(&synthetic_scan(160, 120, 42))
        .expect("Analysis failed");
    let prediction = &analysis.prediction;

    assert_eq!(prediction.label(), "glioma");
    assert!(prediction.confidence() > 0.5);
    assert!(prediction.confidence_percent().ends_with('%'));

    let probs = prediction.probabilities();
    assert_eq!(probs.len(), 4);
    assert!(probs.iter().all(|p| *p >= 0.0));
    let sum: f32 = probs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);

    let argmax = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(pipeline.labels().get(argmax), Some(prediction.label()));
}

#[test]
fn test_predictions_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());
    let bytes = synthetic_scan(90, 130, 7);

    let first = pipeline.analyze_bytes(&bytes).unwrap();
    let second = pipeline.analyze_bytes(&bytes).unwrap();

    assert_eq!(first.prediction, second.prediction);
    let first_map = first.saliency.unwrap();
    let second_map = second.saliency.unwrap();
    assert_eq!(first_map.overlay(), second_map.overlay());
}

#[test]
fn test_overlay_matches_display_image() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let analysis = pipeline.analyze_bytes(&synthetic_scan(300, 200, 3)).unwrap();
    let saliency = analysis.saliency.expect("Explanation enabled by default");

    assert_eq!(saliency.label(), "glioma");
    assert_eq!(saliency.resized().dimensions(), (224, 224));
    assert_eq!(saliency.overlay().dimensions(), (224, 224));
    assert_eq!(saliency.mask().len(), 224 * 224);
}

#[test]
fn test_explain_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(glioma_biased_checkpoint(dir.path())).with_explain(false);
    let pipeline = Pipeline::<TestBackend>::new(config, &Default::default()).unwrap();

    let analysis = pipeline.analyze_bytes(&synthetic_scan(64, 64, 1)).unwrap();
    assert!(analysis.saliency.is_none());

    let html = pipeline.report(&analysis).unwrap().to_html();
    assert!(!html.contains("Grad-CAM"));
}

#[test]
fn test_html_report() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let analysis = pipeline.analyze_bytes(&synthetic_scan(128, 128, 11)).unwrap();
    let report = pipeline.report(&analysis).unwrap();

    assert_eq!(report.label(), "glioma");
    assert!(report.explanation().is_some());

    let html = report.to_html();
    assert!(html.contains("<strong>glioma</strong>"));
    assert!(html.contains(&format!("Confidence: {}", report.confidence())));
    assert_eq!(html.matches("data:image/jpeg;base64,").count(), 3);
}

#[test]
fn test_corrupted_file_fails_before_model() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let mut bytes = synthetic_scan(64, 64, 5);
    bytes.truncate(bytes.len() / 3);
    let err = pipeline.analyze_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::Transform(TransformError::Decode(_))));
    assert!(err.is_input_error());

    let err = pipeline.analyze_bytes(b"%PDF-1.7 not an image").unwrap_err();
    assert!(matches!(
        err,
        Error::Transform(TransformError::UnsupportedFormat(_))
    ));

    let err = pipeline.analyze_bytes(&[]).unwrap_err();
    assert!(matches!(err, Error::Transform(TransformError::EmptyInput)));
}

#[test]
fn test_missing_checkpoint_fails_startup() {
    let config = PipelineConfig::default().with_checkpoint("/nonexistent/efficientnet_b0.pth");
    let result = Pipeline::<TestBackend>::new(config, &Default::default());

    assert!(matches!(
        result,
        Err(Error::Checkpoint(CheckpointError::NotFound(_)))
    ));
}

#[test]
fn test_incompatible_checkpoint_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let device = Default::default();
    let model = EfficientNetConfig::b0(2).init::<TestBackend>(&device);
    let path = save_model(&model, dir.path().join("binary.mpk")).unwrap();

    let result = Pipeline::<TestBackend>::new(test_config(path), &device);
    assert!(matches!(
        result,
        Err(Error::Checkpoint(
            CheckpointError::IncompatibleArchitecture { .. }
        ))
    ));
}

/// Runs the torchvision checkpoint trained on brain MRI scans against a
/// known glioma sample. Both files are too large to ship with the crate.
///
/// `TUMORCAM_CHECKPOINT=models/efficientnet_b0.pth TUMORCAM_GLIOMA_SAMPLE=glioma.jpg
///  cargo test -p tumorcam -- --ignored`
#[test]
#[ignore]
fn test_real_checkpoint_glioma_sample() {
    let checkpoint = std::env::var("TUMORCAM_CHECKPOINT")
        .unwrap_or_else(|_| tumorcam::DEFAULT_CHECKPOINT.to_string());
    let sample = std::env::var("TUMORCAM_GLIOMA_SAMPLE").expect("TUMORCAM_GLIOMA_SAMPLE not set");

    let config = PipelineConfig::default().with_checkpoint(checkpoint);
    let pipeline = Pipeline::<TestBackend>::new(config, &Default::default()).unwrap();
    let analysis = pipeline.analyze_file(sample).unwrap();

    assert_eq!(analysis.prediction.label(), "glioma");
    assert!(analysis.prediction.confidence() > 0.5);
}
