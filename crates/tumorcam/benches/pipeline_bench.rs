//! Benchmarks for preprocessing, prediction and explanation.
//!
//! Run with: cargo bench --bench pipeline_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use image::{Rgb, RgbImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use tumorcam::core::LabelSet;
use tumorcam::explain::{GradCam, OverlayConfig};
use tumorcam::models::{EfficientNetConfig, TumorClassifier};
use tumorcam::transforms::{PreprocessConfig, Preprocessor};

type BenchBackend = Autodiff<NdArray>;

/// Create a synthetic grayscale-looking scan.
fn create_synthetic_scan(width: u32, height: u32) -> RgbImage {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    RgbImage::from_fn(width, height, |_, _| {
        let v: u8 = rng.gen();
        Rgb([v, v, v])
    })
}

fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess");
    let preprocessor = Preprocessor::default();
    let device = Default::default();

    for (width, height) in [(256, 256), (512, 512), (1024, 768)] {
        let image = create_synthetic_scan(width, height);
        group.bench_with_input(
            BenchmarkId::new("resize_crop_normalize", format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| {
                    let tensor = preprocessor.apply::<NdArray>(black_box(image), &device);
                    black_box(tensor)
                });
            },
        );
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    group.sample_size(10);

    let device = Default::default();
    let model = EfficientNetConfig::b0(4).init::<BenchBackend>(&device);
    let classifier = TumorClassifier::new(model, LabelSet::default(), device).unwrap();

    for crop in [64u32, 224] {
        let preprocessor = Preprocessor::new(PreprocessConfig::new(crop * 8 / 7, crop)).unwrap();
        let input = preprocessor
            .apply::<NdArray>(&create_synthetic_scan(300, 300), &Default::default())
            .unwrap();

        group.bench_with_input(BenchmarkId::new("efficientnet_b0", crop), &input, |b, input| {
            b.iter(|| black_box(classifier.predict(black_box(input))));
        });
    }

    group.finish();
}

fn bench_explain(c: &mut Criterion) {
    let mut group = c.benchmark_group("explain");
    group.sample_size(10);

    let device = Default::default();
    let model = EfficientNetConfig::b0(4).init::<BenchBackend>(&device);
    let classifier = TumorClassifier::new(model, LabelSet::default(), device).unwrap();
    let cam = GradCam::new(&classifier, OverlayConfig::default()).unwrap();

    let image = create_synthetic_scan(300, 300);
    let input = Preprocessor::default()
        .apply::<NdArray>(&image, &Default::default())
        .unwrap();

    group.bench_function("grad_cam_224", |b| {
        b.iter(|| black_box(cam.explain(&image, &input, "glioma")));
    });

    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_predict, bench_explain);
criterion_main!(benches);
