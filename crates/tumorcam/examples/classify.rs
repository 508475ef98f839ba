//! Example: Classify an MRI slice and explain the prediction
//!
//! Runs the full pipeline on one image: preprocessing, EfficientNet-B0
//! prediction and a Grad-CAM overlay of the predicted class.
//!
//! Without a checkpoint the model is randomly initialized, so the predicted
//! label is meaningless, but every step still runs. Without an image a
//! synthetic grayscale slice is generated.
//!
//! Run with: cargo run --example classify -- [image.jpg] [efficientnet_b0.pth]

use image::{Rgb, RgbImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tumorcam::prelude::*;
use tumorcam::transforms::encode_jpeg;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Tumor Classification with Grad-CAM ===\n");

    let mut args = std::env::args().skip(1);
    let image_path = args.next();
    let checkpoint = args.next();

    // Step 1: Build the pipeline
    let config = PipelineConfig::default().with_explain(true);
    let (kind, device) = select_device();
    println!("Using device: {kind}");

    let pipeline: Pipeline = match checkpoint {
        Some(path) => {
            println!("Loading checkpoint: {path}");
            Pipeline::new(config.with_checkpoint(path), &device)?
        }
        None => {
            println!("No checkpoint given, using random weights");
            let model = EfficientNetConfig::b0(config.labels.len()).init(&device);
            let classifier = TumorClassifier::new(model, config.labels.clone(), device)?;
            Pipeline::with_classifier(config, classifier)?
        }
    };
    println!("Labels: {:?}\n", pipeline.labels().iter().collect::<Vec<_>>());

    // Step 2: Load or synthesize the image
    let image = match image_path {
        Some(path) => load_image(&path)?,
        None => synthetic_slice(256, 42),
    };
    println!("Image: {}x{}", image.width(), image.height());

    // Step 3: Analyze
    let analysis = pipeline.analyze(image)?;
    println!(
        "\nPrediction: {} ({})",
        analysis.prediction.label(),
        analysis.prediction.confidence_percent()
    );
    for (label, p) in analysis.prediction.ranked(pipeline.labels()) {
        println!("  {label:<12} {:>6.2}%", p * 100.0);
    }

    // Step 4: Save the overlay
    if let Some(saliency) = &analysis.saliency {
        let path = std::env::temp_dir().join("tumorcam_gradcam.jpg");
        std::fs::write(&path, encode_jpeg(saliency.overlay(), 90)?)?;
        println!("\nGrad-CAM overlay saved to {}", path.display());
    }

    println!("\n=== Example complete ===");
    Ok(())
}

/// A bright noisy disc on a dark background, roughly like an axial slice.
fn synthetic_slice(size: u32, seed: u64) -> RgbImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let center = size as f32 / 2.0;
    let radius = size as f32 * 0.4;

    RgbImage::from_fn(size, size, |x, y| {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        let inside = (dx * dx + dy * dy).sqrt() < radius;
        let base: u8 = if inside { 140 } else { 10 };
        let v = base.saturating_add(rng.gen_range(0..40));
        Rgb([v, v, v])
    })
}
