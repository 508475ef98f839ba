//! tumorcam CLI: classify brain MRI scans and render Grad-CAM explanations.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tumorcam::models::{load_model, save_model, CheckpointMetadata, EfficientNetConfig};
use tumorcam::prelude::*;
use tumorcam::transforms::encode_jpeg;

#[derive(Parser)]
#[command(name = "tumorcam")]
#[command(author, version)]
#[command(about = "Brain MRI tumor classification with Grad-CAM explanations")]
#[command(long_about = "tumorcam: classify brain MRI scans as glioma, meningioma, notumor or
pituitary with an EfficientNet-B0, and show which regions drove the prediction.

EXAMPLES:
  # Classify a scan
  tumorcam predict --checkpoint models/efficientnet_b0.pth scan.jpg

  # Write the resized scan and its Grad-CAM overlay
  tumorcam explain --checkpoint models/efficientnet_b0.pth scan.jpg --output out/

  # Render an HTML report with the explanation
  tumorcam report scan.jpg --output report.html --explain

  # Convert a PyTorch checkpoint to a Burn record
  tumorcam convert --checkpoint models/efficientnet_b0.pth --output models/efficientnet_b0.mpk")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Pipeline configuration file (JSON)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an image
    Predict {
        /// Path to checkpoint (overrides the configuration)
        #[arg(long, value_name = "PATH")]
        checkpoint: Option<PathBuf>,

        /// JPEG or PNG scan
        image: PathBuf,
    },
    /// Classify an image and write its Grad-CAM overlay
    Explain {
        /// Path to checkpoint (overrides the configuration)
        #[arg(long, value_name = "PATH")]
        checkpoint: Option<PathBuf>,

        /// JPEG or PNG scan
        image: PathBuf,

        /// Output directory for the resized scan and the overlay
        #[arg(long, default_value = ".", value_name = "DIR")]
        output: PathBuf,
    },
    /// Classify an image and write an HTML report
    Report {
        /// Path to checkpoint (overrides the configuration)
        #[arg(long, value_name = "PATH")]
        checkpoint: Option<PathBuf>,

        /// JPEG or PNG scan
        image: PathBuf,

        /// Output HTML file
        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        /// Include the Grad-CAM explanation
        #[arg(long, default_value = "false")]
        explain: bool,
    },
    /// Re-save a PyTorch checkpoint as a Burn record
    Convert {
        /// PyTorch checkpoint (.pth / .pt)
        #[arg(long, value_name = "PATH")]
        checkpoint: PathBuf,

        /// Output path (.mpk)
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Key holding the state dict inside the checkpoint
        #[arg(long, value_name = "KEY")]
        top_level_key: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration '{}'", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Predict { checkpoint, image } => handle_predict(config, checkpoint, image),
        Commands::Explain {
            checkpoint,
            image,
            output,
        } => handle_explain(config, checkpoint, image, output),
        Commands::Report {
            checkpoint,
            image,
            output,
            explain,
        } => handle_report(config, checkpoint, image, output, explain),
        Commands::Convert {
            checkpoint,
            output,
            top_level_key,
        } => handle_convert(config, checkpoint, output, top_level_key),
    }
}

/// Build the pipeline, failing before any image is read.
fn build_pipeline(
    mut config: PipelineConfig,
    checkpoint: Option<PathBuf>,
    explain: bool,
) -> Result<Pipeline> {
    if let Some(checkpoint) = checkpoint {
        config.checkpoint = checkpoint;
    }
    config.explain = explain;

    let (kind, device) = select_device();
    println!("Using device: {kind}");

    let checkpoint = config.checkpoint.clone();
    Pipeline::new(config, &device)
        .with_context(|| format!("Failed to load model from '{}'", checkpoint.display()))
}

fn analyze(pipeline: &Pipeline, image: &Path) -> Result<Analysis> {
    pipeline
        .analyze_file(image)
        .with_context(|| format!("Failed to analyze '{}'", image.display()))
}

fn print_prediction(pipeline: &Pipeline, prediction: &Prediction) {
    println!("Prediction: {}", prediction.label());
    println!("Confidence: {}", prediction.confidence_percent());
    println!();
    for (label, p) in prediction.ranked(pipeline.labels()) {
        println!("  {:<12} {:>7.2}%", label, p * 100.0);
    }
}

fn handle_predict(config: PipelineConfig, checkpoint: Option<PathBuf>, image: PathBuf) -> Result<()> {
    let pipeline = build_pipeline(config, checkpoint, false)?;
    let analysis = analyze(&pipeline, &image)?;
    print_prediction(&pipeline, &analysis.prediction);
    Ok(())
}

fn handle_explain(
    config: PipelineConfig,
    checkpoint: Option<PathBuf>,
    image: PathBuf,
    output: PathBuf,
) -> Result<()> {
    let pipeline = build_pipeline(config, checkpoint, true)?;
    let analysis = analyze(&pipeline, &image)?;
    print_prediction(&pipeline, &analysis.prediction);

    let Some(saliency) = &analysis.saliency else {
        bail!("No explanation was produced");
    };

    std::fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create '{}'", output.display()))?;
    let stem = image
        .file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
    let quality = pipeline.config().jpeg_quality;

    for (suffix, picture) in [("resized", saliency.resized()), ("gradcam", saliency.overlay())] {
        let path = output.join(format!("{stem}_{suffix}.jpg"));
        let bytes = encode_jpeg(picture, quality)?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        println!("Saved {}", path.display());
    }

    Ok(())
}

fn handle_report(
    config: PipelineConfig,
    checkpoint: Option<PathBuf>,
    image: PathBuf,
    output: PathBuf,
    explain: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config, checkpoint, explain)?;
    let analysis = analyze(&pipeline, &image)?;
    print_prediction(&pipeline, &analysis.prediction);

    let html = pipeline.report(&analysis)?.to_html();
    std::fs::write(&output, html)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;
    println!("\nReport saved to {}", output.display());
    Ok(())
}

fn handle_convert(
    config: PipelineConfig,
    checkpoint: PathBuf,
    output: PathBuf,
    top_level_key: Option<String>,
) -> Result<()> {
    let mut options = config.checkpoint_options();
    if top_level_key.is_some() {
        options.top_level_key = top_level_key;
    }

    let model_config = EfficientNetConfig::b0(config.labels.len());
    let (_, device) = select_device();
    let model = load_model::<InferenceBackend>(&checkpoint, &model_config, &options, &device)
        .with_context(|| format!("Failed to load '{}'", checkpoint.display()))?;

    let written = save_model(&model, &output)
        .with_context(|| format!("Failed to save '{}'", output.display()))?;

    let metadata = CheckpointMetadata::new("efficientnet_b0", model_config)
        .with_labels(config.labels.iter())
        .with_source(&checkpoint);
    let metadata_path = CheckpointMetadata::sidecar_path(&written);
    metadata.save(&metadata_path)?;

    println!("Converted {} -> {}", checkpoint.display(), written.display());
    println!("Metadata saved to {}", metadata_path.display());
    Ok(())
}
