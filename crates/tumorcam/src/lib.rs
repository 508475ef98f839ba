//! # tumorcam
//!
//! Brain MRI tumor classification with Grad-CAM explanations, built on Burn.
//!
//! An uploaded JPEG or PNG scan is preprocessed with the EfficientNet-B0
//! ImageNet recipe, classified into one of four classes (glioma,
//! meningioma, no tumor, pituitary) and, optionally, explained with a
//! Grad-CAM heatmap over the last feature layer.
//!
//! - **Transforms**: decoding, resize / center crop / normalize, overlays
//! - **Models**: EfficientNet-B0 and PyTorch / Burn checkpoint loading
//! - **Explainability**: Grad-CAM attribution and JET heatmap overlays
//! - **Pipeline**: an immutable context holding the loaded model
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tumorcam::prelude::*;
//!
//! let config = PipelineConfig::default().with_checkpoint("models/efficientnet_b0.pth");
//! let pipeline = Pipeline::from_config(config)?;
//!
//! let analysis = pipeline.analyze_file("scan.jpg")?;
//! println!("{} ({})", analysis.prediction.label(), analysis.prediction.confidence_percent());
//!
//! let html = pipeline.report(&analysis)?.to_html();
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU (Metal on macOS, Vulkan on Linux/Windows)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod pipeline;
mod report;

// Re-export all crates
pub use tumorcam_core as core;
pub use tumorcam_explain as explain;
pub use tumorcam_models as models;
pub use tumorcam_transforms as transforms;

pub use config::{PipelineConfig, DEFAULT_CHECKPOINT};
pub use error::{Error, Result};
pub use pipeline::{Analysis, Pipeline};
pub use report::{ExplanationImages, Report};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tumorcam::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Analysis, Pipeline, PipelineConfig, Report};

    // Core types
    pub use tumorcam_core::{
        select_device, ComputeDevice, ExplainBackend, ImageTensor, InferenceBackend, LabelSet,
        Prediction,
    };

    // Transforms
    pub use tumorcam_transforms::{load_image, load_image_bytes, PreprocessConfig, Preprocessor};

    // Models
    pub use tumorcam_models::{
        CheckpointOptions, EfficientNet, EfficientNetConfig, TumorClassifier,
    };

    // Explain
    pub use tumorcam_explain::{GradCam, OverlayConfig, SaliencyMap};
}
