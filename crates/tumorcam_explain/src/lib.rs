//! # tumorcam_explain
//!
//! Explainability tools for tumorcam: Grad-CAM attribution and saliency overlays.
//!
//! This crate provides:
//! - Activation and gradient capture at a named layer
//! - Grad-CAM attribution maps with normalization and resizing
//! - [`GradCam`], rendering a JET heatmap over the displayed image

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod attribution;
mod error;
mod saliency;

pub use activation::LayerCapture;
pub use attribution::{grad_cam, AttributionMap, NORMALIZE_EPS};
pub use error::{ExplainError, Result};
pub use saliency::{GradCam, OverlayConfig, SaliencyMap, TARGET_LAYER};
