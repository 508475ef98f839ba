//! # tumorcam_models
//!
//! Image classifier for tumorcam.
//!
//! - [`EfficientNet`] - EfficientNet-B0 with torchvision's layer layout
//! - [`checkpoint`] - PyTorch and Burn checkpoint loading
//! - [`TumorClassifier`] - model plus class names, producing a [`Prediction`]
//!
//! [`Prediction`]: tumorcam_core::Prediction

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
mod classifier;
pub mod cnn;

pub use checkpoint::{
    check_compatibility, load_model, load_record, save_model, torchvision_key_remaps,
    CheckpointError, CheckpointFormat, CheckpointMetadata, CheckpointOptions,
};
pub use classifier::{ClassifierError, TumorClassifier};
pub use cnn::*;
