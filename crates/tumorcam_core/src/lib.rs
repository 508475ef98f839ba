//! # tumorcam_core
//!
//! Core types shared by the tumorcam crates.
//!
//! This crate provides:
//! - [`ImageShape`] for image tensor shape metadata
//! - [`ImageTensor`] wrapper for Burn tensors with shape validation
//! - [`LabelSet`] for the ordered class names of a classifier head
//! - [`Prediction`] holding a label and its probability distribution
//! - Backend aliases and compute device selection
//!
//! ## Shape Convention
//!
//! Image tensors follow the convention `(B, C, H, W)`:
//! - `B`: Batch size (always 1 for a single uploaded image)
//! - `C`: Color channels (3, RGB)
//! - `H`: Height in pixels
//! - `W`: Width in pixels
//!
//! ## Example
//!
//! ```rust
//! use tumorcam_core::{ImageShape, LabelSet};
//!
//! let shape = ImageShape::new(1, 3, 224, 224);
//! assert_eq!(shape.numel(), 3 * 224 * 224);
//!
//! let labels = LabelSet::default();
//! assert_eq!(labels.index_of("glioma").unwrap(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod device;
mod error;
mod labels;
mod prediction;
mod shape;
mod tensor;

pub use device::{default_device, select_device, ComputeDevice, ExplainBackend, InferenceBackend};
pub use error::{CoreError, Result};
pub use labels::{LabelSet, DEFAULT_LABELS};
pub use prediction::{Prediction, PROBABILITY_TOLERANCE};
pub use shape::ImageShape;
pub use tensor::ImageTensor;

/// Backend type aliases for convenience
pub mod backend {
    pub use burn_autodiff::Autodiff;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::Wgpu;
}
