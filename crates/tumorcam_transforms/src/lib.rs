//! # tumorcam_transforms
//!
//! Image loading, classification preprocessing, and heatmap rendering.
//!
//! This crate provides:
//! - Decoding of uploaded JPEG/PNG bytes into RGB bitmaps
//! - The resize / center-crop / normalize recipe of the EfficientNet-B0
//!   ImageNet weights, as a composable [`Transform`] pipeline
//! - Imaging helpers: display resize, JET colormap, heatmap overlay,
//!   JPEG and base64 encoding
//!
//! ## Example
//!
//! ```rust,ignore
//! use tumorcam_transforms::{load_image_bytes, Preprocessor, PreprocessConfig};
//!
//! let image = load_image_bytes(&bytes)?;
//! let preprocessor = Preprocessor::new(PreprocessConfig::default())?;
//! let tensor = preprocessor.apply::<NdArray>(&image, &device)?;
//! assert_eq!(tensor.shape().as_array(), [1, 3, 224, 224]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod imaging;
pub mod loader;
pub mod preprocess;
mod transform;

pub use error::{Result, TransformError};
pub use imaging::{
    data_uri, encode_jpeg, jet_colormap, overlay_heatmap, resize_for_display, to_base64_jpeg,
};
pub use loader::{load_image, load_image_bytes};
pub use preprocess::{CenterCrop, FilterKind, PreprocessConfig, Preprocessor, Resize};
pub use transform::{Compose, Transform};
