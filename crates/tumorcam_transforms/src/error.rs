//! Error types for tumorcam_transforms.

use std::path::PathBuf;

use thiserror::Error;
use tumorcam_core::CoreError;

/// Result type alias using [`TransformError`].
pub type Result<T> = std::result::Result<T, TransformError>;

/// Errors raised while decoding, transforming or encoding images.
#[derive(Error, Debug)]
pub enum TransformError {
    /// The uploaded file was empty.
    #[error("Empty image input")]
    EmptyInput,

    /// The content is not a JPEG or PNG image.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The content looked like an image but could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// Failed to read an image file.
    #[error("Failed to read image from {path}: {source}")]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to encode an image.
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// Invalid transform parameter.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Tensor construction failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl TransformError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
