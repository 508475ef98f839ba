//! Error type of the tumorcam facade.

use std::path::PathBuf;

use thiserror::Error;
use tumorcam_core::CoreError;
use tumorcam_explain::ExplainError;
use tumorcam_models::{CheckpointError, ClassifierError};
use tumorcam_transforms::TransformError;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure of the classification pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid pipeline configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read or parsed.
    #[error("Failed to read configuration from {path}: {reason}")]
    ConfigFile {
        /// Configuration file.
        path: PathBuf,
        /// Read or parse failure.
        reason: String,
    },

    /// Core type error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Image decoding, preprocessing or rendering error.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Checkpoint loading error.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Inference error.
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    /// Saliency map error.
    #[error(transparent)]
    Explain(#[from] ExplainError),
}

impl Error {
    /// Whether the error concerns the uploaded image rather than the setup.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::Transform(
                TransformError::EmptyInput
                    | TransformError::UnsupportedFormat(_)
                    | TransformError::Decode(_)
                    | TransformError::Read { .. }
            )
        )
    }
}
