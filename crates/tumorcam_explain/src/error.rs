//! Error types for tumorcam_explain.

use thiserror::Error;
use tumorcam_core::CoreError;
use tumorcam_transforms::TransformError;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised while computing or rendering a saliency map.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// The target label is not a class of the model.
    #[error("Unknown target label: {0}")]
    UnknownLabel(String),

    /// Back-propagation produced no gradient for the target layer.
    #[error("No gradient reached the target layer")]
    MissingGradient,

    /// Invalid overlay configuration.
    #[error("Invalid overlay configuration: {0}")]
    InvalidConfig(String),

    /// Tensor values could not be read back.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Input tensor error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Image rendering error.
    #[error(transparent)]
    Transform(#[from] TransformError),
}
