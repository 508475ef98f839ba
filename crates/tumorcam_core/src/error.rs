//! Error types for tumorcam_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in tumorcam_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid tensor shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Dimension error.
    #[error("Dimension error: expected {expected} dimensions, got {got}")]
    DimensionError {
        /// Expected number of dimensions.
        expected: usize,
        /// Actual number of dimensions.
        got: usize,
    },

    /// A label set must contain at least one class.
    #[error("Label set is empty")]
    EmptyLabelSet,

    /// A class name is empty or whitespace.
    #[error("Label at position {0} is blank")]
    EmptyLabel(usize),

    /// A class name appears more than once in a label set.
    #[error("Duplicate label: '{0}'")]
    DuplicateLabel(String),

    /// A class name that is not part of the label set.
    #[error("Unknown label: '{0}'")]
    UnknownLabel(String),

    /// A probability vector violates the softmax postcondition.
    #[error("Invalid probabilities: {0}")]
    InvalidProbabilities(String),

    /// Tensor data could not be read back from the device.
    #[error("Tensor data error: {0}")]
    TensorData(String),
}
