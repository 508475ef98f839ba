//! Image tensor shape metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Number of color channels of a network input.
pub(crate) const RGB_CHANNELS: usize = 3;

/// Shape metadata for image tensors.
///
/// Follows the convention `(B, C, H, W)`:
/// - `B`: Batch size
/// - `C`: Color channels
/// - `H`: Height in pixels
/// - `W`: Width in pixels
///
/// # Example
///
/// ```rust
/// use tumorcam_core::ImageShape;
///
/// let shape = ImageShape::new(1, 3, 224, 224);
/// assert_eq!(shape.batch(), 1);
/// assert_eq!(shape.channels(), 3);
/// assert_eq!(shape.height(), 224);
/// assert_eq!(shape.width(), 224);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    batch: usize,
    channels: usize,
    height: usize,
    width: usize,
}

impl ImageShape {
    /// Create a new ImageShape with the specified dimensions.
    #[must_use]
    pub const fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// Shape of a single RGB image of the given size.
    #[must_use]
    pub const fn single_rgb(height: usize, width: usize) -> Self {
        Self::new(1, RGB_CHANNELS, height, width)
    }

    /// Create an ImageShape from a slice of dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 4 elements.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tumorcam_core::ImageShape;
    ///
    /// let shape = ImageShape::from_dims(&[1, 3, 224, 224]).unwrap();
    /// assert_eq!(shape.width(), 224);
    /// ```
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 4 {
            return Err(CoreError::DimensionError {
                expected: 4,
                got: dims.len(),
            });
        }
        Ok(Self::new(dims[0], dims[1], dims[2], dims[3]))
    }

    /// Get the batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Get the height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Get the width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Convert to an array of dimensions `[B, C, H, W]`.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }

    /// Check that this is a single RGB image, the only input the classifier accepts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidShape`] if batch is not 1 or channels is not 3.
    pub fn ensure_single_rgb(&self) -> Result<()> {
        if self.batch != 1 || self.channels != RGB_CHANNELS {
            return Err(CoreError::InvalidShape {
                expected: "[1, 3, H, W]".to_string(),
                got: self.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.batch, self.channels, self.height, self.width
        )
    }
}

impl From<[usize; 4]> for ImageShape {
    fn from(dims: [usize; 4]) -> Self {
        Self::new(dims[0], dims[1], dims[2], dims[3])
    }
}
