//! Transform trait for image pipelines.

use image::RgbImage;

use crate::error::Result;

/// A transform applied to a decoded RGB image.
///
/// Transforms are chained with [`Compose`] to express a preprocessing
/// recipe step by step.
///
/// # Implementation Notes
///
/// - Transforms must be deterministic
/// - Transforms should return `Result` instead of panicking
/// - Transforms should document their effect on image dimensions
///
/// # Example
///
/// ```rust,ignore
/// use tumorcam_transforms::{Transform, Result};
/// use image::RgbImage;
///
/// struct FlipHorizontal;
///
/// impl Transform for FlipHorizontal {
///     fn apply(&self, image: RgbImage) -> Result<RgbImage> {
///         Ok(image::imageops::flip_horizontal(&image))
///     }
/// }
/// ```
pub trait Transform: Send + Sync {
    /// Apply the transform to an image.
    fn apply(&self, image: RgbImage) -> Result<RgbImage>;

    /// Get the name of this transform for logging/debugging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A composed transform that applies multiple transforms in sequence.
#[derive(Default)]
pub struct Compose {
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    /// Create a new empty composition.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Add a transform to the composition.
    pub fn push<T: Transform + 'static>(&mut self, transform: T) {
        self.transforms.push(Box::new(transform));
    }

    /// Builder-style [`Compose::push`].
    #[must_use]
    pub fn with<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.push(transform);
        self
    }

    /// Number of transforms in the composition.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether the composition is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for Compose {
    fn apply(&self, mut image: RgbImage) -> Result<RgbImage> {
        for transform in &self.transforms {
            image = transform.apply(image)?;
            tracing::trace!(
                transform = transform.name(),
                width = image.width(),
                height = image.height(),
                "Applied transform"
            );
        }
        Ok(image)
    }

    fn name(&self) -> &str {
        "Compose"
    }
}
