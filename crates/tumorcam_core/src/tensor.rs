//! Image tensor type.

use burn::prelude::*;

use crate::error::{CoreError, Result};
use crate::shape::ImageShape;

/// A preprocessed image tensor with shape metadata.
///
/// Wraps a Burn tensor and ensures the shape follows the `(B, C, H, W)`
/// convention with a single RGB image, which is what the classifier expects.
///
/// # Type Parameters
///
/// * `B` - The Burn backend type
///
/// # Example
///
/// ```rust,ignore
/// use tumorcam_core::ImageTensor;
///
/// let tensor = Tensor::<NdArray, 4>::zeros([1, 3, 224, 224], &device);
/// let image = ImageTensor::new(tensor)?;
/// ```
#[derive(Debug, Clone)]
pub struct ImageTensor<B: Backend> {
    inner: Tensor<B, 4>,
    shape: ImageShape,
}

impl<B: Backend> ImageTensor<B> {
    /// Create a new ImageTensor from a Burn tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor is not a single 3-channel image.
    pub fn new(tensor: Tensor<B, 4>) -> Result<Self> {
        let shape = ImageShape::from(tensor.dims());
        shape.ensure_single_rgb()?;
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Build a tensor from planar CHW data, adding the leading batch dimension.
    ///
    /// # Arguments
    ///
    /// * `data` - `3 * height * width` values, channel-major
    /// * `height` - Image height
    /// * `width` - Image width
    /// * `device` - The device to create the tensor on
    ///
    /// # Errors
    ///
    /// Returns an error if the data length does not match the shape.
    pub fn from_chw(data: Vec<f32>, height: usize, width: usize, device: &B::Device) -> Result<Self> {
        let shape = ImageShape::single_rgb(height, width);
        if data.len() != shape.numel() {
            return Err(CoreError::InvalidShape {
                expected: format!("{} values for {}", shape.numel(), shape),
                got: format!("{} values", data.len()),
            });
        }

        let tensor = Tensor::from_data(TensorData::new(data, shape.as_array()), device);
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Get the shape metadata.
    #[must_use]
    pub const fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Get the height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.shape.height()
    }

    /// Get the width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.shape.width()
    }

    /// Get a reference to the underlying Burn tensor.
    #[must_use]
    pub const fn inner(&self) -> &Tensor<B, 4> {
        &self.inner
    }

    /// Consume self and return the underlying Burn tensor.
    #[must_use]
    pub fn into_inner(self) -> Tensor<B, 4> {
        self.inner
    }

    /// Get the device the tensor is on.
    pub fn device(&self) -> B::Device {
        self.inner.device()
    }

    /// Smallest and largest element.
    pub fn value_range(&self) -> (f32, f32) {
        let min: f32 = self.inner.clone().min().into_scalar().elem();
        let max: f32 = self.inner.clone().max().into_scalar().elem();
        (min, max)
    }

    /// Read the values back as a flat `B, C, H, W` ordered vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend data cannot be converted to `f32`.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        self.inner
            .to_data()
            .to_vec::<f32>()
            .map_err(|e| CoreError::TensorData(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_new_accepts_single_rgb() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::zeros([1, 3, 16, 8], &device);
        let image = ImageTensor::new(tensor).unwrap();

        assert_eq!(image.shape().as_array(), [1, 3, 16, 8]);
        assert_eq!(image.height(), 16);
        assert_eq!(image.width(), 8);
    }

    #[test]
    fn test_new_rejects_wrong_channels() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::zeros([1, 1, 16, 16], &device);
        assert!(matches!(
            ImageTensor::new(tensor),
            Err(CoreError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_from_chw_layout() {
        let device = Default::default();
        // Channel c is filled with the value c.
        let data: Vec<f32> = (0..3).flat_map(|c| vec![c as f32; 4]).collect();
        let image = ImageTensor::<TestBackend>::from_chw(data.clone(), 2, 2, &device).unwrap();

        assert_eq!(image.to_vec().unwrap(), data);
        assert_eq!(image.value_range(), (0.0, 2.0));
    }

    #[test]
    fn test_from_chw_length_mismatch() {
        let device = Default::default();
        let result = ImageTensor::<TestBackend>::from_chw(vec![0.0; 10], 2, 2, &device);
        assert!(result.is_err());
    }
}
