//! Attribution map computation.

use burn::prelude::*;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};

use crate::error::{ExplainError, Result};

/// Offset added to the maximum when scaling a map to `[0, 1]`.
pub const NORMALIZE_EPS: f32 = 1e-7;

/// Class activation map over an image.
#[derive(Debug, Clone)]
pub struct AttributionMap<B: Backend> {
    /// The attribution values, shape `(batch, 1, height, width)`.
    pub values: Tensor<B, 4>,
    /// Target class (for classification).
    pub target_class: Option<usize>,
}

impl<B: Backend> AttributionMap<B> {
    /// Create a new attribution map.
    pub fn new(values: Tensor<B, 4>) -> Self {
        Self {
            values,
            target_class: None,
        }
    }

    /// Set the target class.
    #[must_use]
    pub fn with_target_class(mut self, class: usize) -> Self {
        self.target_class = Some(class);
        self
    }

    /// Get the shape of the attribution map.
    pub fn shape(&self) -> [usize; 4] {
        self.values.dims()
    }

    /// Scale each map to `[0, 1]`: subtract the minimum, then divide by
    /// `1e-7 + max`. An all-zero map stays zero.
    #[must_use]
    pub fn normalize(&self) -> Self {
        let [batch, channels, height, width] = self.shape();
        let flat = self.values.clone().reshape([batch, channels * height * width]);

        let shifted = flat.clone() - flat.min_dim(1);
        let scaled = shifted.clone() / (shifted.max_dim(1) + NORMALIZE_EPS);

        Self {
            values: scaled.reshape([batch, channels, height, width]),
            target_class: self.target_class,
        }
    }

    /// Bilinear resize to `height x width`, sampling at pixel centers.
    ///
    /// Each map is resized as a single-channel `f32` image with a triangle
    /// filter, which matches OpenCV's `INTER_LINEAR` when upsampling. Values
    /// outside `[0, 1]` are clamped, so normalize first.
    ///
    /// # Errors
    ///
    /// - [`ExplainError::InvalidConfig`] for an empty map or target size
    /// - [`ExplainError::TensorData`] if the values cannot be read back
    pub fn resize(&self, height: usize, width: usize) -> Result<Self> {
        let [batch, channels, rows, cols] = self.shape();
        if rows == 0 || cols == 0 || height == 0 || width == 0 {
            return Err(ExplainError::InvalidConfig(format!(
                "cannot resize a {rows}x{cols} map to {height}x{width}"
            )));
        }

        let (in_width, in_height) = (side(cols)?, side(rows)?);
        let (out_width, out_height) = (side(width)?, side(height)?);
        let device = self.values.device();
        let values = self
            .values
            .clone()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ExplainError::TensorData(format!("{e:?}")))?;

        let mut resized = Vec::with_capacity(batch * channels * height * width);
        for plane in values.chunks_exact(rows * cols) {
            let map =
                ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(in_width, in_height, plane.to_vec())
                    .ok_or_else(|| ExplainError::TensorData(format!("map is not {cols}x{rows}")))?;
            let map = imageops::resize(&map, out_width, out_height, FilterType::Triangle);
            resized.extend(map.into_raw());
        }

        let values = Tensor::from_data(
            TensorData::new(resized, [batch, channels, height, width]),
            &device,
        );
        Ok(Self {
            values,
            target_class: self.target_class,
        })
    }

    /// Row-major values of the first map in the batch.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::TensorData`] if the values cannot be read back.
    pub fn to_mask(&self) -> Result<Vec<f32>> {
        let [_, _, height, width] = self.shape();
        self.values
            .clone()
            .slice([0..1, 0..1, 0..height, 0..width])
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ExplainError::TensorData(format!("{e:?}")))
    }
}

fn side(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| ExplainError::InvalidConfig(format!("map side {len} is too large")))
}

/// Compute Grad-CAM attribution.
///
/// # Arguments
///
/// * `activations` - Activations of the target layer (batch, channels, height, width)
/// * `gradients` - Gradients of the target score w.r.t. the activations, same shape
///
/// # Returns
///
/// Attribution map of shape (batch, 1, height, width).
pub fn grad_cam<B: Backend>(activations: Tensor<B, 4>, gradients: Tensor<B, 4>) -> AttributionMap<B> {
    let [batch, channels, height, width] = gradients.dims();

    // Spatial mean of the gradients: (batch, channels, h, w) -> (batch, channels, 1, 1)
    let weights = gradients
        .reshape([batch, channels, height * width])
        .mean_dim(2)
        .reshape([batch, channels, 1, 1]);

    // Weighted sum across channels: -> (batch, 1, h, w)
    let cam = (activations * weights).sum_dim(1);

    // ReLU
    AttributionMap::new(cam.clamp_min(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumorcam_core::backend::NdArray;

    type TestBackend = NdArray;

    fn tensor(values: Vec<f32>, shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    #[test]
    fn test_attribution_map_with_target_class() {
        let map = AttributionMap::new(tensor(vec![0.0; 4], [1, 1, 2, 2]));
        assert!(map.target_class.is_none());
        assert_eq!(map.with_target_class(2).target_class, Some(2));
    }

    #[test]
    fn test_grad_cam_weights_by_mean_gradient() {
        // Channel 0 has positive mean gradient, channel 1 negative.
        let activations = tensor(
            vec![
                1.0, 2.0, 3.0, 4.0, //
                4.0, 3.0, 2.0, 1.0,
            ],
            [1, 2, 2, 2],
        );
        let gradients = tensor(
            vec![
                1.0, 1.0, 1.0, 1.0, //
                -0.5, -0.5, -0.5, -0.5,
            ],
            [1, 2, 2, 2],
        );

        let cam = grad_cam(activations, gradients);
        assert_eq!(cam.shape(), [1, 1, 2, 2]);

        // 1*a0 - 0.5*a1 = [-1, 0.5, 2, 3.5], then ReLU
        let mask = cam.to_mask().unwrap();
        assert_eq!(mask, vec![0.0, 0.5, 2.0, 3.5]);
    }

    #[test]
    fn test_normalize_range() {
        let map = AttributionMap::new(tensor(vec![2.0, 4.0, 6.0, 10.0], [1, 1, 2, 2]));
        let mask = map.normalize().to_mask().unwrap();

        assert!(mask[0].abs() < 1e-6);
        assert!((mask[3] - 1.0).abs() < 1e-5);
        assert!((mask[1] - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_zero_map() {
        let map = AttributionMap::new(tensor(vec![0.0; 9], [1, 1, 3, 3]));
        let mask = map.normalize().to_mask().unwrap();
        assert!(mask.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_resize() {
        let map = AttributionMap::new(tensor(vec![0.0, 1.0, 1.0, 0.0], [1, 1, 2, 2]))
            .with_target_class(1)
            .resize(224, 224)
            .unwrap();

        assert_eq!(map.shape(), [1, 1, 224, 224]);
        assert_eq!(map.target_class, Some(1));

        let mask = map.to_mask().unwrap();
        assert_eq!(mask.len(), 224 * 224);
        assert!(mask.iter().all(|v| (-1e-6..=1.0 + 1e-6).contains(v)));
    }

    #[test]
    fn test_resize_samples_pixel_centers() {
        // Same result as cv2.resize(..., interpolation=INTER_LINEAR).
        let map = AttributionMap::new(tensor(vec![0.0, 1.0, 0.0, 1.0], [1, 1, 2, 2]))
            .resize(4, 4)
            .unwrap();

        let mask = map.to_mask().unwrap();
        for row in mask.chunks(4) {
            let expected = [0.0, 0.25, 0.75, 1.0];
            for (value, expected) in row.iter().zip(expected) {
                assert!((value - expected).abs() < 1e-6, "{row:?}");
            }
        }
    }

    #[test]
    fn test_resize_keeps_batch_maps_apart() {
        let map = AttributionMap::new(tensor(
            vec![
                1.0, 1.0, 1.0, 1.0, //
                0.0, 0.0, 0.0, 0.0,
            ],
            [2, 1, 2, 2],
        ))
        .resize(3, 5)
        .unwrap();

        assert_eq!(map.shape(), [2, 1, 3, 5]);
        let values = map.values.into_data().to_vec::<f32>().unwrap();
        assert!(values[..15].iter().all(|v| (v - 1.0).abs() < 1e-6));
        assert!(values[15..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_resize_rejects_empty_target() {
        let map = AttributionMap::new(tensor(vec![0.5; 4], [1, 1, 2, 2]));
        assert!(matches!(
            map.resize(0, 4),
            Err(ExplainError::InvalidConfig(_))
        ));
    }
}
