//! Classification preprocessing.
//!
//! Reproduces the transform recipe bundled with the EfficientNet-B0
//! ImageNet-1K weights, so inference sees the statistics the network was
//! trained with:
//!
//! 1. resize the shorter side to 256 pixels (bicubic)
//! 2. center crop 224 x 224
//! 3. scale to `[0, 1]`
//! 4. normalize with the ImageNet channel mean and std
//! 5. lay out as `[1, 3, H, W]`

use burn::prelude::*;
use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tumorcam_core::ImageTensor;

use crate::error::{Result, TransformError};
use crate::transform::{Compose, Transform};

/// ImageNet channel means.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Nearest neighbour.
    Nearest,
    /// Linear interpolation.
    Bilinear,
    /// Cubic (Catmull-Rom) interpolation.
    Bicubic,
    /// Lanczos with window 3.
    Lanczos3,
}

impl From<FilterKind> for FilterType {
    fn from(kind: FilterKind) -> Self {
        match kind {
            FilterKind::Nearest => FilterType::Nearest,
            FilterKind::Bilinear => FilterType::Triangle,
            FilterKind::Bicubic => FilterType::CatmullRom,
            FilterKind::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Resize so the shorter side equals `size`, keeping the aspect ratio.
///
/// The longer side is scaled proportionally and truncated to an integer.
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    size: u32,
    filter: FilterKind,
}

impl Resize {
    /// Create a shorter-side resize.
    #[must_use]
    pub const fn new(size: u32, filter: FilterKind) -> Self {
        Self { size, filter }
    }

    /// Output dimensions for an input of `width x height`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidParameter`] if the scaled longer
    /// side does not fit in `u32`.
    pub fn output_size(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        let long_scaled = |short: u32, long: u32| {
            let scaled = (u64::from(self.size) * u64::from(long)) / u64::from(short.max(1));
            u32::try_from(scaled).map_err(|_| {
                TransformError::invalid(
                    "image",
                    format!("{width}x{height} is too elongated to resize to {}", self.size),
                )
            })
        };
        if width <= height {
            Ok((self.size, long_scaled(width, height)?))
        } else {
            Ok((long_scaled(height, width)?, self.size))
        }
    }
}

impl Transform for Resize {
    fn apply(&self, image: RgbImage) -> Result<RgbImage> {
        let (width, height) = self.output_size(image.width(), image.height())?;
        if (width, height) == image.dimensions() {
            return Ok(image);
        }
        Ok(imageops::resize(&image, width, height, self.filter.into()))
    }

    fn name(&self) -> &str {
        "Resize"
    }
}

/// Crop a `size x size` square from the center.
///
/// Images smaller than the crop are first padded with black, centered.
#[derive(Debug, Clone, Copy)]
pub struct CenterCrop {
    size: u32,
}

impl CenterCrop {
    /// Create a center crop.
    #[must_use]
    pub const fn new(size: u32) -> Self {
        Self { size }
    }

    /// Offset of the crop window along one axis, rounding half to even.
    fn offset(extent: u32, size: u32) -> u32 {
        (f64::from(extent - size) / 2.0).round_ties_even() as u32
    }

    fn pad(&self, image: RgbImage) -> RgbImage {
        let (width, height) = image.dimensions();
        if width >= self.size && height >= self.size {
            return image;
        }

        let padded_w = width.max(self.size);
        let padded_h = height.max(self.size);
        let mut canvas = RgbImage::from_pixel(padded_w, padded_h, Rgb([0, 0, 0]));
        let left = (padded_w - width) / 2;
        let top = (padded_h - height) / 2;
        imageops::replace(&mut canvas, &image, i64::from(left), i64::from(top));
        canvas
    }
}

impl Transform for CenterCrop {
    fn apply(&self, image: RgbImage) -> Result<RgbImage> {
        let image = self.pad(image);
        let (width, height) = image.dimensions();
        let left = Self::offset(width, self.size);
        let top = Self::offset(height, self.size);
        Ok(imageops::crop_imm(&image, left, top, self.size, self.size).to_image())
    }

    fn name(&self) -> &str {
        "CenterCrop"
    }
}

/// Configuration of the preprocessing recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Target length of the shorter side before cropping.
    pub resize_size: u32,
    /// Side of the square center crop, the network input size.
    pub crop_size: u32,
    /// Per-channel mean subtracted after scaling to `[0, 1]`.
    pub mean: [f32; 3],
    /// Per-channel standard deviation divided after subtracting the mean.
    pub std: [f32; 3],
    /// Resampling filter of the resize step.
    pub filter: FilterKind,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            resize_size: 256,
            crop_size: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            filter: FilterKind::Bicubic,
        }
    }
}

impl PreprocessConfig {
    /// Create a config with custom sizes and the ImageNet statistics.
    #[must_use]
    pub fn new(resize_size: u32, crop_size: u32) -> Self {
        Self {
            resize_size,
            crop_size,
            ..Default::default()
        }
    }

    /// Check the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidParameter`] for zero sizes, a crop
    /// larger than the resize target, or non-positive standard deviations.
    pub fn validate(&self) -> Result<()> {
        if self.resize_size == 0 {
            return Err(TransformError::invalid("resize_size", "must be positive"));
        }
        if self.crop_size == 0 {
            return Err(TransformError::invalid("crop_size", "must be positive"));
        }
        if self.crop_size > self.resize_size {
            return Err(TransformError::invalid(
                "crop_size",
                format!(
                    "{} exceeds resize_size {}",
                    self.crop_size, self.resize_size
                ),
            ));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(TransformError::invalid("std", "entries must be positive"));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(TransformError::invalid("mean", "entries must be finite"));
        }
        Ok(())
    }

    /// Bounds every normalized value lies within.
    #[must_use]
    pub fn normalized_range(&self) -> (f32, f32) {
        let low = (0..3)
            .map(|c| (0.0 - self.mean[c]) / self.std[c])
            .fold(f32::INFINITY, f32::min);
        let high = (0..3)
            .map(|c| (1.0 - self.mean[c]) / self.std[c])
            .fold(f32::NEG_INFINITY, f32::max);
        (low, high)
    }
}

/// Turns decoded images into network input tensors.
pub struct Preprocessor {
    config: PreprocessConfig,
    pipeline: Compose,
}

impl Preprocessor {
    /// Build the resize / crop pipeline for a config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PreprocessConfig) -> Self {
        let pipeline = Compose::new()
            .with(Resize::new(config.resize_size, config.filter))
            .with(CenterCrop::new(config.crop_size));
        Self { config, pipeline }
    }

    /// The active config.
    #[must_use]
    pub const fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Geometric part of the recipe: the cropped RGB image the network sees.
    ///
    /// # Errors
    ///
    /// Propagates transform failures.
    pub fn crop(&self, image: &RgbImage) -> Result<RgbImage> {
        self.pipeline.apply(image.clone())
    }

    /// Run the full recipe and place the tensor on `device`.
    ///
    /// # Errors
    ///
    /// Propagates transform and tensor construction failures.
    pub fn apply<B: Backend>(&self, image: &RgbImage, device: &B::Device) -> Result<ImageTensor<B>> {
        let cropped = self.crop(image)?;
        let tensor = self.to_tensor(&cropped, device)?;
        tracing::debug!(
            input_width = image.width(),
            input_height = image.height(),
            shape = %tensor.shape(),
            "Preprocessed image"
        );
        Ok(tensor)
    }

    /// Scale to `[0, 1]`, normalize, and lay out as `[1, 3, H, W]`.
    ///
    /// # Errors
    ///
    /// Returns an error if tensor construction fails.
    pub fn to_tensor<B: Backend>(&self, image: &RgbImage, device: &B::Device) -> Result<ImageTensor<B>> {
        let (width, height) = image.dimensions();
        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; 3 * plane];

        for (i, pixel) in image.pixels().enumerate() {
            for c in 0..3 {
                let value = f32::from(pixel[c]) / 255.0;
                data[c * plane + i] = (value - self.config.mean[c]) / self.config.std[c];
            }
        }

        Ok(ImageTensor::from_chw(
            data,
            height as usize,
            width as usize,
            device,
        )?)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::build(PreprocessConfig::default())
    }
}
