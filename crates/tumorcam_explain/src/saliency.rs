//! Grad-CAM saliency maps for the tumor classifier.
//!
//! The target layer is the last feature layer of the network (head
//! convolution, batch norm and SiLU). Features are computed on the inference
//! backend, then re-entered into the autodiff graph as a leaf so that only the
//! pooling and linear head are differentiated.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tumorcam_core::ImageTensor;
use tumorcam_models::TumorClassifier;
use tumorcam_transforms::{overlay_heatmap, resize_for_display};

use crate::activation::LayerCapture;
use crate::attribution::{grad_cam, AttributionMap};
use crate::error::{ExplainError, Result};

/// Name under which the target layer is captured.
pub const TARGET_LAYER: &str = "head";

/// Rendering options for saliency overlays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Side of the square display images.
    pub display_size: u32,
    /// Weight of the original image in the blend, in `[0, 1]`.
    pub image_weight: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            display_size: 224,
            image_weight: 0.5,
        }
    }
}

impl OverlayConfig {
    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::InvalidConfig`] for a zero display size or an
    /// image weight outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.display_size == 0 {
            return Err(ExplainError::InvalidConfig(
                "display_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.image_weight) {
            return Err(ExplainError::InvalidConfig(format!(
                "image_weight {} is outside [0, 1]",
                self.image_weight
            )));
        }
        Ok(())
    }
}

/// A rendered explanation.
#[derive(Debug, Clone)]
pub struct SaliencyMap {
    label: String,
    target_class: usize,
    mask: Vec<f32>,
    resized: RgbImage,
    overlay: RgbImage,
}

impl SaliencyMap {
    /// Label the map explains.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Output unit of the label.
    pub fn target_class(&self) -> usize {
        self.target_class
    }

    /// Normalized attribution values, row-major at display resolution.
    pub fn mask(&self) -> &[f32] {
        &self.mask
    }

    /// The original image resized for display.
    pub fn resized(&self) -> &RgbImage {
        &self.resized
    }

    /// The heatmap blended over the resized image.
    pub fn overlay(&self) -> &RgbImage {
        &self.overlay
    }
}

/// Grad-CAM explainer bound to a classifier.
#[derive(Debug)]
pub struct GradCam<'a, B: AutodiffBackend> {
    classifier: &'a TumorClassifier<B>,
    config: OverlayConfig,
}

impl<'a, B: AutodiffBackend> GradCam<'a, B> {
    /// Create an explainer.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::InvalidConfig`] if the overlay config is invalid.
    pub fn new(classifier: &'a TumorClassifier<B>, config: OverlayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { classifier, config })
    }

    /// Overlay configuration.
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Capture the target layer activation and the gradient of the
    /// `target` logit with respect to it.
    ///
    /// # Errors
    ///
    /// - [`ExplainError::UnknownLabel`] if `target` is not an output unit
    /// - [`ExplainError::MissingGradient`] if no gradient reaches the layer
    pub fn capture(
        &self,
        input: &ImageTensor<B::InnerBackend>,
        target: usize,
    ) -> Result<LayerCapture<B::InnerBackend>> {
        let features = self.classifier.features(input);
        let tracked = Tensor::<B, 4>::from_inner(features.clone()).require_grad();

        let logits = self.classifier.classify_tracked(tracked.clone());
        let [_, classes] = logits.dims();
        if target >= classes {
            return Err(ExplainError::UnknownLabel(format!("class index {target}")));
        }

        let score = logits.slice([0..1, target..target + 1]).sum();
        let grads = score.backward();
        let gradient = tracked
            .grad(&grads)
            .ok_or(ExplainError::MissingGradient)?;

        tracing::debug!(
            layer = TARGET_LAYER,
            shape = ?gradient.dims(),
            "Captured gradient"
        );

        let mut capture = LayerCapture::new();
        capture.store_activation(TARGET_LAYER, features);
        capture.store_gradient(TARGET_LAYER, gradient);
        Ok(capture)
    }

    /// Grad-CAM map for `label`, normalized and resized to the display size.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::UnknownLabel`] if the label is not a class of
    /// the classifier, and the errors of [`GradCam::capture`].
    pub fn attribution(
        &self,
        input: &ImageTensor<B::InnerBackend>,
        label: &str,
    ) -> Result<AttributionMap<B::InnerBackend>> {
        let target = self
            .classifier
            .labels()
            .index_of(label)
            .map_err(|_| ExplainError::UnknownLabel(label.to_string()))?;

        let mut capture = self.capture(input, target)?;
        let (activations, gradients) = capture
            .take(TARGET_LAYER)
            .ok_or(ExplainError::MissingGradient)?;

        let size = self.config.display_size as usize;
        let map = grad_cam(activations, gradients)
            .with_target_class(target)
            .normalize()
            .resize(size, size)?
            .normalize();

        Ok(map)
    }

    /// Explain why `label` was predicted for `image`.
    ///
    /// `input` is the preprocessed tensor of `image`. Returns the image
    /// resized to the display size together with the JET heatmap blended
    /// over it.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`GradCam::attribution`], or a rendering error.
    pub fn explain(
        &self,
        image: &RgbImage,
        input: &ImageTensor<B::InnerBackend>,
        label: &str,
    ) -> Result<SaliencyMap> {
        let map = self.attribution(input, label)?;
        let target_class = map.target_class.unwrap_or_default();
        let mask = map.to_mask()?;

        let resized = resize_for_display(image, self.config.display_size);
        let overlay = overlay_heatmap(&resized, &mask, self.config.image_weight)?;

        tracing::debug!(label, target_class, "Rendered saliency overlay");

        Ok(SaliencyMap {
            label: label.to_string(),
            target_class,
            mask,
            resized,
            overlay,
        })
    }
}
