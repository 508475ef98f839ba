//! Tumor classifier: an EfficientNet paired with its class names.

use std::path::Path;

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use tumorcam_core::{CoreError, ImageTensor, LabelSet, Prediction};

use crate::checkpoint::{load_model, CheckpointError, CheckpointMetadata, CheckpointOptions};
use crate::cnn::{EfficientNet, EfficientNetConfig};

/// Result type for classifier operations.
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Classifier errors.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Checkpoint could not be loaded.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Label count differs from the classifier head.
    #[error("{labels} labels configured but the classifier has {outputs} outputs")]
    LabelMismatch {
        /// Configured label count.
        labels: usize,
        /// Classifier output count.
        outputs: usize,
    },

    /// Tensor or label error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Forward pass produced unusable output.
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// EfficientNet classifier with its class names, ready for inference.
///
/// The model is kept twice: on the inner backend for prediction and
/// feature extraction, where batch norm runs on its running statistics,
/// and on the autodiff backend so the classification head can be
/// differentiated with respect to the last feature maps.
#[derive(Debug, Clone)]
pub struct TumorClassifier<B: AutodiffBackend> {
    model: EfficientNet<B>,
    inference: EfficientNet<B::InnerBackend>,
    labels: LabelSet,
    device: B::Device,
}

impl<B: AutodiffBackend> TumorClassifier<B> {
    /// Wrap a model.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::LabelMismatch`] if the head output count
    /// differs from the number of labels.
    pub fn new(model: EfficientNet<B>, labels: LabelSet, device: B::Device) -> Result<Self> {
        let outputs = model.n_classes();
        if outputs != labels.len() {
            return Err(ClassifierError::LabelMismatch {
                labels: labels.len(),
                outputs,
            });
        }

        let inference = model.valid();
        Ok(Self {
            model,
            inference,
            labels,
            device,
        })
    }

    /// Load EfficientNet-B0 weights with one output per label.
    ///
    /// A `.mpk` checkpoint written by `convert` has a JSON sidecar listing
    /// the class names it was trained with; those must equal `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::Checkpoint`] if the file is missing,
    /// unreadable, shaped for a different architecture, or saved with
    /// different class names.
    pub fn load(
        path: impl AsRef<Path>,
        labels: LabelSet,
        options: &CheckpointOptions,
        device: &B::Device,
    ) -> Result<Self> {
        let path = path.as_ref();
        if let Some(metadata) = CheckpointMetadata::for_checkpoint(path)? {
            metadata.check_labels(&labels)?;
        }

        let config = EfficientNetConfig::b0(labels.len());
        let model = load_model::<B>(path, &config, options, device)?;
        Self::new(model, labels, device.clone())
    }

    /// Class names in output order.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Device the weights live on.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// The model on the inference backend.
    pub fn model(&self) -> &EfficientNet<B::InnerBackend> {
        &self.inference
    }

    /// Last feature maps, shape `(1, 1280, H/32, W/32)`.
    pub fn features(&self, input: &ImageTensor<B::InnerBackend>) -> Tensor<B::InnerBackend, 4> {
        self.inference.features(input.inner().clone())
    }

    /// Apply the classification head on the autodiff backend.
    ///
    /// Gradients of the returned logits flow back to `features`.
    pub fn classify_tracked(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        self.model.classify(features)
    }

    /// Raw logits for an image.
    pub fn logits(&self, input: &ImageTensor<B::InnerBackend>) -> Tensor<B::InnerBackend, 2> {
        self.inference.forward(input.inner().clone())
    }

    /// Classify a preprocessed image.
    ///
    /// # Errors
    ///
    /// Returns an error if the output is not a valid probability vector.
    pub fn predict(&self, input: &ImageTensor<B::InnerBackend>) -> Result<Prediction> {
        let probs = softmax(self.logits(input), 1);
        let [batch, classes] = probs.dims();
        if batch != 1 || classes != self.labels.len() {
            return Err(ClassifierError::Inference(format!(
                "expected [1, {}] probabilities, got [{batch}, {classes}]",
                self.labels.len()
            )));
        }

        let probabilities = probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("{e:?}")))?;
        let prediction = Prediction::from_probabilities(probabilities, &self.labels)?;

        tracing::debug!(
            label = prediction.label(),
            confidence = prediction.confidence(),
            "Classified image"
        );
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumorcam_core::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn classifier(n_classes: usize) -> TumorClassifier<TestBackend> {
        let device = Default::default();
        let model = EfficientNetConfig::b0(n_classes).init::<TestBackend>(&device);
        TumorClassifier::new(model, LabelSet::default(), device).unwrap()
    }

    fn input(size: usize) -> ImageTensor<NdArray> {
        let data = (0..3 * size * size)
            .map(|i| ((i % 17) as f32 / 8.0) - 1.0)
            .collect();
        ImageTensor::from_chw(data, size, size, &Default::default()).unwrap()
    }

    #[test]
    fn test_label_mismatch() {
        let device = Default::default();
        let model = EfficientNetConfig::b0(3).init::<TestBackend>(&device);
        let result = TumorClassifier::new(model, LabelSet::default(), device);
        assert!(matches!(
            result,
            Err(ClassifierError::LabelMismatch {
                labels: 4,
                outputs: 3
            })
        ));
    }

    #[test]
    fn test_predict_distribution() {
        let classifier = classifier(4);
        let prediction = classifier.predict(&input(64)).unwrap();

        assert_eq!(prediction.probabilities().len(), 4);
        let sum: f32 = prediction.probabilities().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(classifier.labels().contains(prediction.label()));
    }

    #[test]
    fn test_predict_is_deterministic() {
        let classifier = classifier(4);
        let image = input(64);

        let first = classifier.predict(&image).unwrap();
        let second = classifier.predict(&image).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tracked_head_matches_inference() {
        let classifier = classifier(4);
        let image = input(64);

        let features = classifier.features(&image);
        assert_eq!(features.dims(), [1, 1280, 2, 2]);

        let tracked = classifier.classify_tracked(Tensor::from_inner(features));
        tracked
            .inner()
            .into_data()
            .assert_approx_eq(&classifier.logits(&image).into_data(), 4);
    }

    #[test]
    fn test_load_checks_sidecar_labels() {
        use crate::checkpoint::save_model;

        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let config = EfficientNetConfig::b0(4);
        let model = config.init::<TestBackend>(&device);
        let path = save_model(&model, dir.path().join("model.mpk")).unwrap();

        // No sidecar: any four labels load.
        let labels = LabelSet::new(["a", "b", "c", "d"]).unwrap();
        assert!(TumorClassifier::<TestBackend>::load(
            &path,
            labels.clone(),
            &CheckpointOptions::default(),
            &device
        )
        .is_ok());

        CheckpointMetadata::new("efficientnet_b0", config)
            .with_labels(LabelSet::default().iter())
            .save(CheckpointMetadata::sidecar_path(&path))
            .unwrap();

        let result = TumorClassifier::<TestBackend>::load(
            &path,
            labels,
            &CheckpointOptions::default(),
            &device,
        );
        assert!(matches!(
            result,
            Err(ClassifierError::Checkpoint(CheckpointError::LabelMismatch { .. }))
        ));

        let classifier = TumorClassifier::<TestBackend>::load(
            &path,
            LabelSet::default(),
            &CheckpointOptions::default(),
            &device,
        )
        .unwrap();
        assert_eq!(classifier.labels(), &LabelSet::default());
    }

    #[test]
    fn test_missing_checkpoint() {
        let result = TumorClassifier::<TestBackend>::load(
            "/nonexistent/efficientnet_b0.pth",
            LabelSet::default(),
            &CheckpointOptions::default(),
            &Default::default(),
        );
        assert!(matches!(
            result,
            Err(ClassifierError::Checkpoint(CheckpointError::NotFound(_)))
        ));
    }
}
