//! Classification pipeline: preprocess, predict, explain.

use std::path::Path;
use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;
use image::RgbImage;
use tumorcam_core::{select_device, ExplainBackend, ImageTensor, LabelSet, Prediction};
use tumorcam_explain::{GradCam, SaliencyMap};
use tumorcam_models::{ClassifierError, TumorClassifier};
use tumorcam_transforms::{load_image, load_image_bytes, Preprocessor};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::report::Report;

/// Result of analyzing one image.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The decoded upload.
    pub image: RgbImage,
    /// Predicted label and class probabilities.
    pub prediction: Prediction,
    /// Grad-CAM explanation of the predicted label, when enabled.
    pub saliency: Option<SaliencyMap>,
}

impl Analysis {
    /// Render as an HTML report with inline JPEG images.
    ///
    /// # Errors
    ///
    /// Returns an error if an image cannot be encoded.
    pub fn report(&self, labels: &LabelSet, jpeg_quality: u8) -> Result<Report> {
        Report::from_analysis(self, labels, jpeg_quality)
    }
}

/// Loaded model and preprocessing, built once at startup.
///
/// Holds no mutable state; every request borrows it immutably.
pub struct Pipeline<B: AutodiffBackend = ExplainBackend> {
    config: PipelineConfig,
    preprocessor: Preprocessor,
    classifier: TumorClassifier<B>,
}

impl Pipeline<ExplainBackend> {
    /// Build the pipeline on the device selected for the compiled backend.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Pipeline::new`].
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let (_, device) = select_device();
        Self::new(config, &device)
    }
}

impl<B: AutodiffBackend> Pipeline<B> {
    /// Validate the configuration and load the checkpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for an invalid configuration
    /// - [`Error::Checkpoint`] if the weights are missing, corrupt or
    ///   shaped for another architecture
    pub fn new(config: PipelineConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let start = Instant::now();
        let classifier = TumorClassifier::load(
            &config.checkpoint,
            config.labels.clone(),
            &config.checkpoint_options(),
            device,
        )
        .map_err(|e| match e {
            ClassifierError::Checkpoint(e) => Error::Checkpoint(e),
            other => Error::Classifier(other),
        })?;
        tracing::debug!(elapsed_ms = start.elapsed().as_millis(), "Model ready");

        Self::with_classifier(config, classifier)
    }

    /// Build the pipeline around an already loaded classifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or its
    /// labels differ from the classifier's.
    pub fn with_classifier(config: PipelineConfig, classifier: TumorClassifier<B>) -> Result<Self> {
        config.validate()?;
        if classifier.labels() != &config.labels {
            return Err(Error::Config(
                "configured labels differ from the classifier labels".to_string(),
            ));
        }

        let preprocessor = Preprocessor::new(config.preprocess.clone())?;
        Ok(Self {
            config,
            preprocessor,
            classifier,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The loaded classifier.
    pub fn classifier(&self) -> &TumorClassifier<B> {
        &self.classifier
    }

    /// Class names in output order.
    pub fn labels(&self) -> &LabelSet {
        self.classifier.labels()
    }

    /// Turn a decoded image into the network input tensor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transform`] if preprocessing fails.
    pub fn preprocess(&self, image: &RgbImage) -> Result<ImageTensor<B::InnerBackend>> {
        Ok(self
            .preprocessor
            .apply::<B::InnerBackend>(image, self.classifier.device())?)
    }

    /// Classify a preprocessed image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Classifier`] if inference fails.
    pub fn predict(&self, input: &ImageTensor<B::InnerBackend>) -> Result<Prediction> {
        let start = Instant::now();
        let prediction = self.classifier.predict(input)?;
        tracing::debug!(elapsed_ms = start.elapsed().as_millis(), "Prediction done");
        Ok(prediction)
    }

    /// Grad-CAM explanation of `label` for an image and its tensor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Explain`] for an unknown label or a failed backward pass.
    pub fn explain(
        &self,
        image: &RgbImage,
        input: &ImageTensor<B::InnerBackend>,
        label: &str,
    ) -> Result<SaliencyMap> {
        let start = Instant::now();
        let saliency =
            GradCam::new(&self.classifier, self.config.overlay)?.explain(image, input, label)?;
        tracing::debug!(elapsed_ms = start.elapsed().as_millis(), "Explanation done");
        Ok(saliency)
    }

    /// Preprocess, predict and, if enabled, explain the predicted label.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub fn analyze(&self, image: RgbImage) -> Result<Analysis> {
        let input = self.preprocess(&image)?;
        let prediction = self.predict(&input)?;
        tracing::info!(
            label = prediction.label(),
            confidence = %prediction.confidence_percent(),
            "Predicted"
        );

        let saliency = if self.config.explain {
            Some(self.explain(&image, &input, prediction.label())?)
        } else {
            None
        };

        Ok(Analysis {
            image,
            prediction,
            saliency,
        })
    }

    /// Decode uploaded bytes, then [`Pipeline::analyze`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transform`] for empty, non-image or corrupted input,
    /// before the model runs.
    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<Analysis> {
        self.analyze(load_image_bytes(bytes)?)
    }

    /// Read and decode an image file, then [`Pipeline::analyze`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transform`] if the file cannot be read or decoded.
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> Result<Analysis> {
        self.analyze(load_image(path)?)
    }

    /// Render an analysis with this pipeline's labels and JPEG quality.
    ///
    /// # Errors
    ///
    /// Returns an error if an image cannot be encoded.
    pub fn report(&self, analysis: &Analysis) -> Result<Report> {
        analysis.report(self.labels(), self.config.jpeg_quality)
    }
}
