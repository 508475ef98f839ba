//! Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tumorcam_core::LabelSet;
use tumorcam_explain::OverlayConfig;
use tumorcam_models::CheckpointOptions;
use tumorcam_transforms::PreprocessConfig;

use crate::error::{Error, Result};

/// Default location of the trained weights.
pub const DEFAULT_CHECKPOINT: &str = "models/efficientnet_b0.pth";

/// Configuration of the classification pipeline.
///
/// Every field has a default, so a JSON file only needs the values it
/// changes:
///
/// ```json
/// { "checkpoint": "weights/brain_mri.pth", "explain": false }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path to the trained weights (`.pth`, `.pt` or `.mpk`).
    pub checkpoint: PathBuf,
    /// Key of the state dict inside a PyTorch checkpoint, if nested.
    pub top_level_key: Option<String>,
    /// Class names in classifier output order.
    pub labels: LabelSet,
    /// Preprocessing recipe.
    pub preprocess: PreprocessConfig,
    /// Saliency overlay rendering.
    pub overlay: OverlayConfig,
    /// Compute a Grad-CAM explanation for each prediction.
    pub explain: bool,
    /// JPEG quality of embedded images, 1 to 100.
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            checkpoint: PathBuf::from(DEFAULT_CHECKPOINT),
            top_level_key: None,
            labels: LabelSet::default(),
            preprocess: PreprocessConfig::default(),
            overlay: OverlayConfig::default(),
            explain: true,
            jpeg_quality: 90,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigFile`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| Error::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| Error::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigFile`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| Error::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Set the checkpoint path.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: impl Into<PathBuf>) -> Self {
        self.checkpoint = checkpoint.into();
        self
    }

    /// Enable or disable explanations.
    #[must_use]
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// Checkpoint reading options.
    pub fn checkpoint_options(&self) -> CheckpointOptions {
        CheckpointOptions {
            top_level_key: self.top_level_key.clone(),
        }
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint.as_os_str().is_empty() {
            return Err(Error::Config("checkpoint path is empty".to_string()));
        }
        if self.labels.is_empty() {
            return Err(Error::Config("label set is empty".to_string()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg_quality {} is outside 1..=100",
                self.jpeg_quality
            )));
        }
        self.preprocess
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        self.overlay
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(())
    }
}
