//! Model checkpointing and serialization utilities.
//!
//! Provides utilities for loading classifier weights with Burn's record system.
//!
//! # Supported Formats
//!
//! - **PyTorch** (`*.pth`, `*.pt`): a torchvision-style `state_dict`, read
//!   tensor by tensor without executing pickled code. Parameter names are
//!   remapped from torchvision's `features.N.M.block.K` layout.
//! - **Named MessagePack** (`*.mpk`): Burn's native format, produced by
//!   [`save_model`] or the `convert` command.
//!
//! # Example
//!
//! ```rust,ignore
//! use tumorcam_models::checkpoint::{load_model, save_model, CheckpointOptions};
//! use tumorcam_models::EfficientNetConfig;
//!
//! let config = EfficientNetConfig::b0(4);
//! let model = load_model::<NdArray>(
//!     "models/efficientnet_b0.pth",
//!     &config,
//!     &CheckpointOptions::default(),
//!     &device,
//! )?;
//!
//! save_model(&model, "models/efficientnet_b0.mpk")?;
//! ```

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use serde::{Deserialize, Serialize};
use tumorcam_core::LabelSet;

use crate::cnn::{EfficientNet, EfficientNetConfig, EfficientNetRecord};

/// Checkpoint format for model serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// PyTorch pickle archive holding a state dict.
    PyTorch,
    /// Named MessagePack (includes parameter names).
    NamedMessagePack,
}

impl CheckpointFormat {
    /// Infer the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::InvalidFormat`] for unknown extensions.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("pth" | "pt") => Ok(Self::PyTorch),
            Some("mpk") => Ok(Self::NamedMessagePack),
            _ => Err(CheckpointError::InvalidFormat(format!(
                "{} (expected .pth, .pt or .mpk)",
                path.display()
            ))),
        }
    }
}

/// Options for reading PyTorch checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointOptions {
    /// Key holding the state dict when the file wraps it in a dictionary,
    /// e.g. `"state_dict"` or `"model"`.
    pub top_level_key: Option<String>,
}

impl CheckpointOptions {
    /// Read the state dict from `key` instead of the file root.
    #[must_use]
    pub fn with_top_level_key(mut self, key: impl Into<String>) -> Self {
        self.top_level_key = Some(key.into());
        self
    }
}

/// Regex remaps from torchvision parameter names to [`EfficientNet`] fields.
///
/// torchvision stores the stem at `features.0`, stage `s` at `features.s`
/// and the head convolution after the last stage. Inside a block the
/// expansion convolution is absent when the expand ratio is 1, which shifts
/// the remaining layer indices down by one.
pub fn torchvision_key_remaps(config: &EfficientNetConfig) -> Vec<(String, String)> {
    let mut remaps = vec![
        (r"^module\.(.+)$".to_string(), "${1}".to_string()),
        (r"^features\.0\.0\.(.+)$".to_string(), "stem.conv.${1}".to_string()),
        (r"^features\.0\.1\.(.+)$".to_string(), "stem.norm.${1}".to_string()),
    ];

    let mut block = 0;
    for (s, stage) in config.stages.iter().enumerate() {
        let feature = s + 1;
        let layers = if stage.expand_ratio == 1 {
            vec!["depthwise", "se", "project"]
        } else {
            vec!["expand", "depthwise", "se", "project"]
        };

        for layer in 0..stage.num_layers {
            let prefix = format!(r"^features\.{feature}\.{layer}\.block\.");
            for (k, name) in layers.iter().enumerate() {
                if *name == "se" {
                    remaps.push((
                        format!(r"{prefix}{k}\.(.+)$"),
                        format!("blocks.{block}.se.${{1}}"),
                    ));
                } else {
                    remaps.push((
                        format!(r"{prefix}{k}\.0\.(.+)$"),
                        format!("blocks.{block}.{name}.conv.${{1}}"),
                    ));
                    remaps.push((
                        format!(r"{prefix}{k}\.1\.(.+)$"),
                        format!("blocks.{block}.{name}.norm.${{1}}"),
                    ));
                }
            }
            block += 1;
        }
    }

    let head = config.stages.len() + 1;
    remaps.push((
        format!(r"^features\.{head}\.0\.(.+)$"),
        "head.conv.${1}".to_string(),
    ));
    remaps.push((
        format!(r"^features\.{head}\.1\.(.+)$"),
        "head.norm.${1}".to_string(),
    ));
    // classifier.0 is dropout
    remaps.push((r"^classifier\.1\.(.+)$".to_string(), "classifier.${1}".to_string()));

    remaps
}

/// Read an [`EfficientNet`] record from a checkpoint file.
///
/// # Arguments
///
/// * `path` - Path to checkpoint
/// * `config` - Architecture the checkpoint is expected to match
/// * `options` - PyTorch reading options
/// * `device` - Device to load tensors onto
///
/// # Errors
///
/// - [`CheckpointError::NotFound`] if the file does not exist
/// - [`CheckpointError::InvalidFormat`] for an unknown extension
/// - [`CheckpointError::Load`] if the file cannot be parsed
pub fn load_record<B: Backend>(
    path: impl AsRef<Path>,
    config: &EfficientNetConfig,
    options: &CheckpointOptions,
    device: &B::Device,
) -> Result<EfficientNetRecord<B>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(CheckpointError::NotFound(path.to_path_buf()));
    }

    let format = CheckpointFormat::from_path(path)?;
    tracing::debug!(path = %path.display(), ?format, "Reading checkpoint");

    let record = match format {
        CheckpointFormat::PyTorch => {
            let mut args = LoadArgs::new(path.to_path_buf());
            for (pattern, replacement) in torchvision_key_remaps(config) {
                args = args.with_key_remap(&pattern, &replacement);
            }
            if let Some(key) = &options.top_level_key {
                args = args.with_top_level_key(key);
            }
            if tracing::enabled!(tracing::Level::TRACE) {
                args = args.with_debug_print();
            }

            PyTorchFileRecorder::<FullPrecisionSettings>::default()
                .load(args, device)
                .map_err(|e| CheckpointError::Load(e.to_string()))?
        }
        CheckpointFormat::NamedMessagePack => NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(path.to_path_buf(), device)
            .map_err(|e| CheckpointError::Load(e.to_string()))?,
    };

    Ok(record)
}

/// Verify a record has the shape of the configured architecture.
///
/// Only the layers whose shape depends on the configuration are checked:
/// the stem input channels, the block count, the feature width and the
/// classifier head.
///
/// # Errors
///
/// Returns [`CheckpointError::IncompatibleArchitecture`] on the first mismatch.
pub fn check_compatibility<B: Backend>(
    record: &EfficientNetRecord<B>,
    config: &EfficientNetConfig,
) -> Result<()> {
    let mismatch = |what: &str, expected: String, got: String| {
        Err(CheckpointError::IncompatibleArchitecture {
            what: what.to_string(),
            expected,
            got,
        })
    };

    let stem = record.stem.conv.weight.val().dims();
    if stem[0] != config.stem_channels || stem[1] != config.in_channels {
        return mismatch(
            "stem convolution",
            format!("[{}, {}, 3, 3]", config.stem_channels, config.in_channels),
            format!("{stem:?}"),
        );
    }

    if record.blocks.len() != config.num_blocks() {
        return mismatch(
            "block count",
            config.num_blocks().to_string(),
            record.blocks.len().to_string(),
        );
    }

    let head = record.head.conv.weight.val().dims();
    if head[0] != config.feature_channels {
        return mismatch(
            "feature channels",
            config.feature_channels.to_string(),
            head[0].to_string(),
        );
    }

    let classifier = record.classifier.weight.val().dims();
    if classifier != [config.feature_channels, config.n_classes] {
        return mismatch(
            "classifier",
            format!("{} inputs, {} classes", config.feature_channels, config.n_classes),
            format!("{} inputs, {} classes", classifier[0], classifier[1]),
        );
    }

    Ok(())
}

/// Load an [`EfficientNet`] from a checkpoint file.
///
/// # Errors
///
/// Returns the errors of [`load_record`] and [`check_compatibility`].
pub fn load_model<B: Backend>(
    path: impl AsRef<Path>,
    config: &EfficientNetConfig,
    options: &CheckpointOptions,
    device: &B::Device,
) -> Result<EfficientNet<B>> {
    let path = path.as_ref();
    let record = load_record::<B>(path, config, options, device)?;
    check_compatibility(&record, config)?;

    tracing::info!(
        path = %path.display(),
        classes = config.n_classes,
        "Loaded checkpoint"
    );

    Ok(config.init::<B>(device).load_record(record))
}

/// Save a model as Named MessagePack.
///
/// The `.mpk` extension is applied to `path`. Returns the written path.
///
/// # Errors
///
/// Returns [`CheckpointError::Save`] if the file cannot be written.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<PathBuf>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref().with_extension("mpk");
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
        .record(model.clone().into_record(), path.clone())
        .map_err(|e| CheckpointError::Save(e.to_string()))?;

    tracing::info!(path = %path.display(), "Saved checkpoint");
    Ok(path)
}

/// Checkpoint metadata, stored as JSON next to a converted checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Model configuration.
    pub config: EfficientNetConfig,
    /// Class names in classifier output order.
    pub labels: Vec<String>,
    /// File the weights were converted from.
    pub source: Option<String>,
}

impl CheckpointMetadata {
    /// Create new metadata for a model.
    pub fn new(arch: impl Into<String>, config: EfficientNetConfig) -> Self {
        Self {
            arch: arch.into(),
            config,
            labels: Vec::new(),
            source: None,
        }
    }

    /// Set the class names.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the source checkpoint.
    #[must_use]
    pub fn with_source(mut self, source: impl AsRef<Path>) -> Self {
        self.source = Some(source.as_ref().display().to_string());
        self
    }

    /// Sidecar path for a checkpoint, e.g. `model.mpk` -> `model.json`.
    pub fn sidecar_path(checkpoint: impl AsRef<Path>) -> PathBuf {
        checkpoint.as_ref().with_extension("json")
    }

    /// Read the sidecar of a Named MessagePack checkpoint, if there is one.
    ///
    /// Other formats carry no sidecar and always yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Load`] if a sidecar exists but cannot be
    /// parsed.
    pub fn for_checkpoint(checkpoint: impl AsRef<Path>) -> Result<Option<Self>> {
        let checkpoint = checkpoint.as_ref();
        if !matches!(
            CheckpointFormat::from_path(checkpoint),
            Ok(CheckpointFormat::NamedMessagePack)
        ) {
            return Ok(None);
        }

        let sidecar = Self::sidecar_path(checkpoint);
        if !sidecar.is_file() {
            return Ok(None);
        }
        Self::load(&sidecar).map(Some)
    }

    /// Verify the recorded class names match `labels` in order.
    ///
    /// Metadata without class names accepts any label set.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::LabelMismatch`] if the names differ.
    pub fn check_labels(&self, labels: &LabelSet) -> Result<()> {
        if self.labels.is_empty() || labels.iter().eq(self.labels.iter().map(String::as_str)) {
            return Ok(());
        }
        Err(CheckpointError::LabelMismatch {
            configured: labels.iter().map(str::to_string).collect(),
            checkpoint: self.labels.clone(),
        })
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))
    }
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Checkpoint file missing.
    #[error("Checkpoint not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Invalid format.
    #[error("Invalid checkpoint format: {0}")]
    InvalidFormat(String),

    /// Configured class names differ from those the checkpoint was saved with.
    #[error("Checkpoint was saved with labels {checkpoint:?}, configured labels are {configured:?}")]
    LabelMismatch {
        /// Labels of the pipeline configuration.
        configured: Vec<String>,
        /// Labels recorded next to the checkpoint.
        checkpoint: Vec<String>,
    },

    /// Weights do not fit the configured architecture.
    #[error("Incompatible checkpoint: {what} expected {expected}, got {got}")]
    IncompatibleArchitecture {
        /// Mismatching part of the model.
        what: String,
        /// Shape required by the configuration.
        expected: String,
        /// Shape found in the checkpoint.
        got: String,
    },
}
