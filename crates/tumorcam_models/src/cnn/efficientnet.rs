//! EfficientNet-B0 architecture.
//!
//! Layer layout and hyper-parameters follow torchvision's `efficientnet_b0`
//! so that its state dicts load without conversion beyond key renaming:
//! a 3x3 stem, seven stages of MBConv blocks (expand, depthwise,
//! squeeze-excitation, project), a 1x1 head convolution to 1280 channels,
//! global average pooling and a linear classifier.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, silu, softmax};
use serde::{Deserialize, Serialize};

/// One stage of identical MBConv blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Channel multiplier of the expansion convolution (1 disables it).
    pub expand_ratio: usize,
    /// Kernel size of the depthwise convolution.
    pub kernel_size: usize,
    /// Stride of the first block in the stage.
    pub stride: usize,
    /// Input channels of the first block.
    pub in_channels: usize,
    /// Output channels of every block.
    pub out_channels: usize,
    /// Number of blocks.
    pub num_layers: usize,
}

impl StageConfig {
    const fn new(
        expand_ratio: usize,
        kernel_size: usize,
        stride: usize,
        in_channels: usize,
        out_channels: usize,
        num_layers: usize,
    ) -> Self {
        Self {
            expand_ratio,
            kernel_size,
            stride,
            in_channels,
            out_channels,
            num_layers,
        }
    }
}

/// Stage table of EfficientNet-B0 (width and depth multipliers 1.0).
pub const B0_STAGES: [StageConfig; 7] = [
    StageConfig::new(1, 3, 1, 32, 16, 1),
    StageConfig::new(6, 3, 2, 16, 24, 2),
    StageConfig::new(6, 5, 2, 24, 40, 2),
    StageConfig::new(6, 3, 2, 40, 80, 3),
    StageConfig::new(6, 5, 1, 80, 112, 3),
    StageConfig::new(6, 5, 2, 112, 192, 4),
    StageConfig::new(6, 3, 1, 192, 320, 1),
];

/// Configuration for the EfficientNet model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficientNetConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Channels produced by the stem convolution.
    pub stem_channels: usize,
    /// MBConv stages.
    pub stages: Vec<StageConfig>,
    /// Channels of the last feature layer.
    pub feature_channels: usize,
    /// Batch norm epsilon.
    pub norm_eps: f64,
}

impl Default for EfficientNetConfig {
    fn default() -> Self {
        Self::b0(4)
    }
}

impl EfficientNetConfig {
    /// EfficientNet-B0 with a fresh `n_classes` head.
    pub fn b0(n_classes: usize) -> Self {
        Self {
            in_channels: 3,
            n_classes,
            stem_channels: 32,
            stages: B0_STAGES.to_vec(),
            feature_channels: 1280,
            norm_eps: 1e-5,
        }
    }

    /// Total number of MBConv blocks.
    pub fn num_blocks(&self) -> usize {
        self.stages.iter().map(|s| s.num_layers).sum()
    }

    /// Channels entering the head convolution.
    pub fn last_stage_channels(&self) -> usize {
        self.stages
            .last()
            .map_or(self.stem_channels, |s| s.out_channels)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> EfficientNet<B> {
        EfficientNet::new(self.clone(), device)
    }
}

/// Convolution followed by batch norm, no activation.
#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    fn new(
        channels: [usize; 2],
        kernel_size: usize,
        stride: usize,
        groups: usize,
        norm_eps: f64,
        device: &B::Device,
    ) -> Self {
        let padding = (kernel_size - 1) / 2;
        let conv = Conv2dConfig::new(channels, [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_groups(groups)
            .with_bias(false)
            .init(device);
        let norm = BatchNormConfig::new(channels[1])
            .with_epsilon(norm_eps)
            .init(device);

        Self { conv, norm }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.norm.forward(self.conv.forward(x))
    }
}

/// Squeeze-and-excitation channel gating.
#[derive(Module, Debug)]
pub struct SqueezeExcitation<B: Backend> {
    pool: AdaptiveAvgPool2d,
    fc1: Conv2d<B>,
    fc2: Conv2d<B>,
}

impl<B: Backend> SqueezeExcitation<B> {
    fn new(channels: usize, squeeze_channels: usize, device: &B::Device) -> Self {
        Self {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: Conv2dConfig::new([channels, squeeze_channels], [1, 1]).init(device),
            fc2: Conv2dConfig::new([squeeze_channels, channels], [1, 1]).init(device),
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let scale = self.pool.forward(x.clone());
        let scale = silu(self.fc1.forward(scale));
        let scale = sigmoid(self.fc2.forward(scale));
        x * scale
    }
}

/// Inverted residual block with squeeze-excitation.
#[derive(Module, Debug)]
pub struct MbConv<B: Backend> {
    expand: Option<ConvBn<B>>,
    depthwise: ConvBn<B>,
    se: SqueezeExcitation<B>,
    project: ConvBn<B>,
    use_residual: bool,
}

impl<B: Backend> MbConv<B> {
    fn new(
        in_channels: usize,
        out_channels: usize,
        expand_ratio: usize,
        kernel_size: usize,
        stride: usize,
        norm_eps: f64,
        device: &B::Device,
    ) -> Self {
        let expanded = in_channels * expand_ratio;
        let expand = (expanded != in_channels)
            .then(|| ConvBn::new([in_channels, expanded], 1, 1, 1, norm_eps, device));
        let depthwise = ConvBn::new(
            [expanded, expanded],
            kernel_size,
            stride,
            expanded,
            norm_eps,
            device,
        );
        let se = SqueezeExcitation::new(expanded, (in_channels / 4).max(1), device);
        let project = ConvBn::new([expanded, out_channels], 1, 1, 1, norm_eps, device);

        Self {
            expand,
            depthwise,
            se,
            project,
            use_residual: stride == 1 && in_channels == out_channels,
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = x.clone();
        if let Some(expand) = &self.expand {
            out = silu(expand.forward(out));
        }
        let out = silu(self.depthwise.forward(out));
        let out = self.se.forward(out);
        let out = self.project.forward(out);

        // Stochastic depth is the identity at inference.
        if self.use_residual {
            out + x
        } else {
            out
        }
    }
}

/// EfficientNet image classifier.
#[derive(Module, Debug)]
pub struct EfficientNet<B: Backend> {
    stem: ConvBn<B>,
    blocks: Vec<MbConv<B>>,
    head: ConvBn<B>,
    pool: AdaptiveAvgPool2d,
    classifier: Linear<B>,
}

impl<B: Backend> EfficientNet<B> {
    /// Create a new model with freshly initialized weights.
    pub fn new(config: EfficientNetConfig, device: &B::Device) -> Self {
        let stem = ConvBn::new(
            [config.in_channels, config.stem_channels],
            3,
            2,
            1,
            config.norm_eps,
            device,
        );

        let mut blocks = Vec::with_capacity(config.num_blocks());
        for stage in &config.stages {
            for layer in 0..stage.num_layers {
                let (in_channels, stride) = if layer == 0 {
                    (stage.in_channels, stage.stride)
                } else {
                    (stage.out_channels, 1)
                };
                blocks.push(MbConv::new(
                    in_channels,
                    stage.out_channels,
                    stage.expand_ratio,
                    stage.kernel_size,
                    stride,
                    config.norm_eps,
                    device,
                ));
            }
        }

        let head = ConvBn::new(
            [config.last_stage_channels(), config.feature_channels],
            1,
            1,
            1,
            config.norm_eps,
            device,
        );
        let pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let classifier = LinearConfig::new(config.feature_channels, config.n_classes).init(device);

        Self {
            stem,
            blocks,
            head,
            pool,
            classifier,
        }
    }

    /// Output of the last feature layer, shape `(batch, 1280, H/32, W/32)`.
    ///
    /// This is the layer Grad-CAM attributes over.
    pub fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = silu(self.stem.forward(x));
        for block in &self.blocks {
            out = block.forward(out);
        }
        silu(self.head.forward(out))
    }

    /// Pool feature maps and apply the linear head, returning logits.
    pub fn classify(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let pooled = self.pool.forward(features);
        let [batch, channels, _, _] = pooled.dims();
        self.classifier.forward(pooled.reshape([batch, channels]))
    }

    /// Forward pass returning logits.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.classify(self.features(x))
    }

    /// Forward pass returning probabilities.
    pub fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    /// Number of classifier outputs.
    pub fn n_classes(&self) -> usize {
        self.classifier.weight.val().dims()[1]
    }

    /// Replace the classification head, e.g. to fine-tune for new classes.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Linear<B>) -> Self {
        self.classifier = classifier;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::Param;
    use tumorcam_core::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_b0_config() {
        let config = EfficientNetConfig::b0(4);
        assert_eq!(config.num_blocks(), 16);
        assert_eq!(config.last_stage_channels(), 320);
        assert_eq!(config.feature_channels, 1280);
        assert_eq!(EfficientNetConfig::default(), config);
    }

    #[test]
    fn test_block_structure() {
        let device = Default::default();
        let model = EfficientNetConfig::b0(4).init::<TestBackend>(&device);

        assert_eq!(model.blocks.len(), 16);
        // The first stage has expand ratio 1 and no expansion convolution.
        assert!(model.blocks[0].expand.is_none());
        assert!(model.blocks[1].expand.is_some());
        // Residual only for stride 1 blocks that keep the channel count.
        assert!(!model.blocks[1].use_residual);
        assert!(model.blocks[2].use_residual);
    }

    #[test]
    fn test_feature_and_logit_shapes() {
        let device = Default::default();
        let model = EfficientNetConfig::b0(4).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);

        let features = model.features(x.clone());
        assert_eq!(features.dims(), [1, 1280, 2, 2]);

        let logits = model.forward(x);
        assert_eq!(logits.dims(), [1, 4]);
        assert_eq!(model.n_classes(), 4);
    }

    #[test]
    fn test_forward_probs_sum_to_one() {
        let device = Default::default();
        let model = EfficientNetConfig::b0(3).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);

        let probs = model.forward_probs(x);
        let sum: f32 = probs.sum().into_scalar().elem();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_with_classifier() {
        let device = Default::default();
        let model = EfficientNetConfig::b0(4).init::<TestBackend>(&device);

        let weight = Tensor::<TestBackend, 2>::zeros([1280, 2], &device);
        let head = Linear {
            weight: Param::from_tensor(weight),
            bias: None,
        };
        let model = model.with_classifier(head);
        assert_eq!(model.n_classes(), 2);
    }
}
