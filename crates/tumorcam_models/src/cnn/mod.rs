//! CNN image classifiers.

mod efficientnet;

pub use efficientnet::{
    ConvBn, EfficientNet, EfficientNetConfig, EfficientNetRecord, MbConv, SqueezeExcitation,
    StageConfig, B0_STAGES,
};
