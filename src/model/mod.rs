mod conv_block;
mod googlenet;
mod inception;
mod summary;

pub use conv_block::{ConvBlock, ConvBlockConfig, ConvSpec, Normalization};
pub use googlenet::{
    B1, B2, B3, B4, B5, ConvStage, ConvStageConfig, GoogleNet, GoogleNetConfig, HEAD_DROPOUT,
    InceptionStage, InceptionStageConfig, downsample_pool, downsample_size,
};
pub use inception::{Inception, InceptionConfig, InceptionSpec};
pub use summary::{LayerSummary, ModelSummary};
