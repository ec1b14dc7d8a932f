//! GoogleNet: two convolutional stages, three stages of [`Inception`] blocks
//! and a linear classifier head.

use crate::model::conv_block::{ConvBlock, ConvBlockConfig, ConvSpec, Normalization};
use crate::model::inception::{Inception, InceptionConfig, InceptionSpec};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::train::ClassificationOutput;

/// b1: `7x7/2` convolution.
pub const B1: [ConvSpec; 1] = [ConvSpec::new(64, 7, 2, 3)];

/// b2: `1x1` then `3x3` convolution.
pub const B2: [ConvSpec; 2] = [ConvSpec::pointwise(64), ConvSpec::new(192, 3, 1, 1)];

/// b3: 192 → 256 → 480 channels.
pub const B3: [InceptionSpec; 2] = [
    InceptionSpec::new(64, (96, 128), (16, 32), 32),
    InceptionSpec::new(128, (128, 192), (32, 96), 64),
];

/// b4: 480 → 512 → 512 → 512 → 528 → 832 channels.
pub const B4: [InceptionSpec; 5] = [
    InceptionSpec::new(192, (96, 208), (16, 48), 64),
    InceptionSpec::new(160, (112, 224), (24, 64), 64),
    InceptionSpec::new(128, (128, 256), (24, 64), 64),
    InceptionSpec::new(112, (144, 288), (32, 64), 64),
    InceptionSpec::new(256, (160, 320), (32, 128), 128),
];

/// b5: 832 → 832 → 1024 channels.
pub const B5: [InceptionSpec; 2] = [
    InceptionSpec::new(256, (160, 320), (32, 128), 128),
    InceptionSpec::new(384, (192, 384), (48, 128), 128),
];

/// Dropout probability of the classifier head, when enabled.
pub const HEAD_DROPOUT: f64 = 0.4;

/// `3x3/2` max-pool closing stages b1 to b4.
pub fn downsample_pool() -> MaxPool2dConfig {
    MaxPool2dConfig::new([3, 3])
        .with_strides([2, 2])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
}

/// Spatial size after [`downsample_pool`].
pub fn downsample_size(size: usize) -> usize {
    (size + 2 - 3) / 2 + 1
}

#[derive(Config, Debug)]
pub struct ConvStageConfig {
    pub in_channels: usize,
    pub convs: Vec<ConvSpec>,
    #[config(default = "Normalization::None")]
    pub normalization: Normalization,
}

impl ConvStageConfig {
    pub fn out_channels(&self) -> usize {
        self.convs
            .last()
            .map(|spec| spec.out_channels)
            .unwrap_or(self.in_channels)
    }

    /// Each convolution as its block config, channels chained.
    pub fn blocks(&self) -> Vec<ConvBlockConfig> {
        let mut in_channels = self.in_channels;
        self.convs
            .iter()
            .map(|spec| {
                let block = ConvBlockConfig::from_spec(in_channels, *spec, self.normalization);
                in_channels = spec.out_channels;
                block
            })
            .collect()
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvStage<B> {
        ConvStage {
            convs: self.blocks().iter().map(|b| b.init(device)).collect(),
            pool: downsample_pool().init(),
        }
    }
}

/// Convolution blocks followed by a downsampling max-pool.
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    pub convs: Vec<ConvBlock<B>>,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvStage<B> {
    pub fn forward(&self, mut x: Tensor<B, 4>) -> Tensor<B, 4> {
        for conv in &self.convs {
            x = conv.forward(x);
        }
        self.pool.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct InceptionStageConfig {
    pub in_channels: usize,
    pub blocks: Vec<InceptionSpec>,
    /// Whether the stage ends with a downsampling max-pool.
    #[config(default = true)]
    pub downsample: bool,
    #[config(default = "Normalization::None")]
    pub normalization: Normalization,
}

impl InceptionStageConfig {
    pub fn out_channels(&self) -> usize {
        self.blocks
            .last()
            .map(|spec| spec.out_channels())
            .unwrap_or(self.in_channels)
    }

    /// Each block as its config, channels chained.
    pub fn inceptions(&self) -> Vec<InceptionConfig> {
        let mut in_channels = self.in_channels;
        self.blocks
            .iter()
            .map(|spec| {
                let config = InceptionConfig::new(in_channels, *spec)
                    .with_normalization(self.normalization);
                in_channels = spec.out_channels();
                config
            })
            .collect()
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> InceptionStage<B> {
        InceptionStage {
            blocks: self.inceptions().iter().map(|c| c.init(device)).collect(),
            pool: self.downsample.then(|| downsample_pool().init()),
        }
    }
}

#[derive(Module, Debug)]
pub struct InceptionStage<B: Backend> {
    pub blocks: Vec<Inception<B>>,
    pub pool: Option<MaxPool2d>,
}

impl<B: Backend> InceptionStage<B> {
    pub fn forward(&self, mut x: Tensor<B, 4>) -> Tensor<B, 4> {
        for block in &self.blocks {
            x = block.forward(x);
        }
        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }
}

#[derive(Config, Debug)]
pub struct GoogleNetConfig {
    /// Image channels.
    #[config(default = 3)]
    pub in_channels: usize,

    #[config(default = 10)]
    pub num_classes: usize,

    /// Normalization inserted after every convolution.
    #[config(default = "Normalization::None")]
    pub normalization: Normalization,

    /// Dropout probability before the classifier, if any.
    #[config(default = "None")]
    pub dropout: Option<f64>,
}

impl GoogleNetConfig {
    pub fn b1(&self) -> ConvStageConfig {
        ConvStageConfig::new(self.in_channels, B1.to_vec()).with_normalization(self.normalization)
    }

    pub fn b2(&self) -> ConvStageConfig {
        ConvStageConfig::new(self.b1().out_channels(), B2.to_vec())
            .with_normalization(self.normalization)
    }

    pub fn b3(&self) -> InceptionStageConfig {
        InceptionStageConfig::new(self.b2().out_channels(), B3.to_vec())
            .with_normalization(self.normalization)
    }

    pub fn b4(&self) -> InceptionStageConfig {
        InceptionStageConfig::new(self.b3().out_channels(), B4.to_vec())
            .with_normalization(self.normalization)
    }

    /// The last stage keeps its spatial size; the head pools it globally.
    pub fn b5(&self) -> InceptionStageConfig {
        InceptionStageConfig::new(self.b4().out_channels(), B5.to_vec())
            .with_downsample(false)
            .with_normalization(self.normalization)
    }

    /// Features entering the classifier.
    pub fn features(&self) -> usize {
        self.b5().out_channels()
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> GoogleNet<B> {
        GoogleNet {
            b1: self.b1().init(device),
            b2: self.b2().init(device),
            b3: self.b3().init(device),
            b4: self.b4().init(device),
            b5: self.b5().init(device),
            avg_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: self.dropout.map(|prob| DropoutConfig::new(prob).init()),
            head: LinearConfig::new(self.features(), self.num_classes).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct GoogleNet<B: Backend> {
    pub b1: ConvStage<B>,
    pub b2: ConvStage<B>,
    pub b3: InceptionStage<B>,
    pub b4: InceptionStage<B>,
    pub b5: InceptionStage<B>,
    pub avg_pool: AdaptiveAvgPool2d,
    pub dropout: Option<Dropout>,
    pub head: Linear<B>,
}

impl<B: Backend> GoogleNet<B> {
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, _channels, _height, _width] = images.dims();
        let [features, num_classes] = self.head.weight.dims();

        let x = self.b1.forward(images);
        let x = self.b2.forward(x);
        let x = self.b3.forward(x);
        let x = self.b4.forward(x);
        let x = self.b5.forward(x);

        let x = self.avg_pool.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        debug_assert_eq!([batch, features], x.dims());

        let x = match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        };
        let logits = self.head.forward(x);
        debug_assert_eq!([batch, num_classes], logits.dims());

        logits
    }

    /// Logits and cross-entropy loss against `targets`.
    ///
    /// # Shapes
    ///   - images [batch, in_channels, height, width]
    ///   - targets [batch]
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = burn::nn::loss::CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}
