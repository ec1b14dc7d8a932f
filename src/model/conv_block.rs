use crate::error::Error;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, GroupNorm, GroupNormConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Normalization applied between a convolution and its activation.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Normalization {
    #[default]
    None,
    /// Per-channel normalization over the batch.
    BatchNorm,
    /// Per-sample normalization over (channels, height, width).
    ///
    /// Implemented as a single-group [`GroupNorm`].
    LayerNorm,
}

impl Normalization {
    /// Maps the command-line code (0: none, 1: BatchNorm, 2: LayerNorm).
    pub fn from_code(code: u8) -> crate::error::Result<Self> {
        match code {
            0 => Ok(Normalization::None),
            1 => Ok(Normalization::BatchNorm),
            2 => Ok(Normalization::LayerNorm),
            other => Err(Error::UnknownNormalization(other)),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Normalization::None => 0,
            Normalization::BatchNorm => 1,
            Normalization::LayerNorm => 2,
        }
    }

    /// Parameters added for `channels` feature maps, as counted by [`Module::num_params`].
    pub fn num_params(&self, channels: usize) -> usize {
        match self {
            Normalization::None => 0,
            // gamma, beta, running mean and running variance
            Normalization::BatchNorm => 4 * channels,
            // gamma and beta
            Normalization::LayerNorm => 2 * channels,
        }
    }
}

/// A single convolution layer declaration, without its input channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConvSpec {
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
}

impl ConvSpec {
    pub const fn new(out_channels: usize, kernel_size: usize, stride: usize, padding: usize) -> Self {
        Self {
            out_channels,
            kernel_size,
            stride,
            padding,
        }
    }

    /// A `1x1` convolution with unit stride.
    pub const fn pointwise(out_channels: usize) -> Self {
        Self::new(out_channels, 1, 1, 0)
    }

    /// Output spatial size for an input of spatial size `size`.
    pub fn output_size(&self, size: usize) -> usize {
        (size + 2 * self.padding - self.kernel_size) / self.stride + 1
    }
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    #[config(default = 1)]
    pub kernel_size: usize,
    #[config(default = 1)]
    pub stride: usize,
    #[config(default = 0)]
    pub padding: usize,
    #[config(default = "Normalization::None")]
    pub normalization: Normalization,
}

impl ConvBlockConfig {
    pub fn from_spec(in_channels: usize, spec: ConvSpec, normalization: Normalization) -> Self {
        Self::new(in_channels, spec.out_channels)
            .with_kernel_size(spec.kernel_size)
            .with_stride(spec.stride)
            .with_padding(spec.padding)
            .with_normalization(normalization)
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        let conv = Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_padding(PaddingConfig2d::Valid)
        .with_bias(true)
        .init(device);

        let (batch_norm, layer_norm) = match self.normalization {
            Normalization::None => (None, None),
            Normalization::BatchNorm => {
                (Some(BatchNormConfig::new(self.out_channels).init(device)), None)
            }
            Normalization::LayerNorm => (
                None,
                Some(GroupNormConfig::new(1, self.out_channels).init(device)),
            ),
        };

        ConvBlock {
            conv,
            padding: self.padding,
            batch_norm,
            layer_norm,
        }
    }

    /// Parameters of the block, convolution bias and normalization statistics included.
    pub fn num_params(&self) -> usize {
        let weights = self.in_channels * self.out_channels * self.kernel_size * self.kernel_size;
        weights + self.out_channels + self.normalization.num_params(self.out_channels)
    }
}

/// Convolution, optional normalization, then ReLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    /// Unpadded; see [`ConvBlock::padding`].
    pub conv: Conv2d<B>,
    /// Zeros added on every side of the input ahead of the convolution.
    pub padding: usize,
    pub batch_norm: Option<BatchNorm<B>>,
    pub layer_norm: Option<GroupNorm<B>>,
}

impl<B: Backend> ConvBlock<B> {
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, out_channels, height', width']
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        // the ndarray conv kernel mis-indexes maps smaller than their padding
        let x = match self.padding {
            0 => x,
            p => x.pad((p, p, p, p), 0.0),
        };
        let mut x = self.conv.forward(x);
        if let Some(norm) = &self.batch_norm {
            x = norm.forward(x);
        }
        if let Some(norm) = &self.layer_norm {
            x = norm.forward(x);
        }
        relu(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray<f32>;

    #[test]
    fn normalization_codes() {
        assert_eq!(Normalization::from_code(0).unwrap(), Normalization::None);
        assert_eq!(Normalization::from_code(1).unwrap(), Normalization::BatchNorm);
        assert_eq!(Normalization::from_code(2).unwrap(), Normalization::LayerNorm);
        assert!(matches!(
            Normalization::from_code(3),
            Err(Error::UnknownNormalization(3))
        ));
        for n in [
            Normalization::None,
            Normalization::BatchNorm,
            Normalization::LayerNorm,
        ] {
            assert_eq!(Normalization::from_code(n.code()).unwrap(), n);
        }
    }

    #[test]
    fn strided_conv_halves_the_image() {
        let spec = ConvSpec::new(64, 7, 2, 3);
        assert_eq!(spec.output_size(32), 16);
        assert_eq!(ConvSpec::pointwise(8).output_size(5), 5);
    }

    #[test]
    fn block_output_is_non_negative() {
        let device = Default::default();
        for normalization in [
            Normalization::None,
            Normalization::BatchNorm,
            Normalization::LayerNorm,
        ] {
            let config = ConvBlockConfig::from_spec(3, ConvSpec::new(4, 3, 1, 1), normalization);
            let block = config.init::<TestBackend>(&device);
            assert_eq!(block.num_params(), config.num_params());

            let x = Tensor::<TestBackend, 4>::random(
                [2, 3, 6, 6],
                burn::tensor::Distribution::Normal(0., 1.),
                &device,
            );
            let y = block.forward(x);
            assert_eq!(y.dims(), [2, 4, 6, 6]);
            let min = y.min().into_scalar();
            assert!(min >= 0.);
        }
    }

    #[test]
    fn batch_norm_statistics_are_counted() {
        assert_eq!(Normalization::BatchNorm.num_params(8), 32);
        assert_eq!(Normalization::LayerNorm.num_params(8), 16);
        assert_eq!(Normalization::None.num_params(8), 0);
    }

    #[test]
    fn padding_wider_than_the_map() {
        let device = Default::default();
        // 5x5 kernel with padding 2 over a single pixel
        let config = ConvBlockConfig::from_spec(32, ConvSpec::new(128, 5, 1, 2), Normalization::None);
        let block = config.init::<TestBackend>(&device);
        for batch in [1, 2] {
            let x = Tensor::<TestBackend, 4>::ones([batch, 32, 1, 1], &device);
            assert_eq!(block.forward(x).dims(), [batch, 128, 1, 1]);
        }
    }
}
