use crate::model::conv_block::{ConvBlock, ConvBlockConfig, ConvSpec, Normalization};
use burn::nn::PaddingConfig2d;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::*;

/// Channel widths of an [`Inception`] block.
///
/// `c2` and `c3` are `(reduction, output)` pairs: a `1x1` reduction followed
/// by the `3x3` (resp. `5x5`) convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InceptionSpec {
    pub c1: usize,
    pub c2: (usize, usize),
    pub c3: (usize, usize),
    pub c4: usize,
}

impl InceptionSpec {
    pub const fn new(c1: usize, c2: (usize, usize), c3: (usize, usize), c4: usize) -> Self {
        Self { c1, c2, c3, c4 }
    }

    /// Concatenated channels of the four branches.
    pub const fn out_channels(&self) -> usize {
        self.c1 + self.c2.1 + self.c3.1 + self.c4
    }
}

#[derive(Config, Debug)]
pub struct InceptionConfig {
    pub in_channels: usize,
    pub spec: InceptionSpec,
    #[config(default = "Normalization::None")]
    pub normalization: Normalization,
}

impl InceptionConfig {
    pub fn out_channels(&self) -> usize {
        self.spec.out_channels()
    }

    /// The six convolutions of the block as `(input channels, spec)`, in
    /// branch order.
    pub fn convs(&self) -> [(usize, ConvSpec); 6] {
        let InceptionSpec { c1, c2, c3, c4 } = self.spec;
        let i = self.in_channels;
        [
            (i, ConvSpec::pointwise(c1)),
            (i, ConvSpec::pointwise(c2.0)),
            (c2.0, ConvSpec::new(c2.1, 3, 1, 1)),
            (i, ConvSpec::pointwise(c3.0)),
            (c3.0, ConvSpec::new(c3.1, 5, 1, 2)),
            (i, ConvSpec::pointwise(c4)),
        ]
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Inception<B> {
        let [b1_1, b2_1, b2_2, b3_1, b3_2, b4_2] = self
            .convs()
            .map(|(in_channels, spec)| {
                ConvBlockConfig::from_spec(in_channels, spec, self.normalization).init(device)
            });
        let b4_1 = MaxPool2dConfig::new([3, 3])
            .with_strides([1, 1])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        Inception {
            b1_1,
            b2_1,
            b2_2,
            b3_1,
            b3_2,
            b4_1,
            b4_2,
        }
    }

    pub fn num_params(&self) -> usize {
        self.convs()
            .iter()
            .map(|(in_channels, spec)| {
                ConvBlockConfig::from_spec(*in_channels, *spec, self.normalization).num_params()
            })
            .sum()
    }
}

/// Four parallel paths over the same input, concatenated along channels.
///
/// - b1: `1x1`.
/// - b2: `1x1` → `3x3`.
/// - b3: `1x1` → `5x5`.
/// - b4: `3x3` max-pool → `1x1`.
///
/// Every path keeps the spatial size.
#[derive(Module, Debug)]
pub struct Inception<B: Backend> {
    pub b1_1: ConvBlock<B>,
    pub b2_1: ConvBlock<B>,
    pub b2_2: ConvBlock<B>,
    pub b3_1: ConvBlock<B>,
    pub b3_2: ConvBlock<B>,
    pub b4_1: MaxPool2d,
    pub b4_2: ConvBlock<B>,
}

impl<B: Backend> Inception<B> {
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, c1 + c2.1 + c3.1 + c4, height, width]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, _in_channels, height, width] = x.dims();

        let b1 = self.b1_1.forward(x.clone());
        let b2 = self.b2_2.forward(self.b2_1.forward(x.clone()));
        let b3 = self.b3_2.forward(self.b3_1.forward(x.clone()));
        let b4 = self.b4_2.forward(self.b4_1.forward(x));

        let out = Tensor::cat(vec![b1, b2, b3, b4], 1);
        debug_assert_eq!([batch, height, width], {
            let [b, _c, h, w] = out.dims();
            [b, h, w]
        });
        out
    }
}
