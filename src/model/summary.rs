//! Layer-by-layer summary of a [`GoogleNetConfig`], derived by shape
//! arithmetic instead of a forward pass.

use crate::model::conv_block::{ConvBlockConfig, ConvSpec};
use crate::model::googlenet::{
    ConvStageConfig, GoogleNetConfig, InceptionStageConfig, downsample_size,
};
use crate::model::inception::InceptionConfig;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    /// Dotted path, e.g. `b3.inception1`.
    pub name: String,
    /// Square kernel size, for single-kernel layers.
    pub kernel_size: Option<usize>,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    pub num_params: usize,
    /// Multiply-accumulate operations, biases excluded.
    pub mult_adds: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSummary {
    pub layers: Vec<LayerSummary>,
}

impl ModelSummary {
    pub fn total_params(&self) -> usize {
        self.layers.iter().map(|l| l.num_params).sum()
    }

    pub fn total_mult_adds(&self) -> usize {
        self.layers.iter().map(|l| l.mult_adds).sum()
    }

    pub fn output_shape(&self) -> Option<&[usize]> {
        self.layers.last().map(|l| l.output_shape.as_slice())
    }
}

/// Walks the stages while tracking the `[batch, channels, height, width]` shape.
struct Walker {
    shape: [usize; 4],
    layers: Vec<LayerSummary>,
}

impl Walker {
    fn push(
        &mut self,
        name: String,
        kernel_size: Option<usize>,
        output: Vec<usize>,
        num_params: usize,
        mult_adds: usize,
    ) {
        let input_shape = self.shape.to_vec();
        if let [b, c, h, w] = output[..] {
            self.shape = [b, c, h, w];
        }
        self.layers.push(LayerSummary {
            name,
            kernel_size,
            input_shape,
            output_shape: output,
            num_params,
            mult_adds,
        });
    }

    fn conv(&mut self, name: String, block: &ConvBlockConfig) {
        let [b, _c, h, w] = self.shape;
        let spec = ConvSpec::new(block.out_channels, block.kernel_size, block.stride, block.padding);
        let (oh, ow) = (spec.output_size(h), spec.output_size(w));
        let mult_adds = conv_mult_adds(block, b * oh * ow);
        self.push(
            name,
            Some(block.kernel_size),
            vec![b, block.out_channels, oh, ow],
            block.num_params(),
            mult_adds,
        );
    }

    fn inception(&mut self, name: String, config: &InceptionConfig) {
        let [b, _c, h, w] = self.shape;
        let mult_adds = config
            .convs()
            .iter()
            .map(|(in_channels, spec)| {
                let block = ConvBlockConfig::from_spec(*in_channels, *spec, config.normalization);
                conv_mult_adds(&block, b * h * w)
            })
            .sum();
        self.push(
            name,
            None,
            vec![b, config.out_channels(), h, w],
            config.num_params(),
            mult_adds,
        );
    }

    fn max_pool(&mut self, name: String) {
        let [b, c, h, w] = self.shape;
        self.push(name, Some(3), vec![b, c, downsample_size(h), downsample_size(w)], 0, 0);
    }

    fn conv_stage(&mut self, stage: &str, config: &ConvStageConfig) {
        for (i, block) in config.blocks().iter().enumerate() {
            self.conv(format!("{stage}.conv{i}"), block);
        }
        self.max_pool(format!("{stage}.pool"));
    }

    fn inception_stage(&mut self, stage: &str, config: &InceptionStageConfig) {
        for (i, inception) in config.inceptions().iter().enumerate() {
            self.inception(format!("{stage}.inception{i}"), inception);
        }
        if config.downsample {
            self.max_pool(format!("{stage}.pool"));
        }
    }
}

/// `output_pixels` spans the whole batch.
fn conv_mult_adds(block: &ConvBlockConfig, output_pixels: usize) -> usize {
    output_pixels * block.out_channels * block.in_channels * block.kernel_size * block.kernel_size
}

impl GoogleNetConfig {
    /// Summary for an input of shape `[batch, in_channels, height, width]`.
    pub fn summary(&self, input_shape: [usize; 4]) -> ModelSummary {
        let mut walker = Walker {
            shape: input_shape,
            layers: vec![],
        };
        walker.conv_stage("b1", &self.b1());
        walker.conv_stage("b2", &self.b2());
        walker.inception_stage("b3", &self.b3());
        walker.inception_stage("b4", &self.b4());
        walker.inception_stage("b5", &self.b5());

        let [b, c, _h, _w] = walker.shape;
        walker.push("b5.avg_pool".into(), None, vec![b, c, 1, 1], 0, 0);
        let avg_pooled = walker.layers.last().map(|l| l.output_shape.clone());

        // flatten + linear
        let features = self.features();
        walker.layers.push(LayerSummary {
            name: "head".into(),
            kernel_size: None,
            input_shape: avg_pooled.unwrap_or_default(),
            output_shape: vec![b, self.num_classes],
            num_params: features * self.num_classes + self.num_classes,
            mult_adds: b * features * self.num_classes,
        });

        ModelSummary {
            layers: walker.layers,
        }
    }
}

fn shape(dims: &[usize]) -> String {
    let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
    format!("[{}]", dims.join(", "))
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(104);
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "{:<18} {:>8} {:>20} {:>20} {:>14} {:>18}",
            "Layer", "Kernel", "Input Shape", "Output Shape", "Param #", "Mult-Adds"
        )?;
        writeln!(f, "{rule}")?;
        for layer in &self.layers {
            let kernel = layer
                .kernel_size
                .map(|k| format!("[{k}, {k}]"))
                .unwrap_or_else(|| "--".into());
            writeln!(
                f,
                "{:<18} {:>8} {:>20} {:>20} {:>14} {:>18}",
                layer.name,
                kernel,
                shape(&layer.input_shape),
                shape(&layer.output_shape),
                layer.num_params,
                layer.mult_adds,
            )?;
        }
        writeln!(f, "{rule}")?;
        writeln!(f, "Total params: {}", self.total_params())?;
        writeln!(f, "Total mult-adds: {}", self.total_mult_adds())?;
        write!(f, "{rule}")
    }
}
