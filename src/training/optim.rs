use crate::error::{Error, Result};
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, RmsPropConfig, SgdConfig};
use burn::tensor::backend::AutodiffBackend;

/// Optimizers selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OptimizerKind {
    Sgd,
    /// SGD with a momentum of [`MOMENTUM`].
    Momentum,
    RmsProp,
    Adam,
}

pub const MOMENTUM: f64 = 0.9;

impl OptimizerKind {
    /// Maps the command-line code (0: SGD, 1: Momentum, 2: RMSProp, 4: Adam).
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(OptimizerKind::Sgd),
            1 => Ok(OptimizerKind::Momentum),
            2 => Ok(OptimizerKind::RmsProp),
            4 => Ok(OptimizerKind::Adam),
            other => Err(Error::UnknownOptimizer(other)),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            OptimizerKind::Sgd => 0,
            OptimizerKind::Momentum => 1,
            OptimizerKind::RmsProp => 2,
            OptimizerKind::Adam => 4,
        }
    }

    /// Initializes the optimizer, with weight decay when `weight_decay > 0`.
    pub fn init<AutoB, AutoM>(&self, weight_decay: f64) -> BoxedOptimizer<AutoB, AutoM>
    where
        AutoB: AutodiffBackend,
        AutoM: AutodiffModule<AutoB> + 'static,
    {
        let decay = (weight_decay > 0.).then(|| WeightDecayConfig::new(weight_decay as f32));
        match self {
            OptimizerKind::Sgd => Box::new(
                SgdConfig::new()
                    .with_weight_decay(decay)
                    .init::<AutoB, AutoM>(),
            ),
            OptimizerKind::Momentum => Box::new(
                SgdConfig::new()
                    .with_momentum(Some(MomentumConfig::new().with_momentum(MOMENTUM)))
                    .with_weight_decay(decay)
                    .init::<AutoB, AutoM>(),
            ),
            OptimizerKind::RmsProp => Box::new(
                RmsPropConfig::new()
                    .with_weight_decay(decay)
                    .init::<AutoB, AutoM>(),
            ),
            OptimizerKind::Adam => Box::new(
                AdamConfig::new()
                    .with_weight_decay(decay)
                    .init::<AutoB, AutoM>(),
            ),
        }
    }
}

/// Object-safe view of an [`Optimizer`], so that the kind can be picked at runtime.
pub trait ModelOptimizer<AutoB, AutoM>: Send
where
    AutoB: AutodiffBackend,
    AutoM: AutodiffModule<AutoB>,
{
    fn step(&mut self, lr: f64, module: AutoM, grads: GradientsParams) -> AutoM;
}

impl<AutoB, AutoM, O> ModelOptimizer<AutoB, AutoM> for O
where
    AutoB: AutodiffBackend,
    AutoM: AutodiffModule<AutoB>,
    O: Optimizer<AutoM, AutoB>,
{
    fn step(&mut self, lr: f64, module: AutoM, grads: GradientsParams) -> AutoM {
        Optimizer::step(self, lr, module, grads)
    }
}

pub type BoxedOptimizer<AutoB, AutoM> = Box<dyn ModelOptimizer<AutoB, AutoM>>;
