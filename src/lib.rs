pub mod artifacts;
pub mod backend;
pub mod cli;
pub mod data;
pub mod driver;
pub mod error;
pub mod model;
pub mod training;

pub mod prelude {
    pub use crate::artifacts::Artifacts;
    pub use crate::cli::AppArgs;
    pub use crate::data::{Cifar10Batch, Cifar10Batcher, Cifar10Dataset};
    pub use crate::error::{Error, Result};
    pub use crate::model::{GoogleNet, GoogleNetConfig, Normalization};
    pub use crate::training::{ClassificationTrainer, OptimizerKind, TrainingConfig};
}
