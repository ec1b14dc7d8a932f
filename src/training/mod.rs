mod config;
mod early_stopping;
mod optim;
mod trainer;
pub mod tracking;

pub use config::TrainingConfig;
pub use early_stopping::{EarlyStopping, EarlyStoppingCheck};
pub use optim::{BoxedOptimizer, MOMENTUM, ModelOptimizer, OptimizerKind};
pub use trainer::{
    ClassificationTrainer, Dataloader, EpochStats, ImageClassifier, TrainingReport,
    epochs_per_second, format_elapsed, latest_checkpoint_name,
};
