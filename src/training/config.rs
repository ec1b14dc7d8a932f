use crate::training::optim::OptimizerKind;
use burn::prelude::*;

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = 500)]
    pub epochs: usize,
    #[config(default = 2048)]
    pub batch_size: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Epochs between two validations; the first epoch is always validated.
    #[config(default = 10)]
    pub validation_intervals: usize,
    /// Epochs between two training-only log lines.
    #[config(default = 100)]
    pub print_epochs: usize,
    #[config(default = "OptimizerKind::Adam")]
    pub optimizer: OptimizerKind,
    #[config(default = 0.0)]
    pub weight_decay: f64,
    /// Validations without improvement before stopping.
    #[config(default = 10)]
    pub early_stop_patience: usize,
    /// Minimum decrease of the validation loss counted as an improvement.
    #[config(default = 1e-4)]
    pub early_stop_delta: f64,
    #[config(default = 0)]
    pub seed: u64,
    #[config(default = 2)]
    pub num_workers: usize,
    /// Whether the run is recorded by the experiment tracker.
    #[config(default = false)]
    pub wandb: bool,
}

impl TrainingConfig {
    pub fn is_validation_epoch(&self, epoch: usize) -> bool {
        epoch == 1 || epoch % self.validation_intervals.max(1) == 0
    }

    pub fn is_print_epoch(&self, epoch: usize) -> bool {
        epoch % self.print_epochs.max(1) == 0
    }
}
