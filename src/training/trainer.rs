use crate::artifacts::Artifacts;
use crate::data::Cifar10Batch;
use crate::error::Result;
use crate::model::GoogleNet;
use crate::training::TrainingConfig;
use crate::training::early_stopping::EarlyStopping;
use crate::training::optim::BoxedOptimizer;
use crate::training::tracking::{EpochMetrics, Tracker};
use burn::data::dataloader::DataLoader;
use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::train::ClassificationOutput;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type Dataloader<B> = Arc<dyn DataLoader<B, Cifar10Batch<B>>>;

/// A model trained by [`ClassificationTrainer`].
pub trait ImageClassifier<B: Backend>: Module<B> {
    /// # Shapes
    ///   - images [batch, channels, height, width]
    ///   - targets [batch]
    fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B>;
}

impl<B: Backend> ImageClassifier<B> for GoogleNet<B> {
    fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        GoogleNet::forward_classification(self, images, targets)
    }
}

/// Running loss and accuracy over the batches of an epoch.
#[derive(Debug, Clone, Default)]
pub struct EpochStats {
    loss_sum: f64,
    batches: usize,
    correct: usize,
    samples: usize,
}

impl EpochStats {
    pub fn update<B: Backend>(&mut self, output: &ClassificationOutput<B>) {
        let [batch_size, _num_classes] = output.output.dims();
        let loss: f64 = output.loss.clone().into_scalar().elem();
        let predictions: Tensor<B, 1, Int> = output.output.clone().argmax(1).flatten(0, 1);
        let correct: i64 = predictions
            .equal(output.targets.clone())
            .int()
            .sum()
            .into_scalar()
            .elem();

        self.record(loss, correct as usize, batch_size);
    }

    pub fn record(&mut self, loss: f64, correct: usize, samples: usize) {
        self.loss_sum += loss;
        self.batches += 1;
        self.correct += correct;
        self.samples += samples;
    }

    /// Mean of the batch losses.
    pub fn loss(&self) -> f64 {
        if self.batches == 0 {
            f64::NAN
        } else {
            self.loss_sum / self.batches as f64
        }
    }

    /// In percent.
    pub fn accuracy(&self) -> f64 {
        if self.samples == 0 {
            0.
        } else {
            100. * self.correct as f64 / self.samples as f64
        }
    }
}

/// `HH:MM:SS`, hours unbounded.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Epochs per second, or 0 before a whole second has elapsed.
pub fn epochs_per_second(epoch: usize, elapsed: Duration) -> f64 {
    match elapsed.as_secs() {
        0 => 0.,
        secs => epoch as f64 / secs as f64,
    }
}

/// Outcome of [`ClassificationTrainer::train_loop`].
pub struct TrainingReport<M> {
    pub model: M,
    pub epochs_run: usize,
    pub best_validation_loss: Option<f64>,
    pub stopped_early: bool,
}

/// Trains a classifier over CIFAR-10 batches, validating periodically and
/// checkpointing whenever the validation loss improves.
pub struct ClassificationTrainer<AutoB, M>
where
    AutoB: AutodiffBackend,
    M: AutodiffModule<AutoB>,
{
    pub project_name: String,
    pub run_time: String,
    pub config: TrainingConfig,
    pub model: M,
    pub optim: BoxedOptimizer<AutoB, M>,
    pub dataloader_train: Dataloader<AutoB>,
    pub dataloader_valid: Dataloader<AutoB::InnerBackend>,
    pub tracker: Box<dyn Tracker>,
    pub artifacts: Artifacts,
    /// Per-epoch batch limit, for smoke runs.
    pub max_batches: Option<usize>,
}

impl<AutoB, M> ClassificationTrainer<AutoB, M>
where
    AutoB: AutodiffBackend,
    M: AutodiffModule<AutoB> + ImageClassifier<AutoB>,
    M::InnerModule: ImageClassifier<AutoB::InnerBackend>,
{
    /// Checkpoint name for this run.
    pub fn checkpoint_name(&self) -> String {
        format!("{}_checkpoint_{}", self.project_name, self.run_time)
    }

    /// Checkpoint name shared by every run of the project.
    pub fn latest_checkpoint_name(&self) -> String {
        latest_checkpoint_name(&self.project_name)
    }

    /// Runs the epochs, then finishes the tracker whether or not they succeeded.
    pub fn train_loop(mut self) -> Result<TrainingReport<M>> {
        let outcome = self.run_epochs();
        let finished = self.tracker.finish();
        let (epochs_run, best_validation_loss, stopped_early) = outcome?;
        finished?;

        Ok(TrainingReport {
            model: self.model,
            epochs_run,
            best_validation_loss,
            stopped_early,
        })
    }

    /// Returns the epochs run, the best validation loss and whether early stopping fired.
    fn run_epochs(&mut self) -> Result<(usize, Option<f64>, bool)> {
        let mut early_stopping =
            EarlyStopping::new(self.config.early_stop_patience, self.config.early_stop_delta);
        let training_start = Instant::now();
        let mut epochs_run = 0;
        let mut stopped_early = false;

        tracing::info!("Starting training...");
        for epoch in 1..=self.config.epochs {
            epochs_run = epoch;
            let train = self.do_train();

            if self.config.is_validation_epoch(epoch) {
                let valid = self.do_validation();
                let elapsed = training_start.elapsed();
                let speed = epochs_per_second(epoch, elapsed);

                let check = early_stopping.check(valid.loss());
                if check.improved {
                    self.save_checkpoints()?;
                }

                tracing::info!(
                    "[Epoch {epoch:>3}] T_loss: {:7.5}, T_accuracy: {:6.4} | V_loss: {:7.5}, V_accuracy: {:6.4} | {} | T_time: {}, T_speed: {speed:4.3}",
                    train.loss(),
                    train.accuracy(),
                    valid.loss(),
                    valid.accuracy(),
                    check.message,
                    format_elapsed(elapsed),
                );

                self.tracker.log(&EpochMetrics {
                    epoch,
                    training_loss: train.loss(),
                    training_accuracy: train.accuracy(),
                    validation_loss: valid.loss(),
                    validation_accuracy: valid.accuracy(),
                    training_speed: speed,
                })?;

                if check.stop {
                    stopped_early = true;
                    break;
                }
            } else if self.config.is_print_epoch(epoch) {
                tracing::info!(
                    "[Epoch {epoch:>3}] T_loss: {:7.5}, T_accuracy: {:6.4}",
                    train.loss(),
                    train.accuracy(),
                );
            }
        }

        tracing::info!(
            "Final training time: {}",
            format_elapsed(training_start.elapsed())
        );

        Ok((epochs_run, early_stopping.min_loss(), stopped_early))
    }

    fn do_train(&mut self) -> EpochStats {
        let mut stats = EpochStats::default();
        let limit = self.max_batches.unwrap_or(usize::MAX);

        for batch in self.dataloader_train.iter().take(limit) {
            let output = self
                .model
                .forward_classification(batch.images, batch.targets);
            stats.update(&output);

            let grads = output.loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            // the optimizer takes the model by value
            let model = self.model.clone();
            self.model = self.optim.step(self.config.learning_rate, model, grads);
        }

        stats
    }

    fn do_validation(&self) -> EpochStats {
        let mut stats = EpochStats::default();
        let limit = self.max_batches.unwrap_or(usize::MAX);
        let valid_model = self.model.valid();

        for batch in self.dataloader_valid.iter().take(limit) {
            let output = valid_model.forward_classification(batch.images, batch.targets);
            stats.update(&output);
        }

        stats
    }

    fn save_checkpoints(&self) -> Result<()> {
        self.artifacts
            .save_model::<AutoB>(&self.checkpoint_name(), &self.model)?;
        self.artifacts
            .save_model::<AutoB>(&self.latest_checkpoint_name(), &self.model)
    }
}

pub fn latest_checkpoint_name(project_name: &str) -> String {
    format!("{project_name}_checkpoint_latest")
}
