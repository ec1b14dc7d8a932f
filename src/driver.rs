//! Wires a training run together: configs, device, model, data, optimizer and tracker.

use crate::artifacts::Artifacts;
use crate::backend::MainDevice;
use crate::cli::AppArgs;
use crate::data::{CHANNELS, Cifar10Batch, Cifar10Batcher, Cifar10Dataset, HEIGHT, WIDTH};
use crate::error::Result;
use crate::model::{GoogleNet, GoogleNetConfig};
use crate::training::tracking::{DisabledTracker, LocalTracker, RunInfo, Tracker};
use crate::training::{ClassificationTrainer, Dataloader, TrainingConfig, latest_checkpoint_name};
use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::backend::AutodiffBackend;

pub const PROJECT_NAME: &str = "modern_cifar10";
pub const MODEL_NAME: &str = "googlenet";
pub const RUN_NOTES: &str = "cifar10 experiment with googlenet";

/// Timestamp naming the run and its checkpoints.
pub fn run_time() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Name prefixing the checkpoints of every run.
pub fn checkpoint_project() -> String {
    format!("{PROJECT_NAME}_{MODEL_NAME}")
}

pub fn run_info(
    run_time: &str,
    training: &TrainingConfig,
    model: &GoogleNetConfig,
) -> Result<RunInfo> {
    Ok(RunInfo {
        project: PROJECT_NAME.to_owned(),
        name: format!("{MODEL_NAME}_{run_time}"),
        notes: RUN_NOTES.to_owned(),
        tags: vec![MODEL_NAME.to_owned(), "cifar10".to_owned()],
        config: serde_json::json!({
            "training": serde_json::to_value(training)?,
            "model": serde_json::to_value(model)?,
        }),
    })
}

/// Initializes the model, loading `<project>_checkpoint_latest` weights on `--resume`.
pub fn init_model<B: Backend>(
    args: &AppArgs,
    artifacts: &Artifacts,
    config: &GoogleNetConfig,
    device: &B::Device,
) -> Result<GoogleNet<B>> {
    let model: GoogleNet<B> = config.init(device);
    if !args.resume {
        return Ok(model);
    }
    let name = latest_checkpoint_name(&checkpoint_project());
    match artifacts.load_model::<B, _>(&name, model.clone(), device)? {
        Some(loaded) => Ok(loaded),
        None => {
            tracing::warn!("No {name} checkpoint to resume from, starting afresh");
            Ok(model)
        }
    }
}

pub fn run<AutoB: AutodiffBackend + MainDevice>(args: &AppArgs) -> Result<()> {
    let run_time = run_time();
    let artifacts = args.artifacts()?;
    let training_config = args.resolve_training_config(&artifacts)?;
    let model_config = args.resolve_model_config(&artifacts)?;
    tracing::info!("Artifacts directory: {:?}", artifacts.path());
    tracing::info!("{training_config}");

    let device = AutoB::main_device();
    tracing::info!("Training on device {device:?}");
    AutoB::seed(&device, training_config.seed);

    let summary = model_config.summary([1, CHANNELS, HEIGHT, WIDTH]);
    tracing::info!("\n{summary}");

    let model: GoogleNet<AutoB> = init_model(args, &artifacts, &model_config, &device)?;

    let (train, valid) = Cifar10Dataset::train_validation(training_config.seed)?;
    tracing::info!(
        "Training items: {}, validation items: {}",
        train.len(),
        valid.len()
    );
    let dataloader_train: Dataloader<AutoB> = DataLoaderBuilder::new(Cifar10Batcher::default())
        .batch_size(training_config.batch_size)
        .shuffle(training_config.seed)
        .num_workers(training_config.num_workers)
        .set_device(device.clone())
        .build(train);
    let dataloader_valid: Dataloader<AutoB::InnerBackend> =
        DataLoaderBuilder::<AutoB::InnerBackend, _, Cifar10Batch<AutoB::InnerBackend>>::new(
            Cifar10Batcher::default(),
        )
        .batch_size(training_config.batch_size)
        .num_workers(training_config.num_workers)
        .set_device(device.clone())
        .build(valid);

    let optim = training_config
        .optimizer
        .init::<AutoB, GoogleNet<AutoB>>(training_config.weight_decay);

    let tracker: Box<dyn Tracker> = if training_config.wandb {
        let info = run_info(&run_time, &training_config, &model_config)?;
        Box::new(LocalTracker::start(&artifacts.runs_dir(), &info)?)
    } else {
        Box::new(DisabledTracker)
    };

    let trainer = ClassificationTrainer {
        project_name: checkpoint_project(),
        run_time,
        config: training_config,
        model,
        optim,
        dataloader_train,
        dataloader_valid,
        tracker,
        artifacts,
        max_batches: None,
    };
    let report = trainer.train_loop()?;

    match report.best_validation_loss {
        Some(loss) => tracing::info!(
            "Finished after {} epochs, best validation loss {loss:.5}{}",
            report.epochs_run,
            if report.stopped_early { " (stopped early)" } else { "" }
        ),
        None => tracing::info!("Finished after {} epochs", report.epochs_run),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Normalization;

    type TestBackend = burn::backend::NdArray<f32>;

    fn head_weights(model: &GoogleNet<TestBackend>) -> burn::tensor::TensorData {
        model.head.weight.val().into_data()
    }

    #[test]
    fn resume_loads_the_latest_checkpoint() {
        let device = Default::default();
        let tmp = temp_dir::TempDir::new().unwrap();
        let artifacts = Artifacts::create(tmp.path()).unwrap();
        let config = GoogleNetConfig::new();

        let trained: GoogleNet<TestBackend> = config.init(&device);
        let latest = latest_checkpoint_name(&checkpoint_project());
        assert_eq!(latest, "modern_cifar10_googlenet_checkpoint_latest");
        artifacts.save_model::<TestBackend>(&latest, &trained).unwrap();

        let args = AppArgs {
            resume: true,
            ..Default::default()
        };
        let resumed = init_model::<TestBackend>(&args, &artifacts, &config, &device).unwrap();
        head_weights(&resumed).assert_eq(&head_weights(&trained), true);

        // without --resume the checkpoint is ignored
        let fresh =
            init_model::<TestBackend>(&AppArgs::default(), &artifacts, &config, &device).unwrap();
        assert_ne!(head_weights(&fresh), head_weights(&trained));
    }

    #[test]
    fn resume_without_checkpoint_starts_afresh() {
        let device = Default::default();
        let tmp = temp_dir::TempDir::new().unwrap();
        let artifacts = Artifacts::create(tmp.path()).unwrap();
        let config = GoogleNetConfig::new().with_normalization(Normalization::BatchNorm);
        let args = AppArgs {
            resume: true,
            ..Default::default()
        };

        let model = init_model::<TestBackend>(&args, &artifacts, &config, &device).unwrap();
        assert!(model.b1.convs[0].batch_norm.is_some());
    }

    #[test]
    fn run_info_describes_the_run() {
        let training = TrainingConfig::new().with_batch_size(64);
        let model = GoogleNetConfig::new().with_dropout(Some(0.4));
        let info = run_info("2024-01-02_03-04-05", &training, &model).unwrap();

        assert_eq!(info.project, "modern_cifar10");
        assert_eq!(info.name, "googlenet_2024-01-02_03-04-05");
        assert_eq!(info.notes, "cifar10 experiment with googlenet");
        assert_eq!(info.tags, vec!["googlenet", "cifar10"]);
        assert_eq!(info.config["training"]["batch_size"], 64);
        assert_eq!(info.config["model"]["dropout"], 0.4);
    }
}
