use burn::backend::{Autodiff, NdArray};
use burn::data::dataloader::DataLoaderBuilder;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::train::ClassificationOutput;
use burn_googlenet::artifacts::Artifacts;
use burn_googlenet::data::{
    CHANNELS, Cifar10Batch, Cifar10Batcher, Cifar10Dataset, Cifar10ItemRaw, HEIGHT, NUM_CLASSES,
    WIDTH,
};
use burn_googlenet::model::{GoogleNet, GoogleNetConfig};
use burn_googlenet::error::{Error, Result};
use burn_googlenet::training::tracking::{
    DisabledTracker, EpochMetrics, LocalTracker, RunInfo, Tracker, read_metrics,
};
use std::cell::Cell;
use std::rc::Rc;
use burn_googlenet::training::{
    ClassificationTrainer, Dataloader, ImageClassifier, OptimizerKind, TrainingConfig,
    latest_checkpoint_name,
};

type TestBackend = NdArray<f32>;
type TestAutoBackend = Autodiff<TestBackend>;

/// Images of a single intensity; the label follows the intensity.
fn items(len: usize) -> Vec<Cifar10ItemRaw> {
    (0..len)
        .map(|i| {
            let label = (i % 2) as u8;
            Cifar10ItemRaw {
                image_bytes: vec![if label == 0 { 20 } else { 230 }; CHANNELS * HEIGHT * WIDTH],
                label,
            }
        })
        .collect()
}

fn dataloaders<B: burn::tensor::backend::AutodiffBackend>(
    len: usize,
    batch_size: usize,
    device: &B::Device,
) -> (Dataloader<B>, Dataloader<B::InnerBackend>) {
    let (train, valid) = Cifar10Dataset::from_items(items(len)).split(len * 3 / 4, 0);
    let train = DataLoaderBuilder::new(Cifar10Batcher::default())
        .batch_size(batch_size)
        .shuffle(0)
        .set_device(device.clone())
        .build(train);
    let valid = DataLoaderBuilder::<B::InnerBackend, _, Cifar10Batch<B::InnerBackend>>::new(
        Cifar10Batcher::default(),
    )
    .batch_size(batch_size)
    .set_device(device.clone())
    .build(valid);
    (train, valid)
}

#[derive(Module, Debug)]
struct TinyClassifier<B: Backend> {
    head: Linear<B>,
}

impl<B: Backend> TinyClassifier<B> {
    fn new(device: &B::Device) -> Self {
        Self {
            head: LinearConfig::new(CHANNELS * HEIGHT * WIDTH, NUM_CLASSES).init(device),
        }
    }
}

impl<B: Backend> ImageClassifier<B> for TinyClassifier<B> {
    fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.head.forward(images.flatten::<2>(1, 3));
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());
        ClassificationOutput::new(loss, output, targets)
    }
}

#[test]
fn trainer_checkpoints_and_tracks_validated_epochs() {
    let device = Default::default();
    let tmp = temp_dir::TempDir::new().unwrap();
    let artifacts = Artifacts::create(tmp.path().join("artifacts")).unwrap();
    let config = TrainingConfig::new()
        .with_epochs(4)
        .with_batch_size(4)
        .with_learning_rate(1e-2)
        .with_validation_intervals(2)
        .with_print_epochs(1)
        .with_wandb(true);

    let info = RunInfo {
        project: "test".into(),
        name: "tiny".into(),
        notes: String::new(),
        tags: vec!["tiny".into()],
        config: serde_json::to_value(&config).unwrap(),
    };
    let tracker = LocalTracker::start(&artifacts.runs_dir(), &info).unwrap();
    let run_dir = tracker.dir().to_path_buf();

    let (dataloader_train, dataloader_valid) = dataloaders::<TestAutoBackend>(16, 4, &device);
    let model = TinyClassifier::<TestAutoBackend>::new(&device);
    let trainer = ClassificationTrainer {
        project_name: "tiny".into(),
        run_time: "now".into(),
        optim: config.optimizer.init(config.weight_decay),
        config,
        model,
        dataloader_train,
        dataloader_valid,
        tracker: Box::new(tracker),
        artifacts: artifacts.clone(),
        max_batches: None,
    };
    let report = trainer.train_loop().unwrap();

    assert_eq!(report.epochs_run, 4);
    assert!(!report.stopped_early);
    assert!(report.best_validation_loss.is_some());

    // epochs 1, 2 and 4 are validated
    let metrics = read_metrics(&run_dir).unwrap();
    assert_eq!(
        metrics.iter().map(|m| m.epoch).collect::<Vec<_>>(),
        vec![1, 2, 4]
    );
    assert!(metrics.iter().all(|m| (0. ..=100.).contains(&m.validation_accuracy)));

    assert!(
        artifacts
            .model_file::<TestAutoBackend>("tiny_checkpoint_now")
            .exists()
    );
    let latest = latest_checkpoint_name("tiny");
    let reloaded = artifacts
        .load_model::<TestAutoBackend, _>(&latest, TinyClassifier::new(&device), &device)
        .unwrap();
    assert!(reloaded.is_some());
}

#[test]
fn zero_patience_stops_after_the_second_validation() {
    let device = Default::default();
    let tmp = temp_dir::TempDir::new().unwrap();
    let artifacts = Artifacts::create(tmp.path()).unwrap();
    let config = TrainingConfig::new()
        .with_epochs(50)
        .with_batch_size(4)
        .with_learning_rate(0.)
        .with_validation_intervals(1)
        .with_optimizer(OptimizerKind::Sgd)
        .with_early_stop_patience(0);

    let (dataloader_train, dataloader_valid) = dataloaders::<TestAutoBackend>(8, 4, &device);
    let trainer = ClassificationTrainer {
        project_name: "frozen".into(),
        run_time: "now".into(),
        optim: config.optimizer.init(config.weight_decay),
        config,
        model: TinyClassifier::<TestAutoBackend>::new(&device),
        dataloader_train,
        dataloader_valid,
        tracker: Box::new(DisabledTracker) as Box<dyn Tracker>,
        artifacts,
        max_batches: None,
    };

    // a zero learning rate never improves the validation loss
    let report = trainer.train_loop().unwrap();
    assert!(report.stopped_early);
    assert_eq!(report.epochs_run, 2);
}

#[test]
fn googlenet_trains_a_batch() {
    let device = Default::default();
    let tmp = temp_dir::TempDir::new().unwrap();
    let artifacts = Artifacts::create(tmp.path()).unwrap();
    let config = TrainingConfig::new()
        .with_epochs(1)
        .with_batch_size(2)
        .with_optimizer(OptimizerKind::Momentum);

    let (dataloader_train, dataloader_valid) = dataloaders::<TestAutoBackend>(8, 2, &device);
    let model: GoogleNet<TestAutoBackend> = GoogleNetConfig::new().init(&device);
    let trainer = ClassificationTrainer {
        project_name: "googlenet".into(),
        run_time: "now".into(),
        optim: config.optimizer.init(config.weight_decay),
        config,
        model,
        dataloader_train,
        dataloader_valid,
        tracker: Box::new(DisabledTracker),
        artifacts: artifacts.clone(),
        max_batches: Some(1),
    };
    let report = trainer.train_loop().unwrap();

    assert_eq!(report.epochs_run, 1);
    assert!(report.best_validation_loss.unwrap().is_finite());
    assert!(
        artifacts
            .model_file::<TestAutoBackend>(&latest_checkpoint_name("googlenet"))
            .exists()
    );
}

/// Fails every log, remembering whether it was finished.
struct FailingTracker {
    finished: Rc<Cell<bool>>,
}

impl Tracker for FailingTracker {
    fn log(&mut self, _metrics: &EpochMetrics) -> Result<()> {
        Err(Error::Config("tracker unavailable".into()))
    }

    fn finish(&mut self) -> Result<()> {
        self.finished.set(true);
        Ok(())
    }
}

#[test]
fn tracker_is_finished_when_training_fails() {
    let device = Default::default();
    let tmp = temp_dir::TempDir::new().unwrap();
    let artifacts = Artifacts::create(tmp.path()).unwrap();
    let config = TrainingConfig::new().with_epochs(3).with_batch_size(4);
    let finished = Rc::new(Cell::new(false));

    let (dataloader_train, dataloader_valid) = dataloaders::<TestAutoBackend>(8, 4, &device);
    let trainer = ClassificationTrainer {
        project_name: "failing".into(),
        run_time: "now".into(),
        optim: config.optimizer.init(config.weight_decay),
        config,
        model: TinyClassifier::<TestAutoBackend>::new(&device),
        dataloader_train,
        dataloader_valid,
        tracker: Box::new(FailingTracker {
            finished: Rc::clone(&finished),
        }),
        artifacts,
        max_batches: None,
    };

    let result = trainer.train_loop();
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(finished.get());
}
