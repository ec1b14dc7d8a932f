use crate::artifacts::{Artifacts, MODEL_CONFIG_NAME, TRAINING_CONFIG_NAME, load_config};
use crate::error::{Error, IoContext, Result};
use crate::model::{GoogleNetConfig, HEAD_DROPOUT, Normalization};
use crate::training::{OptimizerKind, TrainingConfig};
use std::ffi::OsString;
use std::path::PathBuf;

pub const HELP: &str = "\
CIFAR-10 GoogleNet

Trains an Inception (GoogleNet) classifier on the CIFAR-10 dataset.
Configurations, checkpoints and tracked runs are kept in an artifacts directory.

USAGE:
    cifar10-googlenet [OPTIONS]

BEHAVIOR OVERVIEW
- The training and model configs are loaded from --training-config / --model-config when given,
  else from the artifacts directory when present, else defaults are used.
- Hyperparameter flags override the loaded values. The resolved configs are saved back into the
  artifacts directory.
- Checkpoints are saved into the artifacts directory whenever the validation loss improves.
- With --wandb, the run config and per-validation metrics are recorded under <artifacts>/runs/.

FLAGS:
    -h, --help                  Show this help message and exit
        --wandb / --no-wandb    Record the run with the experiment tracker (default: false)
                                For either pair, the last form given wins
        --dropout / --no-dropout
                                Dropout before the classifier head (default: false)
        --resume                Load the latest checkpoint from the artifacts directory before training

OPTIONS:
    -b, --batch-size <INT>      Batch size (default: 2048)
    -e, --epochs <INT>          Number of training epochs (default: 500)
    -p, --print-epochs <INT>    Number of printing epochs interval (default: 100)
    -r, --learning-rate <FLOAT> Learning rate (default: 1e-3)
    -v, --validation-intervals <INT>
                                Number of training epochs between validations (default: 10)
    -o, --optimizer <INT>       Optimizers (0: SGD, 1: Momentum, 2: RMSProp, 4: Adam, default: 4)
    -n, --normalization <INT>   Normalization (0: none, 1: BatchNorm, 2: LayerNorm, default: 0)
    -w, --weight-decay <FLOAT>  Weight decay (default: 0.0)
        --early-stop-patience <INT>
                                Validations without improvement before stopping (default: 10)
        --early-stop-delta <FLOAT>
                                Minimum validation loss improvement (default: 1e-4)
    -s, --seed <INT>            Seed for shuffling and initialization (default: 0)
        --num-workers <INT>     Data loader workers (default: 2)
    -c, --training-config <PATH>
                                Load the training configuration from this file
    -m, --model-config <PATH>   Load the model configuration from this file
    -a, --artifacts-path <PATH>
                                Directory where configurations, checkpoints and runs are saved.
                                If the directory does not exist, it will be created.
                                Defaults to a newly created temporary directory (path will be printed).
";

#[derive(Debug, Default, Clone)]
pub struct AppArgs {
    pub help: bool,
    pub wandb: Option<bool>,
    pub batch_size: Option<usize>,
    pub epochs: Option<usize>,
    pub print_epochs: Option<usize>,
    pub learning_rate: Option<f64>,
    pub validation_intervals: Option<usize>,
    pub optimizer: Option<OptimizerKind>,
    pub dropout: Option<bool>,
    pub normalization: Option<Normalization>,
    pub weight_decay: Option<f64>,
    pub early_stop_patience: Option<usize>,
    pub early_stop_delta: Option<f64>,
    pub seed: Option<u64>,
    pub num_workers: Option<usize>,
    pub resume: bool,
    pub training_config: Option<PathBuf>,
    pub model_config: Option<PathBuf>,
    pub artifacts_path: Option<PathBuf>,
}

impl AppArgs {
    /// Parses the process arguments; prints [`HELP`] and exits on `--help`.
    pub fn parse() -> Result<Self> {
        let args = Self::from_vec(std::env::args_os().skip(1).collect())?;
        if args.help {
            println!("{HELP}");
            std::process::exit(0);
        }
        Ok(args)
    }

    pub fn from_vec(args: Vec<OsString>) -> Result<Self> {
        let raw = args.clone();
        let mut pargs = pico_args::Arguments::from_vec(args);

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(AppArgs {
                help: true,
                ..Default::default()
            });
        }

        let args = AppArgs {
            help: false,
            batch_size: pargs.opt_value_from_str(["-b", "--batch-size"])?,
            epochs: pargs.opt_value_from_str(["-e", "--epochs"])?,
            print_epochs: pargs.opt_value_from_str(["-p", "--print-epochs"])?,
            learning_rate: pargs.opt_value_from_str(["-r", "--learning-rate"])?,
            validation_intervals: pargs.opt_value_from_str(["-v", "--validation-intervals"])?,
            optimizer: pargs.opt_value_from_fn(["-o", "--optimizer"], parse_optimizer)?,
            normalization: pargs.opt_value_from_fn(["-n", "--normalization"], parse_normalization)?,
            weight_decay: pargs.opt_value_from_str(["-w", "--weight-decay"])?,
            early_stop_patience: pargs.opt_value_from_str("--early-stop-patience")?,
            early_stop_delta: pargs.opt_value_from_str("--early-stop-delta")?,
            seed: pargs.opt_value_from_str(["-s", "--seed"])?,
            num_workers: pargs.opt_value_from_str("--num-workers")?,
            training_config: pargs
                .opt_value_from_os_str(["-c", "--training-config"], parse_path)?,
            model_config: pargs.opt_value_from_os_str(["-m", "--model-config"], parse_path)?,
            artifacts_path: pargs.opt_value_from_os_str(["-a", "--artifacts-path"], parse_path)?,
            // must parse flags after values
            wandb: bool_flag(&raw, &mut pargs, "--wandb", "--no-wandb"),
            dropout: bool_flag(&raw, &mut pargs, "--dropout", "--no-dropout"),
            resume: pargs.contains("--resume"),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(Error::UnusedArgs(remaining));
        }

        Ok(args)
    }

    /// Opens the artifacts directory, creating a temporary one if no path was given.
    pub fn artifacts(&self) -> Result<Artifacts> {
        match &self.artifacts_path {
            Some(path) => Artifacts::create(path),
            None => {
                // e.g. /tmp/burn-googlenet-cifar10-googlenet-abcd-0
                let name = format!(
                    "{}-{}-",
                    std::env!("CARGO_PKG_NAME"),
                    "cifar10-googlenet"
                );
                let tmp = temp_dir::TempDir::with_prefix(name)
                    .at(std::env::temp_dir())?
                    .dont_delete_on_drop();
                let path = tmp.path().to_path_buf();
                println!("new artifacts directory: {path:?}");
                Artifacts::create(path)
            }
        }
    }

    /// Applies the hyperparameter flags over `config`.
    pub fn override_training(&self, mut config: TrainingConfig) -> TrainingConfig {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }
        set!(
            wandb,
            batch_size,
            epochs,
            print_epochs,
            learning_rate,
            validation_intervals,
            optimizer,
            weight_decay,
            early_stop_patience,
            early_stop_delta,
            seed,
            num_workers
        );
        config
    }

    /// Applies the model flags over `config`.
    pub fn override_model(&self, mut config: GoogleNetConfig) -> GoogleNetConfig {
        if let Some(dropout) = self.dropout {
            config.dropout = dropout.then_some(HEAD_DROPOUT);
        }
        if let Some(normalization) = self.normalization {
            config.normalization = normalization;
        }
        config
    }

    /// Explicit file, else the artifacts directory, else defaults; then flags. Saved back.
    pub fn resolve_training_config(&self, artifacts: &Artifacts) -> Result<TrainingConfig> {
        let base = match &self.training_config {
            Some(path) => Some(load_config::<TrainingConfig>(path)?),
            None => artifacts.load_config(TRAINING_CONFIG_NAME)?,
        };
        let config = self.override_training(base.unwrap_or_else(TrainingConfig::new));
        artifacts.save_config(TRAINING_CONFIG_NAME, &config)?;
        Ok(config)
    }

    /// Same resolution as [`Self::resolve_training_config`], for the model.
    pub fn resolve_model_config(&self, artifacts: &Artifacts) -> Result<GoogleNetConfig> {
        let base = match &self.model_config {
            Some(path) => Some(load_config::<GoogleNetConfig>(path)?),
            None => artifacts.load_config(MODEL_CONFIG_NAME)?,
        };
        let config = self.override_model(base.unwrap_or_else(GoogleNetConfig::new));
        artifacts.save_config(MODEL_CONFIG_NAME, &config)?;
        Ok(config)
    }
}

/// `Some(true)` for `yes`, `Some(false)` for `no`, `None` when neither is given.
/// The last one given wins; every occurrence is consumed.
fn bool_flag(
    raw: &[OsString],
    pargs: &mut pico_args::Arguments,
    yes: &'static str,
    no: &'static str,
) -> Option<bool> {
    let last = raw
        .iter()
        .rev()
        .find(|arg| **arg == yes || **arg == no)
        .map(|arg| *arg == yes);
    while pargs.contains(yes) {}
    while pargs.contains(no) {}
    last
}

fn parse_path(s: &std::ffi::OsStr) -> std::result::Result<PathBuf, &'static str> {
    Ok(s.into())
}

fn parse_optimizer(s: &str) -> Result<OptimizerKind> {
    let code: u8 = s
        .parse()
        .map_err(|_| Error::Config(format!("optimizer code {s:?} is not an integer")))?;
    OptimizerKind::from_code(code)
}

fn parse_normalization(s: &str) -> Result<Normalization> {
    let code: u8 = s
        .parse()
        .map_err(|_| Error::Config(format!("normalization code {s:?} is not an integer")))?;
    Normalization::from_code(code)
}
