//! Experiment tracking: records a run's hyperparameters and per-epoch metrics.

use crate::error::{IoContext, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const RUN_FILE: &str = "run.json";
pub const METRICS_FILE: &str = "metrics.jsonl";

/// Metrics logged after a validated epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub training_loss: f64,
    /// In percent.
    pub training_accuracy: f64,
    pub validation_loss: f64,
    /// In percent.
    pub validation_accuracy: f64,
    /// Epochs per second since training started.
    pub training_speed: f64,
}

/// Description of a run, written once when tracking starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub project: String,
    pub name: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub config: serde_json::Value,
}

pub trait Tracker {
    fn log(&mut self, metrics: &EpochMetrics) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// Tracking turned off.
#[derive(Debug, Default)]
pub struct DisabledTracker;

impl Tracker for DisabledTracker {
    fn log(&mut self, _metrics: &EpochMetrics) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Records the run under `<root>/<run name>/`: [`RUN_FILE`] holds the [`RunInfo`] and
/// [`METRICS_FILE`] gets one JSON line per logged epoch.
pub struct LocalTracker {
    dir: PathBuf,
    metrics: BufWriter<File>,
}

impl LocalTracker {
    pub fn start(root: &Path, info: &RunInfo) -> Result<Self> {
        let dir = root.join(&info.name);
        std::fs::create_dir_all(&dir).at(&dir)?;

        let run_path = dir.join(RUN_FILE);
        let run_file = File::create(&run_path).at(&run_path)?;
        serde_json::to_writer_pretty(run_file, info)?;

        let metrics_path = dir.join(METRICS_FILE);
        let metrics = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&metrics_path)
            .at(&metrics_path)?;
        tracing::info!("Tracking run {} into {dir:?}", info.name);

        Ok(Self {
            dir,
            metrics: BufWriter::new(metrics),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Tracker for LocalTracker {
    fn log(&mut self, metrics: &EpochMetrics) -> Result<()> {
        let path = self.dir.join(METRICS_FILE);
        serde_json::to_writer(&mut self.metrics, metrics)?;
        self.metrics.write_all(b"\n").at(&path)?;
        self.metrics.flush().at(path)
    }

    fn finish(&mut self) -> Result<()> {
        self.metrics.flush().at(self.dir.join(METRICS_FILE))
    }
}

/// Reads back the metrics of a [`LocalTracker`] run directory.
pub fn read_metrics(run_dir: &Path) -> Result<Vec<EpochMetrics>> {
    let path = run_dir.join(METRICS_FILE);
    let content = std::fs::read_to_string(&path).at(&path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}
