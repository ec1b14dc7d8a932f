//! The artifacts directory: configurations, checkpoints and tracked runs.

use crate::backend::RecorderTy;
use crate::error::{IoContext, Result};
use burn::prelude::*;
use burn::record::FileRecorder;
use std::path::{Path, PathBuf};

pub const TRAINING_CONFIG_NAME: &str = "training_config";
pub const MODEL_CONFIG_NAME: &str = "model_config";
pub const RUNS_DIR: &str = "runs";

#[derive(Debug, Clone)]
pub struct Artifacts {
    root: PathBuf,
}

impl Artifacts {
    /// Creates the directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).at(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    /// Model weights path, without the extension the recorder adds.
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Model weights path as written on disk.
    pub fn model_file<B: Backend>(&self, name: &str) -> PathBuf {
        let file_ext = <RecorderTy as FileRecorder<B>>::file_extension();
        self.root.join(format!("{name}.{file_ext}"))
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join(RUNS_DIR)
    }

    pub fn save_config(&self, name: &str, config: &impl Config) -> Result<()> {
        let path = self.config_path(name);
        tracing::debug!("Saving {name} into {path:?}");
        config.save(&path).at(path)
    }

    /// `None` when the directory holds no such config.
    pub fn load_config<C: Config>(&self, name: &str) -> Result<Option<C>> {
        let path = self.config_path(name);
        if !path.exists() {
            return Ok(None);
        }
        tracing::info!("Loading {name} from {path:?}");
        Ok(Some(load_config(&path)?))
    }

    pub fn save_model<B: Backend>(&self, name: &str, model: &impl Module<B>) -> Result<()> {
        let path = self.model_path(name);
        tracing::debug!("Saving model to {:?}", self.model_file::<B>(name));
        model
            .clone()
            .save_file(path, &RecorderTy::new())?; // ext added automatically
        Ok(())
    }

    /// Loads weights into `model`; `None` when the directory holds no such model.
    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        name: &str,
        model: M,
        device: &B::Device,
    ) -> Result<Option<M>> {
        let path_ext = self.model_file::<B>(name);
        if !path_ext.exists() {
            return Ok(None);
        }
        tracing::info!("Loading model from {path_ext:?}");
        let model = model.load_file(self.model_path(name), &RecorderTy::new(), device)?;
        Ok(Some(model))
    }
}

pub fn load_config<C: Config>(path: &Path) -> Result<C> {
    Ok(C::load(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GoogleNetConfig, Normalization};
    use crate::training::TrainingConfig;
    use burn::nn::{Linear, LinearConfig};

    type TestBackend = burn::backend::NdArray<f32>;

    #[test]
    fn configs_round_trip_through_the_directory() {
        let tmp = temp_dir::TempDir::new().unwrap();
        let artifacts = Artifacts::create(tmp.path().join("nested")).unwrap();
        assert!(
            artifacts
                .load_config::<TrainingConfig>(TRAINING_CONFIG_NAME)
                .unwrap()
                .is_none()
        );

        let config = TrainingConfig::new().with_batch_size(64).with_wandb(true);
        artifacts.save_config(TRAINING_CONFIG_NAME, &config).unwrap();
        let loaded: TrainingConfig = artifacts
            .load_config(TRAINING_CONFIG_NAME)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.batch_size, 64);
        assert!(loaded.wandb);

        let model = GoogleNetConfig::new()
            .with_normalization(Normalization::BatchNorm)
            .with_dropout(Some(0.4));
        artifacts.save_config(MODEL_CONFIG_NAME, &model).unwrap();
        let loaded: GoogleNetConfig = artifacts.load_config(MODEL_CONFIG_NAME).unwrap().unwrap();
        assert_eq!(loaded.normalization, Normalization::BatchNorm);
        assert_eq!(loaded.dropout, Some(0.4));
    }

    #[test]
    fn model_weights_reload() {
        let device = Default::default();
        let tmp = temp_dir::TempDir::new().unwrap();
        let artifacts = Artifacts::create(tmp.path()).unwrap();

        let saved: Linear<TestBackend> = LinearConfig::new(4, 2).init(&device);
        artifacts.save_model::<TestBackend>("weights", &saved).unwrap();
        assert!(artifacts.model_file::<TestBackend>("weights").exists());

        let fresh: Linear<TestBackend> = LinearConfig::new(4, 2).init(&device);
        let loaded = artifacts
            .load_model("weights", fresh, &device)
            .unwrap()
            .unwrap();
        loaded
            .weight
            .val()
            .into_data()
            .assert_eq(&saved.weight.val().into_data(), true);

        let missing: Linear<TestBackend> = LinearConfig::new(4, 2).init(&device);
        assert!(artifacts.load_model("absent", missing, &device).unwrap().is_none());
    }
}
