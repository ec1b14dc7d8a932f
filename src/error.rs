use std::path::PathBuf;

/// Errors raised while preparing or running a training session.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    Args(#[from] pico_args::Error),

    #[error("Unused arguments: {0:?}")]
    UnusedArgs(Vec<std::ffi::OsString>),

    #[error("Unknown optimizer code {0} (expected 0: SGD, 1: Momentum, 2: RMSProp, 4: Adam)")]
    UnknownOptimizer(u8),

    #[error("Unknown normalization code {0} (expected 0: none, 1: BatchNorm, 2: LayerNorm)")]
    UnknownNormalization(u8),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<burn::record::RecorderError> for Error {
    fn from(err: burn::record::RecorderError) -> Self {
        Error::Recorder(format!("{err:?}"))
    }
}

impl From<burn::config::ConfigError> for Error {
    fn from(err: burn::config::ConfigError) -> Self {
        Error::Config(format!("{err:?}"))
    }
}

/// Attaches the offending path to an [`std::io::Error`].
pub trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
