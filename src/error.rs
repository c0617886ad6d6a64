//! Error types.
//!
//! Each pipeline component reports failures through its own enum so callers can
//! decide the recovery scope (skip a file, skip a filter, abort the file, log and
//! continue). `PipelineError` composes them for `?`, and `AppError` is what the
//! binary turns into an exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Waveform file could not be read or merged. The file is skipped.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("'{path}' contains no traces")]
    Empty { path: PathBuf },

    #[error("cannot merge traces of {id}: sampling rates {first} and {second} differ")]
    SamplingRateMismatch { id: String, first: f64, second: f64 },
}

/// A single band-pass variant could not be produced. That filter is skipped.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid band {freqmin}-{freqmax} Hz for filter '{label}'")]
    InvalidBand {
        label: String,
        freqmin: f64,
        freqmax: f64,
    },

    #[error("filter '{label}': low corner {freqmin} Hz is at or above Nyquist ({nyquist} Hz)")]
    AboveNyquist {
        label: String,
        freqmin: f64,
        nyquist: f64,
    },

    #[error("filter '{label}': invalid sampling rate {sampling_rate} on trace {trace}")]
    InvalidSamplingRate {
        label: String,
        trace: String,
        sampling_rate: f64,
    },

    #[error("filter '{label}': design produced an unstable section")]
    Unstable { label: String },
}

/// Detection model failure. Aborts the current file, or the whole run when
/// models cannot be loaded at all.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown model dataset '{0}'")]
    UnknownDataset(String),

    #[error("no detection models loaded")]
    NoModels,

    #[error("model {model}: {message}")]
    Inference { model: String, message: String },
}

/// Tabular or image output failure. Logged, best-effort.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to render '{path}': {message}")]
    Render { path: PathBuf, message: String },

    #[error("failed to write JSON '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Invalid configuration (window length, band list, image size).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("window length must be between {min} and {max} minutes (got {got})")]
    WindowLength { min: u32, max: u32, got: u32 },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Config(_) => 2,
            PipelineError::Read(_) => 3,
            PipelineError::Filter(_) | PipelineError::Model(_) => 4,
            PipelineError::Write(_) => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

macro_rules! app_error_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for AppError {
            fn from(err: $ty) -> Self {
                PipelineError::from(err).into()
            }
        })*
    };
}

app_error_from!(ReadError, FilterError, ModelError, WriteError, ConfigError);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
