//! Error taxonomy of the screening pipeline.
//!
//! Every error here is recoverable at the request boundary. `ModelLoadError`
//! is sticky: once a model fails to load, the same error is returned for the
//! rest of the process lifetime.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("audio upload is empty")]
    Empty,
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("could not recognise audio container: {0}")]
    UnrecognisedContainer(String),
    #[error("no decodable audio track")]
    NoAudioTrack,
    #[error("audio stream has no sample rate")]
    UnknownSampleRate,
    #[error("malformed audio stream: {0}")]
    Malformed(String),
    #[error("resampling failed: {0}")]
    Resample(String),
}

impl From<symphonia::core::errors::Error> for DecodeError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymError;
        match err {
            SymError::Unsupported(what) => Self::UnsupportedFormat(what.to_string()),
            other => Self::Malformed(other.to_string()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeatureExtractionError {
    #[error("audio clip contains no samples")]
    Empty,
    #[error("audio clip too short: {samples} samples, need at least {required} for one analysis frame")]
    TooShort { samples: usize, required: usize },
    #[error("audio clip is silent")]
    Silent,
    #[error("audio clip sampled at {got} Hz, extractor expects {expected} Hz")]
    SampleRate { expected: u32, got: u32 },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelLoadError {
    #[error("model artifact not found: {}", path.display())]
    Missing { path: PathBuf },
    #[error("model artifact {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("feature width mismatch: model expects {expected}, got {got}")]
    InputWidth { expected: usize, got: usize },
    #[error("class count mismatch: model produces {model}, label registry has {labels}")]
    ClassCount { model: usize, labels: usize },
    #[error("invalid probability vector: {0}")]
    InvalidProbabilities(String),
}

/// Any failure of a single analysis request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    FeatureExtraction(#[from] FeatureExtractionError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}
