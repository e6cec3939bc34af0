//! Heart- and lung-sound screening core.
//!
//! This crate provides:
//! - Audio loading (WAV/MP3/M4A, fixed analysis window, resample)
//! - Mean-pooled MFCC features
//! - A lazily loaded dense classifier (safetensors weights)
//! - Label registries and ranked classification reports

pub mod audio;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod labels;
pub mod math;
pub mod mfcc;
pub mod model;
pub mod ops;
pub mod params;
pub mod pipeline;
pub mod report;
pub mod weights;

pub use audio::{AnalysisWindow, AudioClip, AudioFormat};
pub use classifier::{Classifier, LazyClassifier, ProbabilityVector};
pub use config::ServiceConfig;
pub use error::{DecodeError, FeatureExtractionError, InferenceError, ModelLoadError, PipelineError};
pub use labels::{Domain, LabelDescriptor, LabelRegistry};
pub use mfcc::{FeatureVector, MfccConfig, MfccExtractor};
pub use model::DenseClassifier;
pub use pipeline::{AnalysisOutcome, AudioUpload, DomainPipeline, ScreeningService};
pub use report::{ClassificationReport, ClosingKind, LabelScore, interpret};
