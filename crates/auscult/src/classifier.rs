//! Classifier contract, probability vectors and the load-once model cache.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{info, warn};

use crate::constants::PROBABILITY_SUM_TOLERANCE;
use crate::error::{InferenceError, ModelLoadError};
use crate::mfcc::FeatureVector;
use crate::model::DenseClassifier;

/// A pre-trained multi-class probability model.
pub trait Classifier: Send + Sync {
    fn input_width(&self) -> usize;
    fn num_classes(&self) -> usize;
    fn predict(&self, features: &FeatureVector) -> Result<ProbabilityVector, InferenceError>;
}

/// Per-class probabilities, index-aligned with a label registry.
///
/// Every entry lies in `[0, 1]` and the entries sum to 1 within
/// [`PROBABILITY_SUM_TOLERANCE`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProbabilityVector(Vec<f32>);

impl ProbabilityVector {
    pub fn new(values: Vec<f32>) -> Result<Self, InferenceError> {
        if values.is_empty() {
            return Err(InferenceError::InvalidProbabilities(
                "no classes".to_string(),
            ));
        }
        if let Some((i, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0 || **v > 1.0)
        {
            return Err(InferenceError::InvalidProbabilities(format!(
                "entry {i} is {v}, outside [0, 1]"
            )));
        }
        let sum: f32 = values.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(InferenceError::InvalidProbabilities(format!(
                "entries sum to {sum}"
            )));
        }
        Ok(Self(values))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Index and value of the largest probability, first occurrence on ties.
    #[must_use]
    pub fn top(&self) -> (usize, f32) {
        let idx = crate::math::argmax(&self.0).unwrap_or(0);
        (idx, self.0[idx])
    }
}

type Loader = Box<dyn Fn() -> Result<Box<dyn Classifier>, ModelLoadError> + Send + Sync>;

/// Loads a classifier on first use and shares it for the rest of the process.
///
/// Concurrent first callers block on one load. A failed load is kept and
/// returned to every later caller without re-running the loader.
pub struct LazyClassifier {
    source: String,
    loader: Loader,
    cell: OnceCell<Result<Box<dyn Classifier>, ModelLoadError>>,
}

impl fmt::Debug for LazyClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClassifier")
            .field("source", &self.source)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl LazyClassifier {
    /// Lazily load a [`DenseClassifier`] from `dir`.
    #[must_use]
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let source = dir.display().to_string();
        Self::with_loader(source, move || {
            DenseClassifier::load_from_dir(&dir).map(|m| Box::new(m) as Box<dyn Classifier>)
        })
    }

    pub fn with_loader<F>(source: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Classifier>, ModelLoadError> + Send + Sync + 'static,
    {
        Self {
            source: source.into(),
            loader: Box::new(loader),
            cell: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True once a load has been attempted and succeeded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    pub fn get(&self) -> Result<&dyn Classifier, ModelLoadError> {
        let slot = self.cell.get_or_init(|| {
            let started = Instant::now();
            let loaded = (self.loader)();
            match &loaded {
                Ok(model) => info!(
                    source = %self.source,
                    input_width = model.input_width(),
                    num_classes = model.num_classes(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "classifier loaded"
                ),
                Err(err) => warn!(source = %self.source, error = %err, "classifier failed to load"),
            }
            loaded
        });
        match slot {
            Ok(model) => Ok(model.as_ref()),
            Err(err) => Err(err.clone()),
        }
    }
}
