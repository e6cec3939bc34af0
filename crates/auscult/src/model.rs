//! Dense classifier loading from a model directory.
//!
//! A model directory holds `model.json` (layer metadata, see
//! [`ClassifierParams`]) and `model.safetensors` (weights in `[out, in]`
//! layout).

use std::path::{Path, PathBuf};

use crate::classifier::{Classifier, ProbabilityVector};
use crate::error::{InferenceError, ModelLoadError};
use crate::mfcc::FeatureVector;
use crate::ops::{activate_rows, linear};
use crate::params::{Activation, ClassifierParams};
use crate::weights::{WeightError, WeightStore};

pub const PARAMS_FILE: &str = "model.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

fn params_path(dir: &Path) -> PathBuf {
    dir.join(PARAMS_FILE)
}

fn weights_path(dir: &Path) -> PathBuf {
    dir.join(WEIGHTS_FILE)
}

#[derive(Debug, Clone)]
struct DenseLayer {
    weight: Vec<f32>, // [out_dim * in_dim]
    bias: Option<Vec<f32>>,
    in_dim: usize,
    out_dim: usize,
    activation: Activation,
}

#[derive(Debug, Clone)]
pub struct DenseClassifier {
    params: ClassifierParams,
    layers: Vec<DenseLayer>,
}

impl DenseClassifier {
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let dir = dir.as_ref();
        let params_file = params_path(dir);
        let weights_file = weights_path(dir);

        for path in [&params_file, &weights_file] {
            if !path.is_file() {
                return Err(ModelLoadError::Missing { path: path.clone() });
            }
        }

        let params = ClassifierParams::from_path(&params_file).map_err(|e| {
            ModelLoadError::Corrupt {
                path: params_file.clone(),
                reason: format!("{e:#}"),
            }
        })?;

        let corrupt = |e: WeightError| ModelLoadError::Corrupt {
            path: weights_file.clone(),
            reason: e.to_string(),
        };
        let store = WeightStore::open(&weights_file).map_err(corrupt)?;
        Self::from_parts(params, &store).map_err(corrupt)
    }

    /// Assemble the network from parsed metadata and an open weight store.
    pub fn from_parts(params: ClassifierParams, store: &WeightStore) -> Result<Self, WeightError> {
        let mut layers = Vec::with_capacity(params.layers.len());
        for lp in &params.layers {
            let weight = store.tensor_f32_shaped(&lp.weight, &[lp.out_dim, lp.in_dim])?;
            let bias = match &lp.bias {
                Some(name) => Some(store.tensor_f32_shaped(name, &[lp.out_dim])?.data),
                None => None,
            };
            layers.push(DenseLayer {
                weight: weight.data,
                bias,
                in_dim: lp.in_dim,
                out_dim: lp.out_dim,
                activation: lp.activation,
            });
        }
        Ok(Self { params, layers })
    }

    #[must_use]
    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Run one `[1, input_width]` row through every layer.
    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut x = input.to_vec();
        for layer in &self.layers {
            x = linear(
                &x,
                1,
                layer.in_dim,
                &layer.weight,
                layer.out_dim,
                layer.bias.as_deref(),
            );
            activate_rows(&mut x, layer.out_dim, layer.activation);
        }
        x
    }
}

impl Classifier for DenseClassifier {
    fn input_width(&self) -> usize {
        self.params.input_width
    }

    fn num_classes(&self) -> usize {
        self.params.num_classes
    }

    fn predict(&self, features: &FeatureVector) -> Result<ProbabilityVector, InferenceError> {
        if features.len() != self.input_width() {
            return Err(InferenceError::InputWidth {
                expected: self.input_width(),
                got: features.len(),
            });
        }
        ProbabilityVector::new(self.forward(features.as_slice()))
    }
}
