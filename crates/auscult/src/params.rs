//! Classifier metadata file (`model.json`) parsing.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Tanh,
    Sigmoid,
    Softmax,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayerParams {
    /// Tensor name of the `[out, in]` weight matrix.
    pub weight: String,
    /// Tensor name of the `[out]` bias vector.
    #[serde(default)]
    pub bias: Option<String>,
    pub in_dim: usize,
    pub out_dim: usize,
    pub activation: Activation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Free-form model name, e.g. the exported training run.
    #[serde(default)]
    pub name: Option<String>,
    pub input_width: usize,
    pub num_classes: usize,
    pub layers: Vec<DenseLayerParams>,
}

impl ClassifierParams {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json).context("parse model.json")?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let json = std::fs::read_to_string(path_ref)
            .with_context(|| format!("read {}", path_ref.display()))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.input_width > 0, "input_width must be > 0");
        anyhow::ensure!(self.num_classes > 0, "num_classes must be > 0");
        anyhow::ensure!(!self.layers.is_empty(), "model needs at least one layer");

        let mut width = self.input_width;
        for (i, layer) in self.layers.iter().enumerate() {
            anyhow::ensure!(
                layer.in_dim == width,
                "layer {i} expects {} inputs but previous width is {width}",
                layer.in_dim
            );
            anyhow::ensure!(layer.out_dim > 0, "layer {i} out_dim must be > 0");
            width = layer.out_dim;
        }
        anyhow::ensure!(
            width == self.num_classes,
            "last layer width {width} does not match num_classes {}",
            self.num_classes
        );

        let last = self.layers.last().map(|l| l.activation);
        anyhow::ensure!(
            last == Some(Activation::Softmax),
            "last layer must use softmax activation"
        );
        Ok(())
    }
}
