//! Dense-layer ops used by the classifier.

use crate::math::{relu_inplace, sigmoid_inplace, softmax_inplace, tanh_inplace};
use crate::params::Activation;

/// Linear layer: `y = x * W^T + b`.
///
/// Shapes:
/// - `input`: `[n_rows, in_dim]`
/// - `weight`: `[out_dim, in_dim]`
/// - output: `[n_rows, out_dim]`
pub fn linear(
    input: &[f32],
    n_rows: usize,
    in_dim: usize,
    weight: &[f32],
    out_dim: usize,
    bias: Option<&[f32]>,
) -> Vec<f32> {
    debug_assert_eq!(input.len(), n_rows * in_dim);
    debug_assert_eq!(weight.len(), out_dim * in_dim);
    if let Some(b) = bias {
        debug_assert_eq!(b.len(), out_dim);
    }

    let mut out = vec![0.0f32; n_rows * out_dim];
    for r in 0..n_rows {
        let x = &input[r * in_dim..(r + 1) * in_dim];
        let y = &mut out[r * out_dim..(r + 1) * out_dim];
        for o in 0..out_dim {
            let w = &weight[o * in_dim..(o + 1) * in_dim];
            let mut sum = bias.map_or(0.0, |b| b[o]);
            for i in 0..in_dim {
                sum += x[i] * w[i];
            }
            y[o] = sum;
        }
    }
    out
}

/// Apply `act` row-wise over `[n_rows, dim]` data.
pub fn activate_rows(data: &mut [f32], dim: usize, act: Activation) {
    debug_assert!(dim > 0);
    debug_assert_eq!(data.len() % dim, 0);
    match act {
        Activation::Linear => {}
        Activation::Relu => relu_inplace(data),
        Activation::Tanh => tanh_inplace(data),
        Activation::Sigmoid => sigmoid_inplace(data),
        Activation::Softmax => {
            for row in data.chunks_exact_mut(dim) {
                softmax_inplace(row);
            }
        }
    }
}
