//! Learnable single-kernel linear filter.

use super::conv::{correlate_same, correlate_same_kernel_grad};
use crate::core::{Denoiser, Image, Trainable};
use serde::{Deserialize, Serialize};

/// `y = w ⋆ x + b` with one odd `size × size` kernel and zero "same"
/// padding.
///
/// Parameters are stored flat: the `size²` kernel weights in row-major
/// order followed by the bias.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineFilter {
    size: usize,
    params: Vec<f32>,
    #[serde(skip)]
    grads: Vec<f32>,
}

impl AffineFilter {
    /// All-zero filter. Panics if `size` is even.
    pub fn new(size: usize) -> Self {
        assert!(size % 2 == 1, "filter size must be odd, got {size}");
        let n = size * size + 1;
        Self {
            size,
            params: vec![0.0; n],
            grads: vec![0.0; n],
        }
    }

    /// Filter that reproduces its input.
    pub fn identity(size: usize) -> Self {
        let mut f = Self::new(size);
        let center = size / 2;
        f.params[center * size + center] = 1.0;
        f
    }

    /// Build from explicit weights. Returns `None` unless `weights` has
    /// `size²` entries for an odd `size`.
    pub fn from_weights(size: usize, weights: Vec<f32>, bias: f32) -> Option<Self> {
        if size % 2 == 0 || weights.len() != size * size {
            return None;
        }
        let mut params = weights;
        params.push(bias);
        let grads = vec![0.0; params.len()];
        Some(Self { size, params, grads })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn weights(&self) -> &[f32] {
        &self.params[..self.size * self.size]
    }

    pub fn bias(&self) -> f32 {
        self.params[self.size * self.size]
    }

    /// Whether the parameter vector matches the kernel size. Deserialized
    /// filters are checked with this before use.
    pub fn is_consistent(&self) -> bool {
        self.size % 2 == 1 && self.params.len() == self.size * self.size + 1
    }

    fn sync_grads(&mut self) {
        if self.grads.len() != self.params.len() {
            self.grads = vec![0.0; self.params.len()];
        }
    }
}

impl Denoiser for AffineFilter {
    fn forward(&self, x: &Image) -> Image {
        let mut y = correlate_same(x, self.weights(), self.size);
        y.add_scalar_mut(self.bias());
        y
    }
}

impl Trainable for AffineFilter {
    fn backward(&mut self, x: &Image, d_output: &Image) {
        self.sync_grads();
        let k = self.size * self.size;
        correlate_same_kernel_grad(x, d_output, self.size, &mut self.grads[..k]);
        self.grads[k] += d_output.iter().map(|&d| d as f64).sum::<f64>() as f32;
    }

    fn params_and_grads(&mut self) -> (&mut [f32], &mut [f32]) {
        self.sync_grads();
        (&mut self.params, &mut self.grads)
    }
}
