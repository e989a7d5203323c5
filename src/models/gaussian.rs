//! Fixed Gaussian blur.

use super::conv::correlate_axis;
use crate::core::{Denoiser, Image};
use serde::{Deserialize, Serialize};

/// Default truncation, in multiples of sigma.
pub const DEFAULT_SCALE: f32 = 5.0;

/// Separable Gaussian low-pass filter truncated at `scale * sigma` pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianFilter {
    sigma: f32,
    scale: f32,
    #[serde(skip)]
    taps: Vec<f32>,
}

impl GaussianFilter {
    pub fn new(sigma: f32, scale: f32) -> Self {
        Self {
            sigma,
            scale,
            taps: kernel(sigma, scale),
        }
    }

    pub fn with_sigma(sigma: f32) -> Self {
        Self::new(sigma, DEFAULT_SCALE)
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Normalized 1-D taps, length `2 * ceil(scale * sigma) + 1`.
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }
}

fn kernel(sigma: f32, scale: f32) -> Vec<f32> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }
    let radius = (scale * sigma).ceil().max(0.0) as i64;
    let mut taps: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    for t in &mut taps {
        *t /= sum;
    }
    taps
}

impl Denoiser for GaussianFilter {
    fn forward(&self, x: &Image) -> Image {
        // Deserialized filters carry no taps.
        let rebuilt;
        let taps = if self.taps.is_empty() {
            rebuilt = kernel(self.sigma, self.scale);
            &rebuilt
        } else {
            &self.taps
        };
        let y = correlate_axis(x, taps, true);
        correlate_axis(&y, taps, false)
    }
}
