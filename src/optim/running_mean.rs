//! Streaming weighted mean of per-batch losses.
//!
//! Batches of an epoch arrive one at a time and the last one is usually
//! short. `RunningMean` keeps only `(mean, total_weight)` and folds each
//! `(value, weight)` observation in with the incremental update
//!
//! ```text
//! W += w
//! mean += w * (v - mean) / W
//! ```
//!
//! which equals `Σ w_i v_i / Σ w_i` up to rounding without ever holding the
//! unbounded raw sum.

/// O(1)-memory weighted running mean.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningMean {
    mean: f64,
    total_weight: u64,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one observation and return the updated mean.
    ///
    /// A zero-weight observation is skipped.
    pub fn update(&mut self, value: f64, weight: u64) -> f64 {
        if weight == 0 {
            return self.mean;
        }
        if self.total_weight == 0 {
            self.total_weight = weight;
            self.mean = value;
            return self.mean;
        }
        self.total_weight += weight;
        let w = weight as f64;
        self.mean += w * (value - self.mean) / self.total_weight as f64;
        self.mean
    }

    /// Current mean; 0 when nothing has been observed.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight == 0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
