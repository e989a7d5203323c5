//! Noise2noise pair scoring.
//!
//! With two independent noisy views `x1`, `x2` of one signal, the model is
//! scored by how well `f(x1)` predicts `x2`. In symmetric mode the reverse
//! direction `f(x2)` vs `x1` is added as well. A view is never scored
//! against its own denoised output.
//!
//! Evaluation and training go through the same direction list and the same
//! criterion reduction; only gradient accumulation differs.

use crate::core::{check_same_shape, Denoiser, Device, Image, ShapeError, Trainable};
use crate::data::{PairBatch, PairSample};
use crate::optim::loss::Criterion;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    /// `f(x1)` scored against `x2`.
    Forward,
    /// `f(x2)` scored against `x1`.
    Reverse,
}

impl Direction {
    fn input(self, s: &PairSample) -> &Image {
        match self {
            Direction::Forward => s.x1(),
            Direction::Reverse => s.x2(),
        }
    }

    fn target(self, s: &PairSample) -> &Image {
        match self {
            Direction::Forward => s.x2(),
            Direction::Reverse => s.x1(),
        }
    }
}

/// Paired loss policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairedLoss {
    /// `> 0` scores both directions; otherwise only `f(x1)` vs `x2`.
    pub weight_gradient: f32,
}

impl PairedLoss {
    pub fn new(weight_gradient: f32) -> Self {
        Self { weight_gradient }
    }

    /// Both directions are scored.
    pub fn is_symmetric(&self) -> bool {
        self.weight_gradient > 0.0
    }

    fn directions(&self) -> &'static [Direction] {
        if self.is_symmetric() {
            &[Direction::Forward, Direction::Reverse]
        } else {
            &[Direction::Forward]
        }
    }

    /// Score a batch without touching any gradient state.
    pub fn evaluate<M>(
        &self,
        model: &M,
        criterion: &Criterion,
        batch: &PairBatch,
        device: Device,
    ) -> Result<f64, ShapeError>
    where
        M: Denoiser + Sync + ?Sized,
    {
        let mut total = 0.0f64;
        for &dir in self.directions() {
            let outputs = forward_batch(model, batch, dir, device)?;
            let targets = batch.samples().iter().map(|s| dir.target(s));
            total += criterion.loss(outputs.iter().zip(targets));
        }
        Ok(total)
    }

    /// Score a batch and accumulate dL/dθ into the model's gradient buffer.
    ///
    /// Parameters are not updated here; the loss value is identical to
    /// [`PairedLoss::evaluate`] on the same inputs.
    pub fn evaluate_and_backprop<M>(
        &self,
        model: &mut M,
        criterion: &Criterion,
        batch: &PairBatch,
    ) -> Result<f64, ShapeError>
    where
        M: Trainable + ?Sized,
    {
        let mut total = 0.0f64;
        for &dir in self.directions() {
            let mut outputs = Vec::with_capacity(batch.len());
            for s in batch.samples() {
                let x = dir.input(s);
                let y = model.forward(x);
                check_same_shape(x, &y)?;
                outputs.push(y);
            }

            let targets = batch.samples().iter().map(|s| dir.target(s));
            let (loss, d_outputs) = criterion.loss_and_grad(outputs.iter().zip(targets));

            for (s, d_y) in batch.samples().iter().zip(&d_outputs) {
                model.backward(dir.input(s), d_y);
            }
            total += loss;
        }
        Ok(total)
    }
}

fn forward_batch<M>(
    model: &M,
    batch: &PairBatch,
    dir: Direction,
    device: Device,
) -> Result<Vec<Image>, ShapeError>
where
    M: Denoiser + Sync + ?Sized,
{
    let run = |s: &PairSample| -> Result<Image, ShapeError> {
        let x = dir.input(s);
        let y = model.forward(x);
        check_same_shape(x, &y)?;
        Ok(y)
    };

    match device {
        Device::Cpu => batch.samples().iter().map(run).collect(),
        Device::Parallel => {
            use rayon::prelude::*;
            batch.samples().par_iter().map(run).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AffineFilter;
    use approx::assert_relative_eq;

    fn pair() -> PairSample {
        let x1 = Image::from_fn(5, 4, |r, c| ((r * 4 + c) as f32 * 0.7).sin());
        let x2 = Image::from_fn(5, 4, |r, c| ((r * 4 + c) as f32 * 0.3).cos());
        PairSample::new(x1, x2).unwrap()
    }

    #[test]
    fn test_asymmetric_scores_forward_direction_only() {
        let scale = |x: &Image| x * 0.5;
        let s = pair();
        let batch = PairBatch::new(vec![s.clone()]);
        let policy = PairedLoss::new(0.0);

        let loss = policy.evaluate(&scale, &Criterion::L2, &batch, Device::Cpu).unwrap();
        let expected = Criterion::L2.loss([(&(s.x1() * 0.5), s.x2())]);
        assert_eq!(loss, expected);
    }

    #[test]
    fn test_symmetric_adds_reverse_direction() {
        let scale = |x: &Image| x * 0.5;
        let s = pair();
        let batch = PairBatch::new(vec![s.clone()]);
        let policy = PairedLoss::new(0.01);

        let loss = policy.evaluate(&scale, &Criterion::L1, &batch, Device::Cpu).unwrap();
        let forward = Criterion::L1.loss([(&(s.x1() * 0.5), s.x2())]);
        let reverse = Criterion::L1.loss([(&(s.x2() * 0.5), s.x1())]);
        assert_relative_eq!(loss, forward + reverse, epsilon = 1e-12);
    }

    #[test]
    fn test_backprop_loss_matches_evaluate() {
        let mut model = AffineFilter::identity(3);
        model.params_and_grads().0[0] = 0.1;
        let batch = PairBatch::new(vec![pair(), pair().swapped()]);
        for policy in [PairedLoss::new(0.0), PairedLoss::new(1.0)] {
            let eval = policy.evaluate(&model, &Criterion::L2, &batch, Device::Cpu).unwrap();
            let train = policy.evaluate_and_backprop(&mut model, &Criterion::L2, &batch).unwrap();
            assert_eq!(eval, train);
        }
    }

    #[test]
    fn test_parallel_evaluate_matches_serial() {
        let model = AffineFilter::identity(3);
        let batch = PairBatch::new(vec![pair(), pair().swapped(), pair()]);
        let policy = PairedLoss::new(1.0);
        let serial = policy.evaluate(&model, &Criterion::L1, &batch, Device::Cpu).unwrap();
        let parallel = policy.evaluate(&model, &Criterion::L1, &batch, Device::Parallel).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_shape_changing_model_is_rejected() {
        let crop = |x: &Image| x.rows(0, x.nrows() - 1).into_owned();
        let batch = PairBatch::new(vec![pair()]);
        let err = PairedLoss::new(0.0)
            .evaluate(&crop, &Criterion::L2, &batch, Device::Cpu)
            .unwrap_err();
        assert_eq!(err.expected, (5, 4));
        assert_eq!(err.actual, (4, 4));
    }
}
