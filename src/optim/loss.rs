//! Pixelwise loss criteria.
//!
//! Every criterion reduces with the mean over all pixels of all images in a
//! batch, and comes with its exact gradient w.r.t. the model outputs.

use crate::core::Image;
use serde::{Deserialize, Serialize};

/// Default epsilon added inside the robust loss.
pub const ROBUST_EPS: f32 = 1e-8;

/// Criterion selector, as written in configs and on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    L1,
    L2,
    /// `mean((|y - t| + eps)^gamma)`, with gamma annealed during training.
    #[serde(alias = "l0")]
    Robust,
}

impl std::str::FromStr for LossKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" => Ok(LossKind::L1),
            "l2" | "mse" => Ok(LossKind::L2),
            "l0" | "robust" => Ok(LossKind::Robust),
            other => Err(format!("unknown criterion '{other}' (expected L1|L2|L0)")),
        }
    }
}

/// A loss criterion with its runtime state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Criterion {
    L1,
    L2,
    Robust { gamma: f32, eps: f32 },
}

impl From<LossKind> for Criterion {
    fn from(kind: LossKind) -> Self {
        match kind {
            LossKind::L1 => Criterion::L1,
            LossKind::L2 => Criterion::L2,
            LossKind::Robust => Criterion::robust(),
        }
    }
}

impl Criterion {
    /// Robust loss starting at `gamma = 2`.
    pub fn robust() -> Self {
        Criterion::Robust {
            gamma: 2.0,
            eps: ROBUST_EPS,
        }
    }

    pub fn kind(&self) -> LossKind {
        match self {
            Criterion::L1 => LossKind::L1,
            Criterion::L2 => LossKind::L2,
            Criterion::Robust { .. } => LossKind::Robust,
        }
    }

    /// Current exponent, for the robust criterion only.
    pub fn gamma(&self) -> Option<f32> {
        match self {
            Criterion::Robust { gamma, .. } => Some(*gamma),
            _ => None,
        }
    }

    /// Set the robust exponent. Returns `false` (and does nothing) for L1/L2.
    pub fn set_gamma(&mut self, value: f32) -> bool {
        match self {
            Criterion::Robust { gamma, .. } => {
                *gamma = value;
                true
            }
            _ => false,
        }
    }

    /// Loss contribution of one residual `d = output - target`, and its derivative.
    fn pointwise(&self, d: f32) -> (f64, f32) {
        match *self {
            Criterion::L1 => (d.abs() as f64, sign(d)),
            Criterion::L2 => ((d as f64) * (d as f64), 2.0 * d),
            Criterion::Robust { gamma, eps } => {
                let a = d.abs() + eps;
                let value = (a as f64).powf(gamma as f64);
                // d/dd (|d| + eps)^g = g (|d| + eps)^(g-1) sign(d)
                let deriv = if d == 0.0 || gamma == 0.0 {
                    0.0
                } else {
                    gamma * a.powf(gamma - 1.0) * sign(d)
                };
                (value, deriv)
            }
        }
    }

    /// Mean loss over every pixel of every `(output, target)` pair.
    ///
    /// An empty batch scores zero.
    pub fn loss<'a, I>(&self, pairs: I) -> f64
    where
        I: IntoIterator<Item = (&'a Image, &'a Image)>,
    {
        let mut sum = 0.0f64;
        let mut n = 0usize;
        for (output, target) in pairs {
            assert_eq!(output.shape(), target.shape());
            for (&y, &t) in output.iter().zip(target.iter()) {
                sum += self.pointwise(y - t).0;
            }
            n += output.len();
        }
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }

    /// Mean loss plus dL/d(output) for each pair, in pair order.
    ///
    /// The loss value is computed exactly as in [`Criterion::loss`].
    pub fn loss_and_grad<'a, I>(&self, pairs: I) -> (f64, Vec<Image>)
    where
        I: IntoIterator<Item = (&'a Image, &'a Image)>,
    {
        let mut sum = 0.0f64;
        let mut n = 0usize;
        let mut grads = Vec::new();
        for (output, target) in pairs {
            assert_eq!(output.shape(), target.shape());
            let mut d = Image::zeros(output.nrows(), output.ncols());
            for ((g, &y), &t) in d.iter_mut().zip(output.iter()).zip(target.iter()) {
                let (value, deriv) = self.pointwise(y - t);
                sum += value;
                *g = deriv;
            }
            n += output.len();
            grads.push(d);
        }
        if n == 0 {
            return (0.0, grads);
        }
        let scale = 1.0 / n as f32;
        for g in &mut grads {
            *g *= scale;
        }
        (sum / n as f64, grads)
    }
}

/// Robust-loss exponent for a 1-based `epoch` of `num_epochs`.
///
/// Linear from 2 at the first epoch toward 0: `2 - 2 * (epoch - 1) / num_epochs`.
pub fn annealed_gamma(epoch: usize, num_epochs: usize) -> f32 {
    if num_epochs == 0 {
        return 2.0;
    }
    (2.0 - 2.0 * (epoch.saturating_sub(1)) as f64 / num_epochs as f64) as f32
}

fn sign(d: f32) -> f32 {
    if d > 0.0 {
        1.0
    } else if d < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_pair() -> (Image, Image) {
        let out = Image::from_fn(6, 5, |r, c| ((r * 5 + c) as f32 * 0.37).sin());
        let tgt = Image::from_fn(6, 5, |r, c| ((r + 2 * c) as f32 * 0.21).cos() * 0.5);
        (out, tgt)
    }

    #[test]
    fn test_l1_and_l2_on_single_pixel() {
        let out = Image::from_element(1, 1, 0.25);
        let tgt = Image::from_element(1, 1, 1.0);
        assert_relative_eq!(Criterion::L1.loss([(&out, &tgt)]), 0.75, epsilon = 1e-7);
        assert_relative_eq!(Criterion::L2.loss([(&out, &tgt)]), 0.5625, epsilon = 1e-7);
    }

    #[test]
    fn test_loss_is_mean_over_whole_batch() {
        let a = Image::from_element(2, 2, 1.0);
        let b = Image::from_element(1, 4, 3.0);
        let zero_a = Image::zeros(2, 2);
        let zero_b = Image::zeros(1, 4);
        // 4 pixels with |d|=1 and 4 with |d|=3.
        let l = Criterion::L1.loss([(&a, &zero_a), (&b, &zero_b)]);
        assert_relative_eq!(l, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_robust_with_gamma_two_matches_l2() {
        let (out, tgt) = sample_pair();
        let l2 = Criterion::L2.loss([(&out, &tgt)]);
        let robust = Criterion::robust().loss([(&out, &tgt)]);
        assert_relative_eq!(robust, l2, epsilon = 1e-6);
    }

    #[test]
    fn test_robust_with_gamma_zero_is_constant() {
        let (out, tgt) = sample_pair();
        let c = Criterion::Robust { gamma: 0.0, eps: ROBUST_EPS };
        let (loss, grads) = c.loss_and_grad([(&out, &tgt)]);
        assert_relative_eq!(loss, 1.0, epsilon = 1e-12);
        assert!(grads[0].iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_loss_and_grad_value_matches_loss() {
        let (out, tgt) = sample_pair();
        for c in [Criterion::L1, Criterion::L2, Criterion::Robust { gamma: 1.3, eps: ROBUST_EPS }] {
            let (l, _) = c.loss_and_grad([(&out, &tgt)]);
            assert_eq!(l, c.loss([(&out, &tgt)]));
        }
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let (mut out, tgt) = sample_pair();
        let eps = 1e-3f32;
        for c in [Criterion::L1, Criterion::L2, Criterion::Robust { gamma: 1.5, eps: ROBUST_EPS }] {
            let (_, grads) = c.loss_and_grad([(&out, &tgt)]);
            for &(r, col) in &[(0usize, 0usize), (2, 3), (5, 4)] {
                let base = out[(r, col)];
                out[(r, col)] = base + eps;
                let lp = c.loss([(&out, &tgt)]);
                out[(r, col)] = base - eps;
                let lm = c.loss([(&out, &tgt)]);
                out[(r, col)] = base;

                let numerical = ((lp - lm) / (2.0 * eps as f64)) as f32;
                let analytical = grads[0][(r, col)];
                assert!(
                    (numerical - analytical).abs() < 1e-3,
                    "{c:?} at ({r},{col}): numerical={numerical} analytical={analytical}"
                );
            }
        }
    }

    #[test]
    fn test_empty_batch_scores_zero() {
        let (loss, grads) = Criterion::L2.loss_and_grad(std::iter::empty());
        assert_eq!(loss, 0.0);
        assert!(grads.is_empty());
    }

    #[test]
    fn test_annealed_gamma_four_epochs() {
        let seq: Vec<f32> = (1..=4).map(|e| annealed_gamma(e, 4)).collect();
        assert_eq!(seq, vec![2.0, 1.5, 1.0, 0.5]);
    }

    #[test]
    fn test_set_gamma_only_affects_robust() {
        let mut c = Criterion::robust();
        assert!(c.set_gamma(0.75));
        assert_eq!(c.gamma(), Some(0.75));

        let mut l1 = Criterion::L1;
        assert!(!l1.set_gamma(0.75));
        assert_eq!(l1.gamma(), None);
    }

    #[test]
    fn test_loss_kind_parses_original_names() {
        assert_eq!("L0".parse::<LossKind>().unwrap(), LossKind::Robust);
        assert_eq!("L1".parse::<LossKind>().unwrap(), LossKind::L1);
        assert_eq!("l2".parse::<LossKind>().unwrap(), LossKind::L2);
        assert!("huber".parse::<LossKind>().is_err());
        assert_eq!(Criterion::from(LossKind::Robust).gamma(), Some(2.0));
    }
}
