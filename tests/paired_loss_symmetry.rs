//! Symmetric and one-directional noise2noise scoring.

use approx::assert_relative_eq;
use denoise_rs::data::{PairBatch, PairSample};
use denoise_rs::{Criterion, Device, Image, PairedLoss};

fn asymmetric_pair() -> PairSample {
    let x1 = Image::from_fn(6, 6, |r, c| (r as f32 - c as f32) * 0.4);
    let x2 = Image::from_fn(6, 6, |r, c| ((r * c) as f32).sqrt());
    PairSample::new(x1, x2).unwrap()
}

// Not symmetric under swapping its input, so the two directions disagree.
fn model(x: &Image) -> Image {
    x.map(|v| 0.8 * v + 0.3)
}

#[test]
fn test_symmetric_loss_is_invariant_to_swapping_views() {
    let s = asymmetric_pair();
    let policy = PairedLoss::new(0.5);
    for criterion in [Criterion::L1, Criterion::L2, Criterion::robust()] {
        let a = policy
            .evaluate(&model, &criterion, &PairBatch::new(vec![s.clone()]), Device::Cpu)
            .unwrap();
        let b = policy
            .evaluate(&model, &criterion, &PairBatch::new(vec![s.swapped()]), Device::Cpu)
            .unwrap();
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }
}

#[test]
fn test_one_directional_loss_depends_on_view_order() {
    let s = asymmetric_pair();
    let policy = PairedLoss::new(0.0);
    let a = policy
        .evaluate(&model, &Criterion::L2, &PairBatch::new(vec![s.clone()]), Device::Cpu)
        .unwrap();
    let b = policy
        .evaluate(&model, &Criterion::L2, &PairBatch::new(vec![s.swapped()]), Device::Cpu)
        .unwrap();
    assert!((a - b).abs() > 1e-3, "a={a} b={b}");
}

#[test]
fn test_symmetric_is_sum_of_both_directions() {
    let s = asymmetric_pair();
    let batch = PairBatch::new(vec![s.clone()]);
    let forward = PairedLoss::new(0.0)
        .evaluate(&model, &Criterion::L1, &batch, Device::Cpu)
        .unwrap();
    let reverse = PairedLoss::new(0.0)
        .evaluate(&model, &Criterion::L1, &PairBatch::new(vec![s.swapped()]), Device::Cpu)
        .unwrap();
    let both = PairedLoss::new(0.01)
        .evaluate(&model, &Criterion::L1, &batch, Device::Cpu)
        .unwrap();
    assert_relative_eq!(both, forward + reverse, epsilon = 1e-12);
}

#[test]
fn test_negative_weight_gradient_is_one_directional() {
    assert!(!PairedLoss::new(-1.0).is_symmetric());
    assert!(!PairedLoss::new(0.0).is_symmetric());
    assert!(PairedLoss::new(1e-6).is_symmetric());
}
