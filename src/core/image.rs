//! Single-channel image representation.
//!
//! Images are `nalgebra::DMatrix<f32>` with `rows = height` and
//! `cols = width`. Pixel `(r, c)` is `image[(r, c)]`.

use nalgebra::DMatrix;
use thiserror::Error;

/// A 2-D array of float samples, shape (H, W).
pub type Image = DMatrix<f32>;

/// Image shape as `(rows, cols)`.
pub type Shape = (usize, usize);

/// A model produced an output whose shape differs from its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("shape mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
pub struct ShapeError {
    pub expected: Shape,
    pub actual: Shape,
}

/// Fail with `ShapeError` unless `actual` has the same shape as `expected`.
pub fn check_same_shape(expected: &Image, actual: &Image) -> Result<(), ShapeError> {
    if expected.shape() == actual.shape() {
        Ok(())
    } else {
        Err(ShapeError {
            expected: expected.shape(),
            actual: actual.shape(),
        })
    }
}

/// Mean and (population) standard deviation of all pixels.
///
/// Accumulates in f64; a 4k × 4k micrograph has 16M samples and f32 sums
/// drift noticeably at that size.
pub fn mean_std(image: &Image) -> (f32, f32) {
    let n = image.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mut sum = 0.0f64;
    for &v in image.iter() {
        sum += v as f64;
    }
    let mean = sum / n as f64;
    let mut var = 0.0f64;
    for &v in image.iter() {
        let d = v as f64 - mean;
        var += d * d;
    }
    (mean as f32, (var / n as f64).sqrt() as f32)
}

/// Standardize in place to zero mean and unit variance.
///
/// With `cutoff > 0`, standardized values outside `[-cutoff, cutoff]` are
/// set to zero (hot pixels, detector artifacts). A constant image is only
/// centered since its standard deviation is zero.
pub fn standardize(image: &mut Image, cutoff: f32) {
    let (mean, std) = mean_std(image);
    let scale = if std > 0.0 { 1.0 / std } else { 1.0 };
    for v in image.iter_mut() {
        *v = (*v - mean) * scale;
        if cutoff > 0.0 && (*v < -cutoff || *v > cutoff) {
            *v = 0.0;
        }
    }
}
