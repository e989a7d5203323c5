//! Zero-padded "same" correlation kernels shared by the filter models.

use crate::core::Image;

/// Range of output indices `i` in `0..len` for which `i + offset` is also
/// in `0..len`.
fn valid_range(len: usize, offset: isize) -> std::ops::Range<usize> {
    let start = (-offset).max(0) as usize;
    let end = (len as isize - offset).clamp(0, len as isize) as usize;
    start.min(end)..end
}

/// 2-D correlation of `x` with a square `size × size` kernel (row-major),
/// output the same shape as `x`. Samples outside `x` read as zero.
pub(crate) fn correlate_same(x: &Image, kernel: &[f32], size: usize) -> Image {
    debug_assert_eq!(kernel.len(), size * size);
    let (rows, cols) = x.shape();
    let half = (size / 2) as isize;
    let mut y = Image::zeros(rows, cols);

    for u in 0..size {
        let du = u as isize - half;
        let row_range = valid_range(rows, du);
        for v in 0..size {
            let w = kernel[u * size + v];
            if w == 0.0 {
                continue;
            }
            let dv = v as isize - half;
            let col_range = valid_range(cols, dv);
            for c in col_range.clone() {
                let sc = (c as isize + dv) as usize;
                for r in row_range.clone() {
                    let sr = (r as isize + du) as usize;
                    y[(r, c)] += w * x[(sr, sc)];
                }
            }
        }
    }
    y
}

/// Gradient of `correlate_same` with respect to the kernel, added into
/// `d_kernel`.
pub(crate) fn correlate_same_kernel_grad(x: &Image, d_output: &Image, size: usize, d_kernel: &mut [f32]) {
    debug_assert_eq!(x.shape(), d_output.shape());
    let (rows, cols) = x.shape();
    let half = (size / 2) as isize;

    for u in 0..size {
        let du = u as isize - half;
        let row_range = valid_range(rows, du);
        for v in 0..size {
            let dv = v as isize - half;
            let col_range = valid_range(cols, dv);
            let mut acc = 0.0f64;
            for c in col_range.clone() {
                let sc = (c as isize + dv) as usize;
                for r in row_range.clone() {
                    let sr = (r as isize + du) as usize;
                    acc += (d_output[(r, c)] * x[(sr, sc)]) as f64;
                }
            }
            d_kernel[u * size + v] += acc as f32;
        }
    }
}

/// Separable pass: correlate every column (`along_rows = true`) or every row
/// with the odd-length `taps`.
pub(crate) fn correlate_axis(x: &Image, taps: &[f32], along_rows: bool) -> Image {
    let (rows, cols) = x.shape();
    let half = (taps.len() / 2) as isize;
    let len = if along_rows { rows } else { cols };
    let mut y = Image::zeros(rows, cols);

    for (k, &w) in taps.iter().enumerate() {
        let d = k as isize - half;
        for i in valid_range(len, d) {
            let s = (i as isize + d) as usize;
            if along_rows {
                for c in 0..cols {
                    y[(i, c)] += w * x[(s, c)];
                }
            } else {
                for r in 0..rows {
                    y[(r, i)] += w * x[(r, s)];
                }
            }
        }
    }
    y
}
