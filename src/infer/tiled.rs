//! Tiled inference engine.
//!
//! Large micrographs are denoised patch by patch: each patch is run through
//! the model with a halo of context, and only the halo-free core of each
//! result is stitched into the output. With an exact tiling of the cores
//! the output has no seams and no pixel is written twice.

use super::patches::{plan_patches, tile_size, PatchBox};
use crate::core::{check_same_shape, Denoiser, Device, Image, ShapeError};
use tracing::debug;

/// Default halo width, in pixels.
pub const DEFAULT_PADDING: usize = 128;

/// Denoise `image` with `model`, tiling when the image is large.
///
/// With `patch_size <= 0`, or when `patch_size + padding` is not smaller
/// than either image dimension, the model runs once on the whole image.
/// Otherwise the image is processed as a grid of `patch_size` tiles, each
/// given `padding` pixels of context.
///
/// Fails with `ShapeError` as soon as any model call returns an output of a
/// different shape than its input; no partial canvas is returned.
pub fn denoise<M>(model: &M, image: &Image, patch_size: i64, padding: usize) -> Result<Image, ShapeError>
where
    M: Denoiser + ?Sized,
{
    let Some(patch) = tile_size(image.shape(), patch_size, padding) else {
        return forward_checked(model, image);
    };

    let (rows, cols) = image.shape();
    let plan = plan_patches(rows, cols, patch, padding);
    debug!(rows, cols, patch, padding, tiles = plan.len(), "tiled denoise");

    let mut canvas = Image::zeros(rows, cols);
    for p in &plan {
        let out = forward_patch(model, image, p)?;
        write_core(&mut canvas, p, &out);
    }
    Ok(canvas)
}

/// Same as [`denoise`], running independent tiles on the rayon pool.
///
/// Tiles only ever write their own inner box, and inner boxes never
/// overlap, so results are identical to the serial pass.
pub fn denoise_parallel<M>(
    model: &M,
    image: &Image,
    patch_size: i64,
    padding: usize,
) -> Result<Image, ShapeError>
where
    M: Denoiser + Sync + ?Sized,
{
    use rayon::prelude::*;

    let Some(patch) = tile_size(image.shape(), patch_size, padding) else {
        return forward_checked(model, image);
    };

    let (rows, cols) = image.shape();
    let plan = plan_patches(rows, cols, patch, padding);
    debug!(rows, cols, patch, padding, tiles = plan.len(), "parallel tiled denoise");

    // Keep only the cores so peak memory stays at one output image.
    let cores: Vec<Image> = plan
        .par_iter()
        .map(|p| -> Result<Image, ShapeError> {
            let out = forward_patch(model, image, p)?;
            let (dr, dc) = p.core_offset();
            Ok(out.view((dr, dc), (p.inner.rows, p.inner.cols)).into_owned())
        })
        .collect::<Result<_, _>>()?;

    let mut canvas = Image::zeros(rows, cols);
    for (p, core) in plan.iter().zip(&cores) {
        canvas
            .view_mut((p.inner.row, p.inner.col), (p.inner.rows, p.inner.cols))
            .copy_from(core);
    }
    Ok(canvas)
}

fn forward_checked<M>(model: &M, x: &Image) -> Result<Image, ShapeError>
where
    M: Denoiser + ?Sized,
{
    let y = model.forward(x);
    check_same_shape(x, &y)?;
    Ok(y)
}

fn forward_patch<M>(model: &M, image: &Image, p: &PatchBox) -> Result<Image, ShapeError>
where
    M: Denoiser + ?Sized,
{
    let o = &p.outer;
    let x = image.view((o.row, o.col), (o.rows, o.cols)).into_owned();
    forward_checked(model, &x)
}

fn write_core(canvas: &mut Image, p: &PatchBox, out: &Image) {
    let (dr, dc) = p.core_offset();
    let i = &p.inner;
    canvas
        .view_mut((i.row, i.col), (i.rows, i.cols))
        .copy_from(&out.view((dr, dc), (i.rows, i.cols)));
}

/// Tiled inference settings bundled with a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TiledDenoiser {
    pub patch_size: i64,
    pub padding: usize,
    pub device: Device,
}

impl Default for TiledDenoiser {
    fn default() -> Self {
        Self {
            patch_size: -1,
            padding: DEFAULT_PADDING,
            device: Device::Cpu,
        }
    }
}

impl TiledDenoiser {
    pub fn new(patch_size: i64, padding: usize) -> Self {
        Self {
            patch_size,
            padding,
            ..Self::default()
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Whether an image of this shape would be split into tiles.
    pub fn is_tiled(&self, shape: (usize, usize)) -> bool {
        tile_size(shape, self.patch_size, self.padding).is_some()
    }

    pub fn apply<M>(&self, model: &M, image: &Image) -> Result<Image, ShapeError>
    where
        M: Denoiser + Sync + ?Sized,
    {
        match self.device {
            Device::Cpu => denoise(model, image, self.patch_size, self.padding),
            Device::Parallel => denoise_parallel(model, image, self.patch_size, self.padding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_whole_image_path_calls_model_once() {
        let calls = Cell::new(0usize);
        let model = |x: &Image| {
            calls.set(calls.get() + 1);
            x.clone()
        };
        let img = Image::from_fn(30, 30, |r, c| (r + c) as f32);

        let out = denoise(&model, &img, 16, 20).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(out, img);
    }

    #[test]
    fn test_tiled_path_calls_model_per_tile() {
        let calls = Cell::new(0usize);
        let model = |x: &Image| {
            calls.set(calls.get() + 1);
            x.clone()
        };
        let img = Image::from_fn(40, 24, |r, c| (r * 24 + c) as f32);

        let out = denoise(&model, &img, 10, 2).unwrap();
        // ceil(40/10) * ceil(24/10) = 4 * 3
        assert_eq!(calls.get(), 12);
        assert_eq!(out, img);
    }

    #[test]
    fn test_model_sees_clamped_outer_regions() {
        let shapes = std::sync::Mutex::new(Vec::new());
        let model = |x: &Image| {
            shapes.lock().unwrap().push(x.shape());
            x.clone()
        };
        let img = Image::zeros(64, 64);
        denoise(&model, &img, 32, 8).unwrap();
        assert_eq!(*shapes.lock().unwrap(), vec![(40, 40), (40, 40), (40, 40), (40, 40)]);
    }

    #[test]
    fn test_shape_error_aborts_whole_pass() {
        let model = |x: &Image| {
            if x.nrows() > 20 {
                Image::zeros(x.nrows() - 1, x.ncols())
            } else {
                x.clone()
            }
        };
        let img = Image::zeros(50, 50);
        let err = denoise(&model, &img, 16, 8).unwrap_err();
        assert_eq!(err.actual.0 + 1, err.expected.0);
    }

    #[test]
    fn test_shape_error_on_whole_image_path() {
        let model = |x: &Image| Image::zeros(x.ncols(), x.nrows());
        let img = Image::zeros(5, 7);
        let err = denoise(&model, &img, -1, 0).unwrap_err();
        assert_eq!(err, ShapeError { expected: (5, 7), actual: (7, 5) });
    }

    #[test]
    fn test_tiled_denoiser_defaults_to_whole_image() {
        let t = TiledDenoiser::default();
        assert_eq!(t.patch_size, -1);
        assert_eq!(t.padding, 128);
        assert!(!t.is_tiled((4096, 4096)));
        assert!(TiledDenoiser::new(1024, 128).is_tiled((4096, 4096)));
    }
}
