//! Micrograph loading and saving.
//!
//! Files are decoded with the `image` crate and converted to single-channel
//! `f32` in `[0, 1]`. Output is rescaled from the image's own min/max to the
//! full range of the chosen PNG bit depth.

use crate::config::OutputFormat;
use crate::core::{Image, ShapeError};
use image::{ImageBuffer, ImageFormat, Luma};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when reading or writing micrographs.
#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unsupported image layout in {path}: {rows}x{cols}")]
    Layout { path: PathBuf, rows: usize, cols: usize },

    #[error("{path} does not match the shape of its pair: {source}")]
    PairShape {
        path: PathBuf,
        #[source]
        source: ShapeError,
    },
}

/// Load any format the `image` crate decodes as a grayscale float image.
///
/// Color images are converted to luma.
pub fn load_micrograph(path: &Path) -> Result<Image, ImageIoError> {
    let decoded = image::open(path).map_err(|source| ImageIoError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let luma = decoded.to_luma32f();
    let (width, height) = luma.dimensions();
    if width == 0 || height == 0 {
        return Err(ImageIoError::Layout {
            path: path.to_path_buf(),
            rows: height as usize,
            cols: width as usize,
        });
    }
    Ok(Image::from_fn(height as usize, width as usize, |r, c| {
        luma.get_pixel(c as u32, r as u32)[0]
    }))
}

/// Affine map from the image's value range onto `[0, max]`.
/// A constant image maps to zero.
fn rescale(image: &Image, max: f32) -> impl Fn(f32) -> f32 {
    let lo = image.min();
    let hi = image.max();
    let range = hi - lo;
    move |v| {
        if range > 0.0 {
            ((v - lo) / range * max).round().clamp(0.0, max)
        } else {
            0.0
        }
    }
}

fn check_layout(path: &Path, image: &Image) -> Result<(u32, u32), ImageIoError> {
    let (rows, cols) = image.shape();
    match (u32::try_from(cols), u32::try_from(rows)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(ImageIoError::Layout {
            path: path.to_path_buf(),
            rows,
            cols,
        }),
    }
}

/// Save as an 8-bit grayscale PNG.
pub fn save_png8(path: &Path, image: &Image) -> Result<(), ImageIoError> {
    let (w, h) = check_layout(path, image)?;
    let map = rescale(image, u8::MAX as f32);
    let buf: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_fn(w, h, |x, y| Luma([map(image[(y as usize, x as usize)]) as u8]));
    buf.save_with_format(path, ImageFormat::Png)
        .map_err(|source| ImageIoError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

/// Save as a 16-bit grayscale PNG.
pub fn save_png16(path: &Path, image: &Image) -> Result<(), ImageIoError> {
    let (w, h) = check_layout(path, image)?;
    let map = rescale(image, u16::MAX as f32);
    let buf: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(w, h, |x, y| Luma([map(image[(y as usize, x as usize)]) as u16]));
    buf.save_with_format(path, ImageFormat::Png)
        .map_err(|source| ImageIoError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

pub fn save_micrograph(path: &Path, image: &Image, format: OutputFormat) -> Result<(), ImageIoError> {
    match format {
        OutputFormat::Png8 => save_png8(path, image),
        OutputFormat::Png16 => save_png16(path, image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> Image {
        Image::from_fn(6, 9, |r, c| (r * 9 + c) as f32 / 53.0)
    }

    #[test]
    fn test_png16_preserves_unit_range_ramp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.png");
        save_png16(&path, &ramp()).unwrap();

        let back = load_micrograph(&path).unwrap();
        assert_eq!(back.shape(), (6, 9));
        for (a, b) in back.iter().zip(ramp().iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_png8_rescales_to_full_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaled.png");
        let img = ramp() * 40.0 - Image::from_element(6, 9, 7.0);
        save_png8(&path, &img).unwrap();

        let back = load_micrograph(&path).unwrap();
        assert_eq!(back[(0, 0)], 0.0);
        assert_eq!(back[(5, 8)], 1.0);
    }

    #[test]
    fn test_constant_image_saves_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.png");
        save_micrograph(&path, &Image::from_element(3, 3, 5.0), OutputFormat::Png8).unwrap();
        let back = load_micrograph(&path).unwrap();
        assert!(back.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_png8(&dir.path().join("empty.png"), &Image::zeros(0, 4)).unwrap_err();
        assert!(matches!(err, ImageIoError::Layout { rows: 0, cols: 4, .. }));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = load_micrograph(Path::new("/nonexistent/mic.png")).unwrap_err();
        assert!(matches!(err, ImageIoError::Decode { .. }));
    }
}
