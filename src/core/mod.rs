//! Core data structures and model contracts.
//!
//! This module contains the fundamental types used throughout the system:
//! - `Image`: a single-channel float image (rows × columns)
//! - `Denoiser` / `Trainable`: the only view the rest of the crate has of a model
//! - `Device`: explicit execution selection, threaded through by callers
//!
//! All types here are "pure data" - no I/O, no training logic.

mod device;
mod image;
mod model;

// Re-export public types
pub use device::Device;
pub use image::{check_same_shape, mean_std, standardize, Image, Shape, ShapeError};
pub use model::{Denoiser, Trainable};
