//! # denoise-rs: noise2noise denoising for large micrographs
//!
//! This crate trains and applies image-denoising models in the noise2noise
//! style: a model learns to map one noisy observation of a signal onto a
//! second, independent noisy observation of the same signal, so no clean
//! ground truth is ever needed.
//!
//! ## Architecture
//!
//! - `core`: Image type, the `Denoiser`/`Trainable` model contracts, device selection
//! - `infer`: Tiled inference for images larger than a model's memory budget
//! - `optim`: Losses, running-mean aggregation, paired scoring, optimizers, training loop
//! - `models`: Small concrete denoisers (identity, learnable filter, Gaussian blur)
//! - `data`: In-memory paired datasets and batch loading
//! - `io`: Micrograph and model file I/O
//! - `config`: Serializable run configuration
//!
//! The model itself is always an opaque `Image -> Image` function. Nothing in
//! `infer` or `optim` knows anything about network topology.

// Core data structures and model contracts
pub mod core;

// Tiled inference
pub mod infer;

// Losses, aggregation and the training loop
pub mod optim;

// Concrete denoisers
pub mod models;

// Datasets and batching
pub mod data;

// File I/O
pub mod io;

// Run configuration
pub mod config;

// Re-export commonly used types at crate root for convenience
pub use crate::core::{Denoiser, Device, Image, ShapeError, Trainable};
pub use crate::infer::{denoise, TiledDenoiser};
pub use crate::optim::{Criterion, EpochSummary, PairedLoss, RunningMean, Trainer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
