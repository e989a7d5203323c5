//! Denoising models.
//!
//! - [`Identity`]: returns its input unchanged
//! - [`AffineFilter`]: learnable `k × k` linear filter with bias
//! - [`GaussianFilter`]: fixed Gaussian blur
//!
//! [`ModelKind`] wraps whichever of these a run selected so the binaries can
//! hand a single concrete type to the tiled engine.

mod affine;
mod conv;
mod gaussian;

pub use affine::AffineFilter;
pub use gaussian::{GaussianFilter, DEFAULT_SCALE};

use crate::config::DenoiseConfig;
use crate::core::{Denoiser, Image};
use crate::io::{load_filter, ModelIoError};
use std::path::Path;

/// Pass-through model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Identity;

impl Denoiser for Identity {
    fn forward(&self, x: &Image) -> Image {
        x.clone()
    }
}

/// A model selected at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelKind {
    Identity(Identity),
    Affine(AffineFilter),
    Gaussian(GaussianFilter),
}

impl ModelKind {
    /// Resolve the `model` field of an inference config.
    ///
    /// `none` and `gaussian` are built in; anything else is read as the path
    /// of a saved filter.
    pub fn from_config(cfg: &DenoiseConfig) -> Result<Self, ModelIoError> {
        match cfg.model.as_str() {
            "gaussian" => Ok(ModelKind::Gaussian(GaussianFilter::with_sigma(cfg.sigma))),
            name => load_model(name),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Identity(_) => "identity",
            ModelKind::Affine(_) => "affine",
            ModelKind::Gaussian(_) => "gaussian",
        }
    }
}

impl Denoiser for ModelKind {
    fn forward(&self, x: &Image) -> Image {
        match self {
            ModelKind::Identity(m) => m.forward(x),
            ModelKind::Affine(m) => m.forward(x),
            ModelKind::Gaussian(m) => m.forward(x),
        }
    }
}

/// Load a model by name: `none` is the identity, `gaussian` a unit-sigma
/// blur, and any other name a path to a saved [`AffineFilter`].
pub fn load_model(name: &str) -> Result<ModelKind, ModelIoError> {
    match name {
        "none" | "identity" => Ok(ModelKind::Identity(Identity)),
        "gaussian" => Ok(ModelKind::Gaussian(GaussianFilter::with_sigma(1.0))),
        path => {
            let (filter, _) = load_filter(Path::new(path))?;
            Ok(ModelKind::Affine(filter))
        }
    }
}
