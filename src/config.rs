//! Run configuration.
//!
//! Both binaries start from `Default`, optionally overlay a JSON file, and
//! then apply command-line overrides. Missing JSON fields keep their
//! defaults.

use crate::core::Device;
use crate::infer::DEFAULT_PADDING;
use crate::optim::{LossKind, OptimizerKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Read a JSON config file into `T`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Noise2noise training settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub lr: f32,
    pub optimizer: OptimizerKind,
    pub criterion: LossKind,
    /// `> 0` scores both directions of each pair.
    pub weight_gradient: f32,
    pub batch_size: usize,
    pub num_epochs: usize,
    pub shuffle: bool,
    pub seed: Option<u64>,
    pub device: Device,
    /// Standardized values beyond ±cutoff are zeroed on load (0 disables).
    pub cutoff: f32,
    /// Kernel width of the learnable filter (odd).
    pub filter_size: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            lr: 0.001,
            optimizer: OptimizerKind::Adagrad,
            criterion: LossKind::L2,
            weight_gradient: 0.01,
            batch_size: 10,
            num_epochs: 100,
            shuffle: true,
            seed: None,
            device: Device::Cpu,
            cutoff: 0.0,
            filter_size: 11,
        }
    }
}

impl TrainConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let cfg: Self = load_json(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(ConfigError::Invalid(format!("lr must be positive, got {}", self.lr)));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.filter_size % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "filter_size must be odd, got {}",
                self.filter_size
            )));
        }
        if self.cutoff < 0.0 {
            return Err(ConfigError::Invalid(format!("cutoff must be >= 0, got {}", self.cutoff)));
        }
        Ok(())
    }
}

/// Inference settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Tile size; `<= 0` runs on the whole image.
    pub patch_size: i64,
    pub padding: usize,
    pub device: Device,
    /// `none`, `gaussian`, or a path to a saved filter.
    pub model: String,
    /// Gaussian sigma, used with `model = "gaussian"`.
    pub sigma: f32,
    /// Standardize inputs before denoising.
    pub normalize: bool,
    pub output_format: OutputFormat,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            patch_size: -1,
            padding: DEFAULT_PADDING,
            device: Device::Cpu,
            model: "none".to_string(),
            sigma: 1.0,
            normalize: false,
            output_format: OutputFormat::Png8,
        }
    }
}

impl DenoiseConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let cfg: Self = load_json(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model == "gaussian" && !(self.sigma > 0.0) {
            return Err(ConfigError::Invalid(format!("sigma must be positive, got {}", self.sigma)));
        }
        Ok(())
    }
}

/// Output encoding for denoised micrographs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png8,
    Png16,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" | "png8" => Ok(OutputFormat::Png8),
            "png16" => Ok(OutputFormat::Png16),
            other => Err(format!("unknown output format '{other}' (expected png8|png16)")),
        }
    }
}
