//! Saved filter format.
//!
//! A trained [`AffineFilter`] is written as one JSON document:
//!
//! ```text
//! {
//!   "magic": "DENOISE-FILTER",
//!   "version": 1,
//!   "metadata": { "epochs": .., "final_loss": .., "criterion": .., ... },
//!   "filter": { "size": k, "params": [k*k weights row-major, bias] }
//! }
//! ```
//!
//! Only weights are stored; optimizer state is not, so a saved filter can be
//! applied or used to seed a new run but not resumed mid-run.

use crate::models::AffineFilter;
use crate::optim::LossKind;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

const MAGIC: &str = "DENOISE-FILTER";
const VERSION: u32 = 1;

/// Error type for filter I/O.
#[derive(Debug, Error)]
pub enum ModelIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed filter file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid file magic (not a saved filter)")]
    InvalidMagic,

    #[error("unsupported filter file version: {0}")]
    UnsupportedVersion(u32),

    #[error("invalid filter data: {0}")]
    InvalidData(String),
}

/// Training provenance stored next to the weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterMetadata {
    /// Epochs completed when the filter was saved.
    pub epochs: usize,
    /// Training loss of the last completed epoch.
    pub final_loss: Option<f64>,
    pub criterion: Option<LossKind>,
    /// Pair list the filter was trained on.
    pub dataset_path: String,
    /// RFC 3339 timestamp of the save.
    pub created: String,
}

#[derive(Serialize, Deserialize)]
struct FilterFile {
    magic: String,
    version: u32,
    #[serde(default)]
    metadata: FilterMetadata,
    filter: AffineFilter,
}

/// Save a filter and its metadata.
pub fn save_filter<P: AsRef<Path>>(
    path: P,
    filter: &AffineFilter,
    metadata: &FilterMetadata,
) -> Result<(), ModelIoError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let doc = FilterFile {
        magic: MAGIC.to_string(),
        version: VERSION,
        metadata: metadata.clone(),
        filter: filter.clone(),
    };
    serde_json::to_writer_pretty(&mut writer, &doc)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Load a filter saved by [`save_filter`].
pub fn load_filter<P: AsRef<Path>>(path: P) -> Result<(AffineFilter, FilterMetadata), ModelIoError> {
    let file = File::open(path)?;
    let doc: FilterFile = serde_json::from_reader(BufReader::new(file))?;

    if doc.magic != MAGIC {
        return Err(ModelIoError::InvalidMagic);
    }
    if doc.version != VERSION {
        return Err(ModelIoError::UnsupportedVersion(doc.version));
    }
    if !doc.filter.is_consistent() {
        return Err(ModelIoError::InvalidData(format!(
            "kernel size {} does not match parameter count",
            doc.filter.size()
        )));
    }
    Ok((doc.filter, doc.metadata))
}
