//! File I/O.
//!
//! - Micrographs: any format the `image` crate decodes, saved as PNG
//! - Saved filters: JSON weights plus training metadata

mod micrograph;
mod model;

pub use micrograph::{load_micrograph, save_micrograph, save_png16, save_png8, ImageIoError};
pub use model::{load_filter, save_filter, FilterMetadata, ModelIoError};
