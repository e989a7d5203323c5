//! Inference over images larger than a model's practical input size.
//!
//! - `patches`: tile grid and halo geometry
//! - `tiled`: the stitching engine (serial and rayon-parallel)

pub mod patches;
mod tiled;

pub use patches::{plan_patches, tile_size, PatchBox, Region};
pub use tiled::{denoise, denoise_parallel, TiledDenoiser, DEFAULT_PADDING};
