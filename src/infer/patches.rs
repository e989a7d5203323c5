//! Patch geometry for tiled inference.
//!
//! A pass covers the image with a regular grid of `patch_size` tiles. Each
//! tile is grown by `padding` pixels of context on every side and clamped to
//! the image bounds; the model sees the grown (outer) box, and only the tile
//! (inner) box of its output is kept.
//!
//! Clamping is asymmetric at the borders: an edge tile gets less context on
//! the side facing the border rather than wrapped or reflected pixels.

/// An axis-aligned pixel rectangle `[row, row+rows) × [col, col+cols)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Region {
    pub fn new(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self { row, col, rows, cols }
    }

    pub fn row_end(&self) -> usize {
        self.row + self.rows
    }

    pub fn col_end(&self) -> usize {
        self.col + self.cols
    }

    pub fn area(&self) -> usize {
        self.rows * self.cols
    }

    pub fn contains(&self, other: &Region) -> bool {
        other.row >= self.row
            && other.col >= self.col
            && other.row_end() <= self.row_end()
            && other.col_end() <= self.col_end()
    }

    pub fn intersects(&self, other: &Region) -> bool {
        self.row < other.row_end()
            && other.row < self.row_end()
            && self.col < other.col_end()
            && other.col < self.col_end()
    }
}

/// One tile of a tiled pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchBox {
    /// Region fed to the model, including the padding halo.
    pub outer: Region,
    /// Region of the output this patch is authoritative for.
    pub inner: Region,
}

impl PatchBox {
    /// Position of the inner box inside the model output for `outer`.
    pub fn core_offset(&self) -> (usize, usize) {
        (self.inner.row - self.outer.row, self.inner.col - self.outer.col)
    }
}

/// Tile size to use for a `(rows, cols)` image, or `None` for the
/// whole-image path.
///
/// Tiling is used only when `patch_size > 0` and `patch_size + padding` is
/// smaller than at least one image dimension.
pub fn tile_size(shape: (usize, usize), patch_size: i64, padding: usize) -> Option<usize> {
    if patch_size <= 0 {
        return None;
    }
    let patch = patch_size as usize;
    let span = patch.saturating_add(padding);
    let (rows, cols) = shape;
    if span < rows || span < cols {
        Some(patch)
    } else {
        None
    }
}

/// Plan all patches of one pass over a `rows × cols` image, in row-major
/// tile order.
///
/// The inner boxes tile the image exactly; every outer box contains its
/// inner box. `patch_size` must be non-zero.
pub fn plan_patches(rows: usize, cols: usize, patch_size: usize, padding: usize) -> Vec<PatchBox> {
    assert!(patch_size > 0, "patch_size must be positive");
    let mut plan = Vec::with_capacity(rows.div_ceil(patch_size) * cols.div_ceil(patch_size));

    for i in (0..rows).step_by(patch_size) {
        let si = i.saturating_sub(padding);
        let ei = rows.min(i + patch_size + padding);
        let inner_rows = patch_size.min(rows - i);

        for j in (0..cols).step_by(patch_size) {
            let sj = j.saturating_sub(padding);
            let ej = cols.min(j + patch_size + padding);
            let inner_cols = patch_size.min(cols - j);

            plan.push(PatchBox {
                outer: Region::new(si, sj, ei - si, ej - sj),
                inner: Region::new(i, j, inner_rows, inner_cols),
            });
        }
    }

    plan
}
