//! In-memory paired dataset and a shuffling batch loader.

use super::{BatchSource, PairBatch, PairSample};
use crate::core::standardize;
use crate::io::{load_micrograph, ImageIoError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::debug;

/// All samples of a dataset, held in memory.
#[derive(Clone, Debug, Default)]
pub struct PairedDataset {
    samples: Vec<PairSample>,
}

impl PairedDataset {
    pub fn new(samples: Vec<PairSample>) -> Self {
        Self { samples }
    }

    /// Load `(x1, x2)` micrograph pairs from disk.
    ///
    /// Every image is standardized independently (zero mean, unit std);
    /// with `cutoff > 0` standardized outliers beyond ±cutoff are zeroed.
    pub fn load<P: AsRef<Path>>(pairs: &[(P, P)], cutoff: f32) -> Result<Self, ImageIoError> {
        let mut samples = Vec::with_capacity(pairs.len());
        for (p1, p2) in pairs {
            let mut x1 = load_micrograph(p1.as_ref())?;
            let mut x2 = load_micrograph(p2.as_ref())?;
            standardize(&mut x1, cutoff);
            standardize(&mut x2, cutoff);
            let sample = PairSample::new(x1, x2).map_err(|e| ImageIoError::PairShape {
                path: p2.as_ref().to_path_buf(),
                source: e,
            })?;
            samples.push(sample);
        }
        debug!(samples = samples.len(), "loaded paired dataset");
        Ok(Self { samples })
    }

    pub fn push(&mut self, sample: PairSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[PairSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Parse a pair list: one `x1 x2` pair of paths per line.
///
/// Blank lines and lines starting with `#` are skipped. Relative paths are
/// resolved against `base`.
pub fn parse_pair_list(text: &str, base: &Path) -> Result<Vec<(PathBuf, PathBuf)>, String> {
    let mut pairs = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) => pairs.push((base.join(a), base.join(b))),
            _ => return Err(format!("line {}: expected two paths, got '{}'", lineno + 1, line)),
        }
    }
    Ok(pairs)
}

/// Groups a dataset into batches, optionally reshuffling every pass.
pub struct BatchLoader {
    dataset: PairedDataset,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl BatchLoader {
    /// Unshuffled loader. A `batch_size` of 0 is treated as 1.
    pub fn new(dataset: PairedDataset, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size: batch_size.max(1),
            shuffle: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// Reshuffle sample order at the start of every pass.
    ///
    /// With a seed the sequence of orders is reproducible.
    pub fn shuffled(mut self, seed: Option<u64>) -> Self {
        self.shuffle = true;
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dataset(&self) -> &PairedDataset {
        &self.dataset
    }

    /// Number of batches per pass; the last one may be short.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }
}

impl BatchSource for BatchLoader {
    fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    fn batches(&mut self) -> impl Iterator<Item = PairBatch> + '_ {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        let chunks: Vec<Vec<usize>> = order.chunks(self.batch_size).map(<[usize]>::to_vec).collect();
        let samples = &self.dataset.samples;
        chunks
            .into_iter()
            .map(move |idx| idx.iter().map(|&i| samples[i].clone()).collect::<PairBatch>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Image;

    fn dataset(n: usize) -> PairedDataset {
        PairedDataset::new(
            (0..n)
                .map(|i| {
                    PairSample::new(Image::from_element(2, 2, i as f32), Image::zeros(2, 2)).unwrap()
                })
                .collect(),
        )
    }

    fn ids(batch: &PairBatch) -> Vec<usize> {
        batch.samples().iter().map(|s| s.x1()[(0, 0)] as usize).collect()
    }

    #[test]
    fn test_last_batch_is_short() {
        let mut loader = BatchLoader::new(dataset(23), 10);
        let sizes: Vec<usize> = loader.batches().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(loader.num_batches(), 3);
        assert_eq!(loader.num_samples(), 23);
    }

    #[test]
    fn test_unshuffled_order_is_stable() {
        let mut loader = BatchLoader::new(dataset(5), 2);
        let first: Vec<Vec<usize>> = loader.batches().map(|b| ids(&b)).collect();
        let second: Vec<Vec<usize>> = loader.batches().map(|b| ids(&b)).collect();
        assert_eq!(first, vec![vec![0, 1], vec![2, 3], vec![4]]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_shuffle_visits_every_sample_once_per_pass() {
        let mut loader = BatchLoader::new(dataset(17), 4).shuffled(Some(7));
        for _ in 0..3 {
            let mut seen: Vec<usize> = loader.batches().flat_map(|b| ids(&b)).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..17).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let mut a = BatchLoader::new(dataset(12), 5).shuffled(Some(42));
        let mut b = BatchLoader::new(dataset(12), 5).shuffled(Some(42));
        let ea: Vec<Vec<usize>> = a.batches().map(|x| ids(&x)).collect();
        let eb: Vec<Vec<usize>> = b.batches().map(|x| ids(&x)).collect();
        assert_eq!(ea, eb);
    }

    #[test]
    fn test_empty_dataset_yields_no_batches() {
        let mut loader = BatchLoader::new(PairedDataset::default(), 8);
        assert_eq!(loader.batches().count(), 0);
    }

    #[test]
    fn test_parse_pair_list() {
        let text = "# pairs\na_even.tif a_odd.tif\n\n  b_even.tif\tb_odd.tif  \n";
        let pairs = parse_pair_list(text, Path::new("/data")).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].0, PathBuf::from("/data/b_even.tif"));
        assert!(parse_pair_list("only_one.tif\n", Path::new(".")).is_err());
    }
}
