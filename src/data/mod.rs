//! Paired noisy-image datasets and batching.
//!
//! A noise2noise sample is two independent noisy observations `x1`, `x2` of
//! the same field of view, optionally with a guidance image. The training
//! loop never indexes a dataset directly; it pulls batches from a
//! [`BatchSource`] once per epoch.

mod loader;

pub use loader::{parse_pair_list, BatchLoader, PairedDataset};

use crate::core::{check_same_shape, Image, ShapeError};

/// Two noisy views of one signal, plus optional guidance.
#[derive(Clone, Debug, PartialEq)]
pub struct PairSample {
    x1: Image,
    x2: Image,
    guidance: Option<Image>,
}

impl PairSample {
    /// Both views must have the same shape.
    pub fn new(x1: Image, x2: Image) -> Result<Self, ShapeError> {
        check_same_shape(&x1, &x2)?;
        Ok(Self { x1, x2, guidance: None })
    }

    /// Attach a guidance image of the same shape.
    ///
    /// Guidance travels with the sample but is not scored by the paired loss.
    pub fn with_guidance(mut self, guidance: Image) -> Result<Self, ShapeError> {
        check_same_shape(&self.x1, &guidance)?;
        self.guidance = Some(guidance);
        Ok(self)
    }

    pub fn x1(&self) -> &Image {
        &self.x1
    }

    pub fn x2(&self) -> &Image {
        &self.x2
    }

    pub fn guidance(&self) -> Option<&Image> {
        self.guidance.as_ref()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.x1.shape()
    }

    /// The same sample with `x1` and `x2` exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            x1: self.x2.clone(),
            x2: self.x1.clone(),
            guidance: self.guidance.clone(),
        }
    }
}

/// One batch of samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PairBatch {
    samples: Vec<PairSample>,
}

impl PairBatch {
    pub fn new(samples: Vec<PairSample>) -> Self {
        Self { samples }
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

impl FromIterator<PairSample> for PairBatch {
    fn from_iter<T: IntoIterator<Item = PairSample>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A finite sequence of batches, restartable once per epoch.
pub trait BatchSource {
    /// Total number of samples over one full pass.
    fn num_samples(&self) -> usize;

    /// Start a new pass over the data.
    fn batches(&mut self) -> impl Iterator<Item = PairBatch> + '_;
}

/// Fixed batches, replayed in the same order every epoch.
impl BatchSource for Vec<PairBatch> {
    fn num_samples(&self) -> usize {
        self.iter().map(PairBatch::len).sum()
    }

    fn batches(&mut self) -> impl Iterator<Item = PairBatch> + '_ {
        self.iter().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rejects_mismatched_views() {
        let err = PairSample::new(Image::zeros(4, 4), Image::zeros(4, 5)).unwrap_err();
        assert_eq!(err.actual, (4, 5));
    }

    #[test]
    fn test_guidance_must_match_views() {
        let s = PairSample::new(Image::zeros(3, 3), Image::zeros(3, 3)).unwrap();
        assert!(s.clone().with_guidance(Image::zeros(2, 3)).is_err());
        let g = s.with_guidance(Image::from_element(3, 3, 1.0)).unwrap();
        assert_eq!(g.guidance().map(|i| i[(0, 0)]), Some(1.0));
    }

    #[test]
    fn test_swapped_exchanges_views() {
        let s = PairSample::new(Image::zeros(2, 2), Image::from_element(2, 2, 1.0)).unwrap();
        let t = s.swapped();
        assert_eq!(t.x1(), s.x2());
        assert_eq!(t.x2(), s.x1());
    }

    #[test]
    fn test_vec_source_replays_batches() {
        let s = PairSample::new(Image::zeros(2, 2), Image::zeros(2, 2)).unwrap();
        let mut source = vec![
            PairBatch::new(vec![s.clone(), s.clone()]),
            PairBatch::new(vec![s]),
        ];
        assert_eq!(source.num_samples(), 3);
        assert_eq!(source.batches().count(), 2);
        assert_eq!(source.batches().map(|b| b.len()).collect::<Vec<_>>(), vec![2, 1]);
    }
}
