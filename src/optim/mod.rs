//! Loss evaluation and training.
//!
//! - Pixel criteria (L1, L2, robust) and the robust-exponent schedule
//! - Paired noise2noise loss policy
//! - Sample-weighted running mean of batch losses
//! - First-order optimizers
//! - Epoch-driven training loop

pub mod loss;
pub mod optimizer;
pub mod paired;
pub mod running_mean;
pub mod trainer;

pub use loss::{annealed_gamma, Criterion, LossKind, ROBUST_EPS};
pub use optimizer::{Adagrad, Adam, Optimizer, OptimizerKind, Sgd};
pub use paired::PairedLoss;
pub use running_mean::RunningMean;
pub use trainer::{evaluate, EpochSummary, Epochs, TrainError, Trainer};
