//! Noise2noise training loop.
//!
//! `Trainer::epochs` returns an iterator that runs one epoch per `next()`
//! call and yields its [`EpochSummary`]. Between two calls the running means
//! are finalized and the model holds fully stepped weights, so a caller can
//! stop at any epoch boundary by dropping the iterator.
//!
//! A non-finite batch loss is fatal: the batch is not applied, the iterator
//! yields the error once and then ends.

use crate::config::TrainConfig;
use crate::core::{Denoiser, Device, ShapeError, Trainable};
use crate::data::BatchSource;
use crate::optim::loss::{annealed_gamma, Criterion};
use crate::optim::optimizer::Optimizer;
use crate::optim::paired::PairedLoss;
use crate::optim::running_mean::RunningMean;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a training run.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("non-finite loss {value} at epoch {epoch}, batch {batch}")]
    NonFiniteLoss { epoch: usize, batch: usize, value: f64 },

    #[error("model output shape mismatch at epoch {epoch}: {source}")]
    Shape {
        epoch: usize,
        #[source]
        source: ShapeError,
    },
}

/// Result of one training epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Sample-weighted mean training loss.
    pub train_loss: f64,
    /// Sample-weighted mean validation loss, when a validation set was given.
    pub val_loss: Option<f64>,
    /// Robust-loss exponent used for this epoch.
    pub gamma: Option<f32>,
    /// Training samples seen this epoch.
    pub samples: u64,
}

/// Mean paired loss over a whole batch source, without gradients.
///
/// This is the validation pass: the optimizer is never involved and the
/// model is only borrowed immutably.
pub fn evaluate<M, S>(
    model: &M,
    source: &mut S,
    criterion: &Criterion,
    policy: &PairedLoss,
    device: Device,
) -> Result<RunningMean, ShapeError>
where
    M: Denoiser + Sync + ?Sized,
    S: BatchSource + ?Sized,
{
    let mut mean = RunningMean::new();
    for batch in source.batches() {
        let loss = policy.evaluate(model, criterion, &batch, device)?;
        mean.update(loss, batch.len() as u64);
    }
    Ok(mean)
}

/// Owns everything a training run mutates except the model weights.
pub struct Trainer<'m, M: ?Sized> {
    model: &'m mut M,
    optimizer: Box<dyn Optimizer>,
    criterion: Criterion,
    policy: PairedLoss,
    num_epochs: usize,
    device: Device,
}

impl<'m, M> Trainer<'m, M>
where
    M: Trainable + Sync + ?Sized,
{
    pub fn new(model: &'m mut M, config: &TrainConfig) -> Self {
        Self {
            model,
            optimizer: config.optimizer.build(config.lr),
            criterion: Criterion::from(config.criterion),
            policy: PairedLoss::new(config.weight_gradient),
            num_epochs: config.num_epochs,
            device: config.device,
        }
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn criterion(&self) -> &Criterion {
        &self.criterion
    }

    pub fn num_epochs(&self) -> usize {
        self.num_epochs
    }

    pub fn model(&self) -> &M {
        &*self.model
    }

    /// Start the run. Nothing is trained until the iterator is pulled.
    pub fn epochs<S: BatchSource>(self, train: S, validation: Option<S>) -> Epochs<'m, M, S> {
        Epochs {
            trainer: self,
            train,
            validation,
            state: State::Idle,
        }
    }

    /// One pass over `source` with an optimizer step per batch.
    fn train_epoch<S>(&mut self, epoch: usize, source: &mut S) -> Result<RunningMean, TrainError>
    where
        S: BatchSource + ?Sized,
    {
        let total = source.num_samples();
        let mut mean = RunningMean::new();

        for (index, batch) in source.batches().enumerate() {
            let loss = self
                .policy
                .evaluate_and_backprop(&mut *self.model, &self.criterion, &batch)
                .map_err(|source| TrainError::Shape { epoch, source })?;

            if !loss.is_finite() {
                let (_, grads) = self.model.params_and_grads();
                self.optimizer.zero_grad(grads);
                return Err(TrainError::NonFiniteLoss {
                    epoch,
                    batch: index,
                    value: loss,
                });
            }

            let (params, grads) = self.model.params_and_grads();
            self.optimizer.step(params, grads);
            self.optimizer.zero_grad(grads);

            mean.update(loss, batch.len() as u64);
            debug!(
                "[{}/{}] {:.2}% loss={:.5}",
                epoch,
                self.num_epochs,
                percent(mean.total_weight(), total),
                mean.mean()
            );
        }

        Ok(mean)
    }

    fn run_epoch<S>(
        &mut self,
        epoch: usize,
        train: &mut S,
        validation: Option<&mut S>,
    ) -> Result<EpochSummary, TrainError>
    where
        S: BatchSource,
    {
        if self.criterion.set_gamma(annealed_gamma(epoch, self.num_epochs)) {
            debug!(epoch, gamma = self.criterion.gamma(), "annealed robust loss exponent");
        }

        let train_mean = self.train_epoch(epoch, train)?;
        if train_mean.is_empty() {
            warn!(epoch, "no training samples this epoch; reporting loss 0");
        }

        let val_loss = match validation {
            Some(source) => {
                let m = evaluate(&*self.model, source, &self.criterion, &self.policy, self.device)
                    .map_err(|source| TrainError::Shape { epoch, source })?;
                if m.is_empty() {
                    warn!(epoch, "validation set produced no samples; reporting loss 0");
                }
                Some(m.mean())
            }
            None => None,
        };

        let summary = EpochSummary {
            epoch,
            train_loss: train_mean.mean(),
            val_loss,
            gamma: self.criterion.gamma(),
            samples: train_mean.total_weight(),
        };
        info!(
            epoch,
            num_epochs = self.num_epochs,
            train_loss = summary.train_loss,
            val_loss = summary.val_loss,
            "epoch done"
        );
        Ok(summary)
    }
}

fn percent(done: u64, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * done as f64 / total as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Running { next_epoch: usize },
    Done,
}

/// Epoch iterator returned by [`Trainer::epochs`].
pub struct Epochs<'m, M: ?Sized, S> {
    trainer: Trainer<'m, M>,
    train: S,
    validation: Option<S>,
    state: State,
}

impl<'m, M, S> Epochs<'m, M, S>
where
    M: Trainable + Sync + ?Sized,
    S: BatchSource,
{
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn trainer(&self) -> &Trainer<'m, M> {
        &self.trainer
    }
}

impl<'m, M, S> Iterator for Epochs<'m, M, S>
where
    M: Trainable + Sync + ?Sized,
    S: BatchSource,
{
    type Item = Result<EpochSummary, TrainError>;

    fn next(&mut self) -> Option<Self::Item> {
        let epoch = match self.state {
            State::Idle => 1,
            State::Running { next_epoch } => next_epoch,
            State::Done => return None,
        };
        if epoch > self.trainer.num_epochs {
            self.state = State::Done;
            return None;
        }

        let result = self
            .trainer
            .run_epoch(epoch, &mut self.train, self.validation.as_mut());
        self.state = match result {
            Ok(_) => State::Running { next_epoch: epoch + 1 },
            Err(_) => State::Done,
        };
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.state {
            State::Idle => self.trainer.num_epochs,
            State::Running { next_epoch } => (self.trainer.num_epochs + 1).saturating_sub(next_epoch),
            State::Done => 0,
        };
        (0, Some(remaining))
    }
}
