//! First-order optimizers over a flat parameter vector.
//!
//! Each optimizer keeps per-parameter state sized lazily on the first step,
//! so one instance can be built before the model's parameter count is known.

use serde::{Deserialize, Serialize};

/// Update rule applied once per training batch.
///
/// The training loop calls `step` after gradients for the batch have been
/// accumulated, then `zero_grad`.
pub trait Optimizer {
    fn step(&mut self, params: &mut [f32], grads: &[f32]);

    fn zero_grad(&mut self, grads: &mut [f32]) {
        grads.fill(0.0);
    }

    fn learning_rate(&self) -> f32;
}

/// Optimizer selector, as written in configs and on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    #[default]
    Adagrad,
    Sgd,
}

impl OptimizerKind {
    pub fn build(self, lr: f32) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Adam => Box::new(Adam::new(lr, 0.9, 0.999, 1e-8)),
            OptimizerKind::Adagrad => Box::new(Adagrad::new(lr)),
            OptimizerKind::Sgd => Box::new(Sgd::nesterov(lr, 0.9)),
        }
    }
}

impl std::str::FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(OptimizerKind::Adam),
            "adagrad" => Ok(OptimizerKind::Adagrad),
            "sgd" => Ok(OptimizerKind::Sgd),
            other => Err(format!("unknown optimizer '{other}' (expected adam|adagrad|sgd)")),
        }
    }
}

pub struct Adam {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    t: u32,
    m: Vec<f32>,
    v: Vec<f32>,
}

impl Adam {
    pub fn new(lr: f32, beta1: f32, beta2: f32, eps: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            eps,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    fn ensure_len(&mut self, len: usize) {
        if self.m.len() != len {
            self.m.resize(len, 0.0);
            self.v.resize(len, 0.0);
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [f32], grads: &[f32]) {
        assert_eq!(params.len(), grads.len());
        self.ensure_len(params.len());

        self.t += 1;
        let t = self.t as f32;
        let b1 = self.beta1;
        let b2 = self.beta2;

        let bias1 = 1.0 - b1.powf(t);
        let bias2 = 1.0 - b2.powf(t);

        for i in 0..params.len() {
            let g = grads[i];
            self.m[i] = self.m[i] * b1 + g * (1.0 - b1);
            self.v[i] = self.v[i] * b2 + g * g * (1.0 - b2);

            let m_hat = self.m[i] / bias1;
            let v_hat = self.v[i] / bias2;

            params[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
        }
    }

    fn learning_rate(&self) -> f32 {
        self.lr
    }
}

/// Adagrad: per-parameter step shrinks with the accumulated squared gradient.
pub struct Adagrad {
    pub lr: f32,
    pub eps: f32,
    sum_sq: Vec<f32>,
}

impl Adagrad {
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            eps: 1e-10,
            sum_sq: Vec::new(),
        }
    }
}

impl Optimizer for Adagrad {
    fn step(&mut self, params: &mut [f32], grads: &[f32]) {
        assert_eq!(params.len(), grads.len());
        if self.sum_sq.len() != params.len() {
            self.sum_sq.resize(params.len(), 0.0);
        }
        for i in 0..params.len() {
            let g = grads[i];
            self.sum_sq[i] += g * g;
            params[i] -= self.lr * g / (self.sum_sq[i].sqrt() + self.eps);
        }
    }

    fn learning_rate(&self) -> f32 {
        self.lr
    }
}

/// SGD with (optionally Nesterov) momentum.
pub struct Sgd {
    pub lr: f32,
    pub momentum: f32,
    pub nesterov: bool,
    velocity: Vec<f32>,
}

impl Sgd {
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            momentum: 0.0,
            nesterov: false,
            velocity: Vec::new(),
        }
    }

    pub fn nesterov(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            nesterov: true,
            velocity: Vec::new(),
        }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [f32], grads: &[f32]) {
        assert_eq!(params.len(), grads.len());
        if self.velocity.len() != params.len() {
            self.velocity.resize(params.len(), 0.0);
        }
        for i in 0..params.len() {
            let g = grads[i];
            let buf = self.momentum * self.velocity[i] + g;
            self.velocity[i] = buf;
            let update = if self.nesterov { g + self.momentum * buf } else { buf };
            params[i] -= self.lr * update;
        }
    }

    fn learning_rate(&self) -> f32 {
        self.lr
    }
}
