// ============================================================
// Layer 5 — Optimizers
// ============================================================
// Two optimizers, selected by name, with fixed hyperparameters
// apart from the learning rate and the weight decay:
//
//   Adam  — Burn's AdamConfig, betas (0.9, 0.999), eps 1e-8
//   Nadam — Adam with Nesterov momentum (Dozat, 2016), same
//           betas/eps, momentum decay 0.001
//
// Burn ships no Nadam, so it is written as a SimpleOptimizer and
// wrapped in Burn's OptimizerAdaptor, which handles the per-
// parameter state bookkeeping (and its record for checkpoints).
//
// Nadam update at step t (g = gradient + weight_decay * θ):
//   μ_t   = β1 (1 − ½ · 0.96^(t·ψ))
//   Π_t   = Π_{t−1} · μ_t
//   m     = β1 m + (1 − β1) g
//   v     = β2 v + (1 − β2) g²
//   denom = √(v / (1 − β2^t)) + ε
//   θ    −= lr (1 − μ_t) / (1 − Π_t) · g / denom
//         + lr μ_{t+1} / (1 − Π_t μ_{t+1}) · m / denom

use std::{fmt, str::FromStr};

use burn::{
    module::AutodiffModule,
    optim::{
        adaptor::OptimizerAdaptor, decay::WeightDecayConfig, AdamConfig, SimpleOptimizer,
    },
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
    LearningRate,
};
use serde::{Deserialize, Serialize};

pub const BETA_1: f32 = 0.9;
pub const BETA_2: f32 = 0.999;
pub const EPSILON: f32 = 1e-8;
pub const NADAM_MOMENTUM_DECAY: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizerKind {
    #[default]
    Adam,
    Nadam,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Adam  => write!(f, "Adam"),
            OptimizerKind::Nadam => write!(f, "Nadam"),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adam"  => Ok(OptimizerKind::Adam),
            "nadam" => Ok(OptimizerKind::Nadam),
            other   => anyhow::bail!("unknown optimizer '{other}' (expected Adam or Nadam)"),
        }
    }
}

/// Burn's Adam with the fixed betas/epsilon and optional L2 penalty
pub fn adam_config(weight_decay: f64) -> AdamConfig {
    let cfg = AdamConfig::new()
        .with_beta_1(BETA_1)
        .with_beta_2(BETA_2)
        .with_epsilon(EPSILON);
    if weight_decay > 0.0 {
        cfg.with_weight_decay(Some(WeightDecayConfig::new(weight_decay as f32)))
    } else {
        cfg
    }
}

// ─── Nadam ────────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct NadamConfig {
    #[config(default = 0.9)]
    pub beta_1: f32,
    #[config(default = 0.999)]
    pub beta_2: f32,
    #[config(default = 1e-8)]
    pub epsilon: f32,
    #[config(default = 0.0)]
    pub weight_decay: f32,
    #[config(default = 0.001)]
    pub momentum_decay: f32,
}

impl NadamConfig {
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> OptimizerAdaptor<Nadam, M, B> {
        OptimizerAdaptor::from(Nadam {
            beta_1:         self.beta_1 as f64,
            beta_2:         self.beta_2 as f64,
            epsilon:        self.epsilon as f64,
            weight_decay:   self.weight_decay as f64,
            momentum_decay: self.momentum_decay as f64,
        })
    }
}

/// Nadam with the fixed betas/epsilon/momentum decay
pub fn nadam_config(weight_decay: f64) -> NadamConfig {
    NadamConfig::new()
        .with_beta_1(BETA_1)
        .with_beta_2(BETA_2)
        .with_epsilon(EPSILON)
        .with_momentum_decay(NADAM_MOMENTUM_DECAY)
        .with_weight_decay(weight_decay as f32)
}

#[derive(Clone, Debug)]
pub struct Nadam {
    beta_1:         f64,
    beta_2:         f64,
    epsilon:        f64,
    weight_decay:   f64,
    momentum_decay: f64,
}

/// Per-parameter Nadam state
#[derive(Record, Clone)]
pub struct NadamState<B: Backend, const D: usize> {
    pub time:       usize,
    pub mu_product: f64,
    pub moment_1:   Tensor<B, D>,
    pub moment_2:   Tensor<B, D>,
}

impl Nadam {
    /// Momentum coefficient μ_t
    fn mu(&self, time: usize) -> f64 {
        self.beta_1 * (1.0 - 0.5 * 0.96f64.powf(time as f64 * self.momentum_decay))
    }
}

impl<B: Backend> SimpleOptimizer<B> for Nadam {
    type State<const D: usize> = NadamState<B, D>;

    fn step<const D: usize>(
        &self,
        lr:     LearningRate,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let grad = if self.weight_decay > 0.0 {
            grad + tensor.clone().mul_scalar(self.weight_decay)
        } else {
            grad
        };

        let (time, mu_product, moment_1, moment_2) = match state {
            Some(s) => (
                s.time + 1,
                s.mu_product,
                s.moment_1.mul_scalar(self.beta_1) + grad.clone().mul_scalar(1.0 - self.beta_1),
                s.moment_2.mul_scalar(self.beta_2)
                    + grad.clone().powf_scalar(2.0).mul_scalar(1.0 - self.beta_2),
            ),
            None => (
                1,
                1.0,
                grad.clone().mul_scalar(1.0 - self.beta_1),
                grad.clone().powf_scalar(2.0).mul_scalar(1.0 - self.beta_2),
            ),
        };

        let mu         = self.mu(time);
        let mu_next    = self.mu(time + 1);
        let mu_product = mu_product * mu;

        let bias_correction_2 = 1.0 - self.beta_2.powi(time as i32);
        let denom = moment_2
            .clone()
            .div_scalar(bias_correction_2)
            .sqrt()
            .add_scalar(self.epsilon);

        let grad_coef     = lr * (1.0 - mu) / (1.0 - mu_product);
        let momentum_coef = lr * mu_next / (1.0 - mu_product * mu_next);

        let update = grad.div(denom.clone()).mul_scalar(grad_coef)
            + moment_1.clone().div(denom).mul_scalar(momentum_coef);

        let state = NadamState { time, mu_product, moment_1, moment_2 };
        (tensor - update, Some(state))
    }

    fn to_device<const D: usize>(mut state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        state.moment_1 = state.moment_1.to_device(device);
        state.moment_2 = state.moment_2.to_device(device);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray<f32>;

    fn nadam() -> Nadam {
        Nadam {
            beta_1: 0.9, beta_2: 0.999, epsilon: 1e-8, weight_decay: 0.0, momentum_decay: 0.004,
        }
    }

    #[test]
    fn test_parse_optimizer_names() {
        assert_eq!("Adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!("NADAM".parse::<OptimizerKind>().unwrap(), OptimizerKind::Nadam);
        assert!("sgd".parse::<OptimizerKind>().is_err());
    }

    #[test]
    fn test_first_step_matches_reference() {
        // θ = 1, g = 0.5, lr = 0.1, ψ = 0.004
        // μ1 = 0.9 (1 − ½·0.96^0.004), μ2 = 0.9 (1 − ½·0.96^0.008)
        // m = 0.05, v = 0.00025, denom = √(0.00025 / 0.001) = 0.5
        let opt = nadam();
        let device = NdArrayDevice::Cpu;
        let theta = Tensor::<TestBackend, 1>::from_floats([1.0], &device);
        let grad  = Tensor::<TestBackend, 1>::from_floats([0.5], &device);

        let (updated, state) = SimpleOptimizer::<TestBackend>::step(&opt, 0.1, theta, grad, None);

        let mu1 = 0.9 * (1.0 - 0.5 * 0.96f64.powf(0.004));
        let mu2 = 0.9 * (1.0 - 0.5 * 0.96f64.powf(0.008));
        let expected = 1.0
            - 0.1 * (1.0 - mu1) / (1.0 - mu1) * (0.5 / 0.5)
            - 0.1 * mu2 / (1.0 - mu1 * mu2) * (0.05 / 0.5);

        let got: Vec<f32> = updated.into_data().to_vec().unwrap();
        assert!((got[0] as f64 - expected).abs() < 1e-5, "{} vs {expected}", got[0]);

        let state = state.unwrap();
        assert_eq!(state.time, 1);
        assert!((state.mu_product - mu1).abs() < 1e-12);
    }

    #[test]
    fn test_steps_descend_a_quadratic() {
        // f(θ) = θ², gradient 2θ
        let opt = nadam();
        let device = NdArrayDevice::Cpu;
        let mut theta = Tensor::<TestBackend, 1>::from_floats([3.0], &device);
        let mut state = None;
        for _ in 0..200 {
            let grad = theta.clone().mul_scalar(2.0);
            let (next, next_state) =
                SimpleOptimizer::<TestBackend>::step(&opt, 0.05, theta, grad, state);
            theta = next;
            state = next_state;
        }
        let value: Vec<f32> = theta.into_data().to_vec().unwrap();
        assert!(value[0].abs() < 0.5, "θ = {}", value[0]);
    }
}
