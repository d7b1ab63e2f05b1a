// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Picks the compute backend named in the config and runs the
// Trainer on it:
//
//   "cpu"               → Autodiff<NdArray>
//   "wgpu" | "gpu"      → Autodiff<Wgpu> on the default adapter
//   "gpu:<i>"           → Autodiff<Wgpu> on discrete GPU i
//
// Everything else (loaders, model, optimizer, run directory)
// is set up by the Trainer itself.

use anyhow::Result;
use std::{fmt, str::FromStr};
use burn::backend::{
    ndarray::{NdArray, NdArrayDevice},
    wgpu::{Wgpu, WgpuDevice},
    Autodiff,
};
use serde::{Deserialize, Serialize};

use crate::domain::problem::ProblemType;
use crate::ml::{
    optim::OptimizerKind,
    schedule::LrScheduleKind,
    trainer::{Trainer, TrainingSummary},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Saved as trainer_config.json in every run directory; the
// evaluator reads it back to rebuild the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Holds train/, validation/ and optionally test/
    pub dataset_dir:   String,
    /// Runs are created under out_dir/dump/
    pub out_dir:       String,
    /// Base model directory
    pub model_ckpt:    String,
    /// Inferred from the training partition when unset
    pub num_classes:   Option<usize>,
    pub max_len:       usize,
    pub problem_type:  ProblemType,
    pub optimizer:     OptimizerKind,
    pub init_lr:       f64,
    pub weight_decay:  f64,
    pub scheduler:     LrScheduleKind,
    pub num_epochs:    usize,
    /// Non-improving epochs tolerated before stopping; unset or 0 disables
    pub patience:      Option<usize>,
    pub train_bs:      usize,
    pub val_bs:        usize,
    pub device:        String,
    pub clf_threshold: f64,
    pub seed:          u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            dataset_dir:   "data/dataset".to_string(),
            out_dir:       "outputs".to_string(),
            model_ckpt:    "base_model".to_string(),
            num_classes:   None,
            max_len:       128,
            problem_type:  ProblemType::MultiLabel,
            optimizer:     OptimizerKind::Adam,
            init_lr:       1e-3,
            weight_decay:  0.0,
            scheduler:     LrScheduleKind::Linear,
            num_epochs:    100,
            patience:      None,
            train_bs:      8,
            val_bs:        8,
            device:        "wgpu".to_string(),
            clf_threshold: 0.5,
            seed:          42,
        }
    }
}

// ─── Compute device ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Cpu,
    /// `None` = default adapter
    Wgpu(Option<usize>),
}

impl ComputeDevice {
    pub fn wgpu_device(index: Option<usize>) -> WgpuDevice {
        match index {
            Some(i) => WgpuDevice::DiscreteGpu(i),
            None    => WgpuDevice::DefaultDevice,
        }
    }
}

impl FromStr for ComputeDevice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu"                   => Ok(ComputeDevice::Cpu),
            "wgpu" | "gpu" | "cuda" => Ok(ComputeDevice::Wgpu(None)),
            other => {
                let index = other
                    .strip_prefix("gpu:")
                    .or_else(|| other.strip_prefix("cuda:"))
                    .ok_or_else(|| anyhow::anyhow!("unknown device '{other}' (expected cpu, wgpu or gpu:<index>)"))?;
                let index = index
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid GPU index in device '{other}'"))?;
                Ok(ComputeDevice::Wgpu(Some(index)))
            }
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Cpu           => write!(f, "cpu"),
            ComputeDevice::Wgpu(None)    => write!(f, "wgpu"),
            ComputeDevice::Wgpu(Some(i)) => write!(f, "gpu:{i}"),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainerConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn execute(self) -> Result<TrainingSummary> {
        let device: ComputeDevice = self.config.device.parse()?;
        tracing::info!(%device, "Selected compute device");

        match device {
            ComputeDevice::Cpu => {
                Trainer::<Autodiff<NdArray<f32>>>::new(self.config, NdArrayDevice::Cpu)?.train()
            }
            ComputeDevice::Wgpu(index) => {
                let device = ComputeDevice::wgpu_device(index);
                Trainer::<Autodiff<Wgpu>>::new(self.config, device)?.train()
            }
        }
    }
}
