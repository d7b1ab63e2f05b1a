// ============================================================
// Layer 2 — Evaluate / Predict / Inspect Use Cases
// ============================================================
// Thin wrappers that pick the backend for the Evaluator (no
// autodiff needed) and read the optional class-name file used
// to turn binary predictions into label names.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use burn::backend::{
    ndarray::{NdArray, NdArrayDevice},
    wgpu::Wgpu,
};

use crate::application::train_use_case::ComputeDevice;
use crate::domain::traits::{LabelDecoder, LabelNames};
use crate::infra::checkpoint::TrainingCheckpoint;
use crate::ml::{
    evaluator::{Evaluator, EvaluatorConfig, Prediction},
    metrics::MetricMap,
};

pub struct EvaluateUseCase {
    config: EvaluatorConfig,
    device: ComputeDevice,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluatorConfig, device: &str) -> Result<Self> {
        Ok(Self { config, device: device.parse()? })
    }

    pub fn evaluate(&self) -> Result<MetricMap> {
        match self.device {
            ComputeDevice::Cpu => {
                Evaluator::<NdArray<f32>>::new(self.config.clone(), NdArrayDevice::Cpu)?.evaluate()
            }
            ComputeDevice::Wgpu(index) => {
                Evaluator::<Wgpu>::new(self.config.clone(), ComputeDevice::wgpu_device(index))?.evaluate()
            }
        }
    }

    /// Predict `text`; class names come from `label_names` when given.
    pub fn predict(&self, text: &str, label_names: Option<&Path>) -> Result<Prediction> {
        let names = label_names
            .map(|p| load_label_names(p, self.config.num_classes))
            .transpose()?;
        let decoder = names.as_ref().map(|n| n as &dyn LabelDecoder);

        match self.device {
            ComputeDevice::Cpu => Evaluator::<NdArray<f32>>::new(self.config.clone(), NdArrayDevice::Cpu)?
                .prediction(text, decoder),
            ComputeDevice::Wgpu(index) => {
                Evaluator::<Wgpu>::new(self.config.clone(), ComputeDevice::wgpu_device(index))?
                    .prediction(text, decoder)
            }
        }
    }
}

/// Read a JSON array of class names, one per class.
pub fn load_label_names(path: &Path, num_classes: usize) -> Result<LabelNames> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read label names from '{}'", path.display()))?;
    let names = LabelNames::new(
        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a JSON array of strings", path.display()))?,
    );
    anyhow::ensure!(
        names.len() == num_classes,
        "'{}' lists {} names but the model has {num_classes} classes",
        path.display(),
        names.len()
    );
    Ok(names)
}

/// Load a checkpoint for display, without its weight payloads.
pub fn inspect(checkpoint: &Path) -> Result<TrainingCheckpoint> {
    let mut ckpt = TrainingCheckpoint::load(checkpoint)?;
    tracing::debug!(
        model_bytes = ckpt.model_state.len(),
        optimizer_bytes = ckpt.optimizer_state.len(),
        "Loaded checkpoint"
    );
    ckpt.model_state.clear();
    ckpt.optimizer_state.clear();
    Ok(ckpt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_label_names_must_match_class_count() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("labels.json");
        fs::write(&path, r#"["sport", "finance"]"#).unwrap();

        assert_eq!(load_label_names(&path, 2).unwrap().len(), 2);
        assert!(load_label_names(&path, 3).is_err());
    }

    #[test]
    fn test_malformed_label_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("labels.json");
        fs::write(&path, r#"{"a": 1}"#).unwrap();
        assert!(load_label_names(&path, 1).is_err());
    }
}
