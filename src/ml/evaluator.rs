// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Restores a trained classifier from a run's checkpoint and
//   - scores a persisted partition (ordered, batch size 1 by default)
//   - predicts the labels of a single text
//
// Prediction encodes the text without padding, truncated only
// to the encoder's position limit, and keeps every class whose
// probability is at or above the threshold (inclusive, unlike
// the strict comparison used when scoring).

use anyhow::{Context, Result};
use std::{fmt, path::{Path, PathBuf}};
use burn::{prelude::*, tensor::activation::sigmoid};

use crate::data::{
    batcher::build_loader, dataset::PartitionDataset, encoder::SampleEncoder,
    loader::load_partition,
};
use crate::domain::{problem::ProblemType, traits::LabelDecoder};
use crate::infra::{
    base_model::BaseModel,
    checkpoint::{bytes_to_record, load_config, TrainingCheckpoint, CHECKPOINT_FILE},
};
use crate::ml::{
    metrics::MetricMap,
    model::{SequenceClassifier, SequenceClassifierConfig},
    trainer::check_metrics,
};

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Partition directory scored by `evaluate` (holds data.jsonl)
    pub dataset_dir:   PathBuf,
    /// Run directory holding the checkpoint
    pub model_dir:     PathBuf,
    pub num_classes:   usize,
    /// Base model directory the run started from
    pub model_ckpt:    PathBuf,
    pub problem_type:  ProblemType,
    pub ckpt_name:     String,
    pub batch_size:    usize,
    pub max_len:       usize,
    pub clf_threshold: f64,
}

impl EvaluatorConfig {
    pub fn new(
        dataset_dir:  impl Into<PathBuf>,
        model_dir:    impl Into<PathBuf>,
        num_classes:  usize,
        model_ckpt:   impl Into<PathBuf>,
        problem_type: ProblemType,
    ) -> Self {
        Self {
            dataset_dir: dataset_dir.into(),
            model_dir: model_dir.into(),
            num_classes,
            model_ckpt: model_ckpt.into(),
            problem_type,
            ckpt_name: CHECKPOINT_FILE.to_string(),
            batch_size: 1,
            max_len: 128,
            clf_threshold: 0.5,
        }
    }

    /// Fill everything but the scored partition from the run's
    /// `trainer_config.json`.
    pub fn from_run_dir(run_dir: &Path, dataset_dir: impl Into<PathBuf>) -> Result<Self> {
        let trainer = load_config(run_dir)?;
        let num_classes = trainer
            .num_classes
            .context("trainer_config.json does not record num_classes")?;

        let mut cfg = Self::new(dataset_dir, run_dir, num_classes, &trainer.model_ckpt, trainer.problem_type);
        cfg.max_len = trainer.max_len;
        cfg.clf_threshold = trainer.clf_threshold;
        Ok(cfg)
    }
}

/// Result of `Evaluator::prediction`
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Names of the predicted classes
    Labels(Vec<String>),
    /// One 0/1 entry per class
    Binary(Vec<u8>),
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Labels(names) => write!(f, "[{}]", names.join(", ")),
            Prediction::Binary(bits) => {
                let bits: Vec<String> = bits.iter().map(u8::to_string).collect();
                write!(f, "[{}]", bits.join(", "))
            }
        }
    }
}

pub struct Evaluator<B: Backend> {
    config:          EvaluatorConfig,
    model:           SequenceClassifier<B>,
    encoder:         SampleEncoder,
    predict_encoder: SampleEncoder,
    device:          B::Device,
    checkpoint:      TrainingCheckpoint,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(config: EvaluatorConfig, device: B::Device) -> Result<Self> {
        let base = BaseModel::open(&config.model_ckpt)?;
        base.check_max_len(config.max_len)?;
        let tokenizer = base.tokenizer()?;
        let encoder_cfg = base.encoder_config()?;
        let position_limit = encoder_cfg.max_position_embeddings;

        let ckpt_path = config.model_dir.join(&config.ckpt_name);
        let mut checkpoint = TrainingCheckpoint::load(&ckpt_path)?;

        let model_state = std::mem::take(&mut checkpoint.model_state);
        let record = bytes_to_record::<B, _>(model_state, &device)
            .with_context(|| format!("Checkpoint '{}' does not match the base model", ckpt_path.display()))?;
        let model = SequenceClassifierConfig::new(encoder_cfg, config.num_classes)
            .init::<B>(&device)
            .load_record(record);

        tracing::info!(
            epoch = checkpoint.epoch,
            val_f1 = ?checkpoint.val_metrics.get("f1"),
            "Restored classifier from '{}'",
            ckpt_path.display()
        );

        Ok(Self {
            encoder: SampleEncoder::new(tokenizer.clone(), config.max_len)?,
            predict_encoder: SampleEncoder::new(tokenizer, position_limit)?,
            config,
            model,
            device,
            checkpoint,
        })
    }

    /// Metrics recorded in the checkpoint at training time
    pub fn checkpoint(&self) -> &TrainingCheckpoint {
        &self.checkpoint
    }

    /// Score the configured partition.
    pub fn evaluate(&self) -> Result<MetricMap> {
        let rows = load_partition(&self.config.dataset_dir)?;
        let dataset = PartitionDataset::encode(&rows, &self.encoder)?;
        let loader = build_loader::<B>(dataset, self.config.batch_size.max(1), None, self.device.clone());

        let metrics = check_metrics(&self.model, loader.as_ref(), self.config.problem_type, self.config.clf_threshold)?;
        tracing::info!(rows = rows.len(), ?metrics, "Evaluated '{}'", self.config.dataset_dir.display());
        Ok(metrics)
    }

    /// Per-class probabilities for one text
    pub fn probabilities(&self, text: &str) -> Result<Vec<f32>> {
        let (ids, mask) = self.predict_encoder.encode_text(text)?;
        let len = ids.len();

        let ids: Vec<i32>  = ids.into_iter().map(|x| x as i32).collect();
        let mask: Vec<i32> = mask.into_iter().map(|x| x as i32).collect();
        let input_ids = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device).reshape([1, len]);
        let attention_mask = Tensor::<B, 1, Int>::from_ints(mask.as_slice(), &self.device).reshape([1, len]);

        let logits = self.model.forward(input_ids, attention_mask);
        sigmoid(logits)
            .into_data()
            .to_vec()
            .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))
    }

    pub fn prediction(&self, text: &str, decoder: Option<&dyn LabelDecoder>) -> Result<Prediction> {
        let bits = binarize(&self.probabilities(text)?, self.config.clf_threshold);
        Ok(match decoder {
            Some(d) => Prediction::Labels(d.decode(&bits)),
            None    => Prediction::Binary(bits),
        })
    }
}

/// 1 where `p >= threshold`
pub fn binarize(probs: &[f32], threshold: f64) -> Vec<u8> {
    probs.iter().map(|&p| u8::from(p as f64 >= threshold)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::{NdArray, NdArrayDevice}, Autodiff};
    use tempfile::TempDir;

    use crate::domain::traits::LabelNames;
    use crate::ml::trainer::{tests::workspace, Trainer, TrainingSummary};

    type TestBackend = NdArray<f32>;

    fn trained_run(root: &Path) -> TrainingSummary {
        let cfg = workspace(root);
        Trainer::<Autodiff<TestBackend>>::new(cfg, NdArrayDevice::Cpu)
            .unwrap()
            .train()
            .unwrap()
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(binarize(&[0.5, 0.49, 0.9], 0.5), vec![1, 0, 1]);
    }

    #[test]
    fn test_evaluate_test_partition() {
        let tmp = TempDir::new().unwrap();
        let run = trained_run(tmp.path());

        let cfg = EvaluatorConfig::from_run_dir(&run.run_dir, tmp.path().join("dataset/test")).unwrap();
        assert_eq!(cfg.num_classes, 2);
        assert_eq!(cfg.batch_size, 1);

        let evaluator = Evaluator::<TestBackend>::new(cfg, NdArrayDevice::Cpu).unwrap();
        let metrics = evaluator.evaluate().unwrap();
        assert!((0.0..=1.0).contains(&metrics["f1"]));
        assert!((0.0..=1.0).contains(&metrics["hamming"]));
        assert_eq!(evaluator.checkpoint().epoch, 1);
    }

    #[test]
    fn test_prediction_binary_and_named() {
        let tmp = TempDir::new().unwrap();
        let run = trained_run(tmp.path());
        let cfg = EvaluatorConfig::from_run_dir(&run.run_dir, tmp.path().join("dataset/test")).unwrap();
        let evaluator = Evaluator::<TestBackend>::new(cfg, NdArrayDevice::Cpu).unwrap();

        let probs = evaluator.probabilities("late goal wins").unwrap();
        assert_eq!(probs.len(), 2);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));

        let Prediction::Binary(bits) = evaluator.prediction("late goal wins", None).unwrap() else {
            panic!("expected a binary prediction");
        };
        assert_eq!(bits, binarize(&probs, 0.5));

        let names = LabelNames::new(vec!["sport".into(), "finance".into()]);
        let Prediction::Labels(labels) = evaluator.prediction("late goal wins", Some(&names)).unwrap() else {
            panic!("expected named labels");
        };
        assert_eq!(labels.len(), bits.iter().filter(|&&b| b == 1).count());
    }

    #[test]
    fn test_long_text_is_truncated_to_position_limit() {
        let tmp = TempDir::new().unwrap();
        let run = trained_run(tmp.path());
        let cfg = EvaluatorConfig::from_run_dir(&run.run_dir, tmp.path().join("dataset/test")).unwrap();
        let evaluator = Evaluator::<TestBackend>::new(cfg, NdArrayDevice::Cpu).unwrap();

        // far more words than the 32 positions of the test encoder
        let text = "goal ".repeat(200);
        assert_eq!(evaluator.probabilities(&text).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_checkpoint_fails() {
        let tmp = TempDir::new().unwrap();
        let run = trained_run(tmp.path());
        let mut cfg = EvaluatorConfig::from_run_dir(&run.run_dir, tmp.path().join("dataset/test")).unwrap();
        cfg.ckpt_name = "nope.pth".into();
        assert!(Evaluator::<TestBackend>::new(cfg, NdArrayDevice::Cpu).is_err());
    }

    #[test]
    fn test_max_len_beyond_position_table_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let run = trained_run(tmp.path());
        let mut cfg = EvaluatorConfig::from_run_dir(&run.run_dir, tmp.path().join("dataset/test")).unwrap();
        cfg.max_len = 64;

        let err = Evaluator::<TestBackend>::new(cfg, NdArrayDevice::Cpu)
            .err()
            .expect("max_len 64 must be rejected");
        assert!(err.to_string().contains("max_position_embeddings"), "{err}");
    }
}
