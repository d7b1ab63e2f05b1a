// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands and their flags. Each argument set
// converts into the matching application-layer config so the
// application layer never sees clap types.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainerConfig;
use crate::data::splitter::SplitConfig;
use crate::domain::problem::ProblemType;
use crate::ml::{model::EncoderConfig, optim::OptimizerKind, schedule::LrScheduleKind};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a JSON Lines dataset into train/validation/test partitions
    Split(SplitArgs),

    /// Create a base model directory (tokenizer + encoder) from a corpus
    Bootstrap(BootstrapArgs),

    /// Fine-tune a classifier and keep the best checkpoint
    Train(TrainArgs),

    /// Score a persisted partition with a trained checkpoint
    Evaluate(EvaluateArgs),

    /// Predict the labels of one text
    Predict(PredictArgs),

    /// Show the epoch and metrics stored in a checkpoint
    Inspect(InspectArgs),
}

// ─── split ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// JSON Lines file with one {"text", "labels"} object per row
    #[arg(long)]
    pub source: PathBuf,

    /// Where to write the partitions; omitted = dry run
    #[arg(long)]
    pub dest: Option<PathBuf>,

    #[arg(long, default_value_t = 0.8)]
    pub train_size: f64,

    #[arg(long, default_value_t = 0.1)]
    pub val_size: f64,

    /// 0 disables the test partition
    #[arg(long, default_value_t = 0.1)]
    pub test_size: f64,

    /// Fraction of rows kept after shuffling
    #[arg(long, default_value_t = 1.0)]
    pub frac: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<&SplitArgs> for SplitConfig {
    fn from(a: &SplitArgs) -> Self {
        SplitConfig {
            train_size: a.train_size,
            val_size:   a.val_size,
            test_size:  Some(a.test_size),
            frac:       a.frac,
            seed:       a.seed,
        }
    }
}

// ─── bootstrap ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// JSON Lines dataset whose texts build the vocabulary
    #[arg(long)]
    pub corpus: PathBuf,

    /// Base model directory to create
    #[arg(long, default_value = "base_model")]
    pub out_dir: PathBuf,

    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    /// Longest sequence the encoder accepts
    #[arg(long, default_value_t = 512)]
    pub max_position_embeddings: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 6)]
    pub num_layers: usize,

    /// Typically 4x d_model
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<&BootstrapArgs> for EncoderConfig {
    fn from(a: &BootstrapArgs) -> Self {
        // vocab_size is replaced by the built tokenizer's size
        EncoderConfig::new(a.vocab_size)
            .with_max_position_embeddings(a.max_position_embeddings)
            .with_d_model(a.d_model)
            .with_num_heads(a.num_heads)
            .with_num_layers(a.num_layers)
            .with_d_ff(a.d_ff)
            .with_dropout(a.dropout)
    }
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory with train/, validation/ and optionally test/
    #[arg(long)]
    pub dataset_dir: String,

    /// Runs are written to <out_dir>/dump/run_<n>
    #[arg(long, default_value = "outputs")]
    pub out_dir: String,

    /// Base model directory (see `bootstrap`)
    #[arg(long)]
    pub model_ckpt: String,

    /// Inferred from the training labels when omitted
    #[arg(long)]
    pub num_classes: Option<usize>,

    #[arg(long, default_value_t = 128)]
    pub max_len: usize,

    /// multi_label_classification or single_label_classification
    #[arg(long, default_value = "multi_label_classification")]
    pub problem_type: ProblemType,

    /// Adam or Nadam
    #[arg(long, default_value = "Adam")]
    pub optimizer: OptimizerKind,

    #[arg(long, default_value_t = 1e-3)]
    pub init_lr: f64,

    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f64,

    /// linear, cosine or constant
    #[arg(long, default_value = "linear")]
    pub scheduler: LrScheduleKind,

    #[arg(long, default_value_t = 100)]
    pub num_epochs: usize,

    /// Stop after this many epochs without a better validation F1
    #[arg(long)]
    pub patience: Option<usize>,

    #[arg(long, default_value_t = 8)]
    pub train_bs: usize,

    #[arg(long, default_value_t = 8)]
    pub val_bs: usize,

    /// cpu, wgpu or gpu:<index>
    #[arg(long, default_value = "wgpu")]
    pub device: String,

    #[arg(long, default_value_t = 0.5)]
    pub clf_threshold: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<TrainArgs> for TrainerConfig {
    fn from(a: TrainArgs) -> Self {
        TrainerConfig {
            dataset_dir:   a.dataset_dir,
            out_dir:       a.out_dir,
            model_ckpt:    a.model_ckpt,
            num_classes:   a.num_classes,
            max_len:       a.max_len,
            problem_type:  a.problem_type,
            optimizer:     a.optimizer,
            init_lr:       a.init_lr,
            weight_decay:  a.weight_decay,
            scheduler:     a.scheduler,
            num_epochs:    a.num_epochs,
            patience:      a.patience,
            train_bs:      a.train_bs,
            val_bs:        a.val_bs,
            device:        a.device,
            clf_threshold: a.clf_threshold,
            seed:          a.seed,
        }
    }
}

// ─── evaluate / predict / inspect ─────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Run directory written by `train`
    #[arg(long)]
    pub run_dir: PathBuf,

    /// Partition directory to score (e.g. dataset/test)
    #[arg(long)]
    pub dataset_dir: PathBuf,

    #[arg(long, default_value = "training_checkpoint.pth")]
    pub ckpt_name: String,

    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,

    /// Overrides the threshold saved with the run
    #[arg(long)]
    pub clf_threshold: Option<f64>,

    #[arg(long, default_value = "wgpu")]
    pub device: String,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Run directory written by `train`
    #[arg(long)]
    pub run_dir: PathBuf,

    /// Text to classify
    #[arg(long)]
    pub text: String,

    /// JSON array with one class name per class
    #[arg(long)]
    pub label_names: Option<PathBuf>,

    #[arg(long, default_value = "training_checkpoint.pth")]
    pub ckpt_name: String,

    #[arg(long)]
    pub clf_threshold: Option<f64>,

    #[arg(long, default_value = "wgpu")]
    pub device: String,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Run directory written by `train`
    #[arg(long)]
    pub run_dir: PathBuf,

    #[arg(long, default_value = "training_checkpoint.pth")]
    pub ckpt_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_args_map_onto_config() {
        let cli = Cli::try_parse_from([
            "multilabel-tuner", "train",
            "--dataset-dir", "data/ds",
            "--model-ckpt", "base",
            "--optimizer", "Nadam",
            "--scheduler", "cosine",
            "--patience", "3",
        ])
        .unwrap();

        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainerConfig::from(args);
        assert_eq!(cfg.optimizer, OptimizerKind::Nadam);
        assert_eq!(cfg.scheduler, LrScheduleKind::Cosine);
        assert_eq!(cfg.patience, Some(3));
        assert_eq!(cfg.max_len, 128);
        assert_eq!(cfg.problem_type, ProblemType::MultiLabel);
        assert_eq!(cfg.device, "wgpu");
    }

    #[test]
    fn test_unknown_optimizer_is_rejected() {
        let res = Cli::try_parse_from([
            "multilabel-tuner", "train",
            "--dataset-dir", "d", "--model-ckpt", "b", "--optimizer", "sgd",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_split_zero_test_size() {
        let cli = Cli::try_parse_from([
            "multilabel-tuner", "split", "--source", "rows.jsonl", "--test-size", "0",
        ])
        .unwrap();
        let Commands::Split(args) = cli.command else { panic!("expected split") };
        let cfg = SplitConfig::from(&args);
        assert_eq!(cfg.test_size, Some(0.0));
        assert!(args.dest.is_none());
    }
}
