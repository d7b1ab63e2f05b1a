// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and routes each subcommand
// to its use case in Layer 2. Results are printed here and
// nowhere else.
//
//   split      dataset.jsonl → train / validation / test
//   bootstrap  corpus → base model directory
//   train      base model + partitions → run_<n>/checkpoint
//   evaluate   checkpoint + partition → metrics
//   predict    checkpoint + text → labels
//   inspect    checkpoint → stored epoch and metrics
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{
    BootstrapArgs, Commands, EvaluateArgs, InspectArgs, PredictArgs, SplitArgs, TrainArgs,
};

use crate::ml::{evaluator::EvaluatorConfig, metrics::MetricMap};

#[derive(Parser, Debug)]
#[command(
    name = "multilabel-tuner",
    version = "0.1.0",
    about = "Fine-tune and evaluate a transformer text classifier for multi-label classification."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Split(args)     => run_split(args),
            Commands::Bootstrap(args) => run_bootstrap(args),
            Commands::Train(args)     => run_train(args),
            Commands::Evaluate(args)  => run_evaluate(args),
            Commands::Predict(args)   => run_predict(args),
            Commands::Inspect(args)   => run_inspect(args),
        }
    }
}

fn run_split(args: SplitArgs) -> Result<()> {
    use crate::application::split_use_case::SplitUseCase;

    let splits = SplitUseCase::new(&args.source, args.dest.clone(), (&args).into()).execute()?;
    println!(
        "train: {}  validation: {}  test: {}",
        splits.train.len(),
        splits.validation.len(),
        splits.test.as_ref().map_or(0, Vec::len),
    );
    match &args.dest {
        Some(dir) => println!("Partitions saved to '{}'", dir.display()),
        None      => println!("Dry run: pass --dest to save the partitions"),
    }
    Ok(())
}

fn run_bootstrap(args: BootstrapArgs) -> Result<()> {
    use crate::application::bootstrap_use_case::BootstrapUseCase;

    let base = BootstrapUseCase::new(&args.corpus, &args.out_dir, args.vocab_size, (&args).into(), args.seed)
        .execute()?;
    println!("Base model written to '{}'", base.dir().display());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on partitions in: {}", args.dataset_dir);
    let summary = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training finished after {} epoch(s){}.",
        summary.epochs_run,
        if summary.stopped_early { " (early stop)" } else { "" },
    );
    if let Some(f1) = summary.best_f1 {
        println!("Best validation F1: {f1:.4}");
    }
    println!("Run directory: {}", summary.run_dir.display());
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let mut config = EvaluatorConfig::from_run_dir(&args.run_dir, &args.dataset_dir)?;
    config.ckpt_name  = args.ckpt_name;
    config.batch_size = args.batch_size;
    if let Some(t) = args.clf_threshold {
        config.clf_threshold = t;
    }

    let metrics = EvaluateUseCase::new(config, &args.device)?.evaluate()?;
    print_metrics("test", &metrics);
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    // The scored partition is unused when predicting
    let mut config = EvaluatorConfig::from_run_dir(&args.run_dir, &args.run_dir)?;
    config.ckpt_name = args.ckpt_name;
    if let Some(t) = args.clf_threshold {
        config.clf_threshold = t;
    }

    let prediction = EvaluateUseCase::new(config, &args.device)?
        .predict(&args.text, args.label_names.as_deref())?;
    println!("\nPrediction: {prediction}");
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::evaluate_use_case::inspect;

    let ckpt = inspect(&args.run_dir.join(&args.ckpt_name))?;
    println!("epoch:      {}", ckpt.epoch);
    println!("optimizer:  {}", ckpt.optimizer);
    println!("train_loss: {:.6}", ckpt.train_loss);
    print_metrics("validation", &ckpt.val_metrics);
    if let Some(test) = &ckpt.test_metrics {
        print_metrics("test", test);
    }
    Ok(())
}

fn print_metrics(split: &str, metrics: &MetricMap) {
    let parts: Vec<String> = metrics.iter().map(|(k, v)| format!("{k}={v:.4}")).collect();
    println!("{split}: {}", parts.join("  "));
}
