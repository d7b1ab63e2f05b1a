// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Fine-tunes a SequenceClassifier on the training partition
// and keeps only the best checkpoint of the run.
//
// Per epoch:
//   1. train pass    forward → loss → backward → optimizer step
//                    at the scheduled lr (one step per batch)
//   2. validation    model.valid() on the inner backend (no
//                    autodiff, dropout off), logits of every
//                    batch concatenated and scored at once
//   3. improvement   val F1 strictly above the best so far
//                    (the first epoch always counts)
//                      → score test partition if present
//                      → overwrite training_checkpoint.pth
//   4. early stop    `patience` non-improving epochs in a row
//
// The mean train loss is weighted by batch size, so a short
// last batch does not count as much as a full one.

use anyhow::Result;
use std::{path::{Path, PathBuf}, sync::Arc};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::train_use_case::TrainerConfig;
use crate::data::{
    batcher::{build_loader, num_batches, ClassificationBatch},
    dataset::PartitionDataset,
    encoder::SampleEncoder,
    splitter::{DatasetSplits, TEST_SPLIT, TRAIN_SPLIT, VALIDATION_SPLIT},
};
use crate::domain::{problem::ProblemType, sample::IndexedSample};
use crate::infra::{
    base_model::BaseModel,
    checkpoint::{record_to_bytes, RunDirectory, TrainingCheckpoint},
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    metrics::{compute_metrics, MetricMap, F1},
    model::SequenceClassifier,
    optim::{adam_config, nadam_config, OptimizerKind},
    schedule::LrSchedule,
};

type Loader<B> = Arc<dyn DataLoader<ClassificationBatch<B>>>;

/// What a finished run reports back
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub run_dir:       PathBuf,
    pub epochs_run:    usize,
    pub best_f1:       Option<f64>,
    pub stopped_early: bool,
}

// ─── Improvement tracking ─────────────────────────────────────────────────────

/// Best validation F1 so far and the count of epochs since it improved.
#[derive(Debug, Clone)]
pub struct ImprovementTracker {
    best:     Option<f64>,
    counter:  usize,
    patience: Option<usize>,
}

impl ImprovementTracker {
    pub fn new(patience: Option<usize>) -> Self {
        Self { best: None, counter: 0, patience: patience.filter(|&p| p > 0) }
    }

    /// Record one epoch's score; true when it beats the best so far.
    pub fn observe(&mut self, score: f64) -> bool {
        let improved = self.best.map_or(true, |best| score > best);
        if improved {
            self.best = Some(score);
            self.counter = 0;
        } else {
            self.counter += 1;
        }
        improved
    }

    pub fn should_stop(&self) -> bool {
        self.patience.is_some_and(|p| self.counter >= p)
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

// ─── Trainer ──────────────────────────────────────────────────────────────────

pub struct Trainer<B: AutodiffBackend> {
    config:       TrainerConfig,
    model:        SequenceClassifier<B>,
    train_loader: Loader<B>,
    val_loader:   Loader<B::InnerBackend>,
    test_loader:  Option<Loader<B::InnerBackend>>,
    schedule:     LrSchedule,
    run_dir:      RunDirectory,
    batches_per_epoch: usize,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Load the base model and partitions, build the loaders and the
    /// lr schedule, and claim a fresh run directory.
    pub fn new(mut config: TrainerConfig, device: B::Device) -> Result<Self> {
        anyhow::ensure!(config.train_bs > 0 && config.val_bs > 0, "batch sizes must be positive");

        let base = BaseModel::open(&config.model_ckpt)?;
        base.check_max_len(config.max_len)?;
        let encoder = SampleEncoder::new(base.tokenizer()?, config.max_len)?;

        let dataset_dir = Path::new(&config.dataset_dir);
        let DatasetSplits { train, validation: val, test } = DatasetSplits::load_from_disk(dataset_dir)?;

        anyhow::ensure!(!train.is_empty(), "training partition in '{}' is empty", dataset_dir.display());
        anyhow::ensure!(!val.is_empty(), "validation partition in '{}' is empty", dataset_dir.display());

        let num_classes = match config.num_classes {
            Some(n) => n,
            None    => train[0].labels.len(),
        };
        anyhow::ensure!(num_classes > 0, "num_classes must be positive");
        for (name, part) in [(TRAIN_SPLIT, &train), (VALIDATION_SPLIT, &val)]
            .into_iter()
            .chain(test.as_ref().map(|t| (TEST_SPLIT, t)))
        {
            check_label_width(name, part, num_classes)?;
        }
        config.num_classes = Some(num_classes);

        B::seed(config.seed);
        let model = base.classifier::<B>(num_classes, &device)?;

        let train_len = train.len();
        let train_loader = build_loader::<B>(
            PartitionDataset::encode(&train, &encoder)?,
            config.train_bs,
            Some(config.seed),
            device.clone(),
        );
        let val_loader = build_loader::<B::InnerBackend>(
            PartitionDataset::encode(&val, &encoder)?,
            config.val_bs,
            None,
            device.clone(),
        );
        let test_loader = match &test {
            Some(rows) => Some(build_loader::<B::InnerBackend>(
                PartitionDataset::encode(rows, &encoder)?,
                config.val_bs,
                None,
                device.clone(),
            )),
            None => None,
        };

        let batches_per_epoch = num_batches(train_len, config.train_bs);
        let schedule = LrSchedule::new(
            config.scheduler,
            config.init_lr,
            0,
            config.num_epochs * batches_per_epoch,
        );

        let run_dir = RunDirectory::allocate(Path::new(&config.out_dir))?;
        run_dir.save_config(&config)?;

        tracing::info!(
            run = run_dir.index(),
            train = train_len,
            validation = val.len(),
            test = test.as_ref().map_or(0, Vec::len),
            num_classes,
            problem_type = %config.problem_type,
            optimizer = %config.optimizer,
            scheduler = %config.scheduler,
            "Trainer ready"
        );

        Ok(Self {
            config,
            model,
            train_loader,
            val_loader,
            test_loader,
            schedule,
            run_dir,
            batches_per_epoch,
        })
    }

    /// Run the epoch loop with the configured optimizer.
    pub fn train(self) -> Result<TrainingSummary> {
        let weight_decay = self.config.weight_decay;
        match self.config.optimizer {
            OptimizerKind::Adam => {
                let optim = adam_config(weight_decay).init::<B, SequenceClassifier<B>>();
                self.fit(optim)
            }
            OptimizerKind::Nadam => {
                let optim = nadam_config(weight_decay).init::<B, SequenceClassifier<B>>();
                self.fit(optim)
            }
        }
    }

    fn fit<O: Optimizer<SequenceClassifier<B>, B>>(self, mut optim: O) -> Result<TrainingSummary> {
        let Self {
            config, mut model, train_loader, val_loader, test_loader, schedule, run_dir, batches_per_epoch,
        } = self;

        let problem = config.problem_type;
        let logger  = MetricsLogger::new(run_dir.path(), &[F1, problem.secondary_metric()])?;
        let mut tracker = ImprovementTracker::new(config.patience);
        let mut step    = 0usize;
        let mut epochs_run    = 0usize;
        let mut stopped_early = false;

        for epoch in 1..=config.num_epochs {
            epochs_run = epoch;

            let progress = epoch_progress(batches_per_epoch, epoch, config.num_epochs);
            let (trained, train_loss) = train_epoch(
                model, &mut optim, train_loader.as_ref(), &schedule, &mut step, problem, &progress,
            )?;
            model = trained;
            progress.finish_and_clear();

            let model_valid = model.valid();
            let val_metrics = check_metrics(&model_valid, val_loader.as_ref(), problem, config.clf_threshold)?;
            let score = val_metrics.get(F1).copied().unwrap_or(0.0);

            let improved = tracker.observe(score);
            if improved {
                let test_metrics = match &test_loader {
                    Some(loader) => Some(check_metrics(&model_valid, loader.as_ref(), problem, config.clf_threshold)?),
                    None => None,
                };
                TrainingCheckpoint {
                    epoch,
                    optimizer:       config.optimizer,
                    model_state:     record_to_bytes::<B, _>(model.clone().into_record())?,
                    optimizer_state: record_to_bytes::<B, _>(optim.to_record())?,
                    train_loss,
                    val_metrics:     val_metrics.clone(),
                    test_metrics,
                }
                .save(&run_dir.checkpoint_path())?;
            }

            logger.log(&EpochMetrics { epoch, train_loss, val_metrics: val_metrics.clone(), improved })?;
            tracing::info!(
                epoch,
                num_epochs = config.num_epochs,
                train_loss,
                val_f1 = score,
                improved,
                "Epoch finished"
            );

            if tracker.should_stop() {
                tracing::info!(epoch, "No improvement for {} epochs, stopping early", config.patience.unwrap_or(0));
                stopped_early = true;
                break;
            }
        }

        tracing::info!(best_f1 = ?tracker.best(), "Training complete");
        Ok(TrainingSummary {
            run_dir: run_dir.path().to_path_buf(),
            epochs_run,
            best_f1: tracker.best(),
            stopped_early,
        })
    }
}

/// One pass over the training loader. Returns the updated model and
/// the per-sample mean loss.
fn train_epoch<B, O>(
    mut model: SequenceClassifier<B>,
    optim:     &mut O,
    loader:    &dyn DataLoader<ClassificationBatch<B>>,
    schedule:  &LrSchedule,
    step:      &mut usize,
    problem:   ProblemType,
    progress:  &ProgressBar,
) -> Result<(SequenceClassifier<B>, f64)>
where
    B: AutodiffBackend,
    O: Optimizer<SequenceClassifier<B>, B>,
{
    let mut loss_sum = 0.0f64;
    let mut samples  = 0usize;

    for batch in loader.iter() {
        let batch_size = batch.labels.dims()[0];
        let (loss, _) = model.forward_loss(batch, problem);

        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
        anyhow::ensure!(loss_val.is_finite(), "training loss diverged at step {}", *step);
        loss_sum += loss_val * batch_size as f64;
        samples  += batch_size;

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(schedule.lr_at(*step), model, grads);
        *step += 1;

        progress.inc(1);
        progress.set_message(format!("loss {loss_val:.4}"));
    }

    let mean = if samples > 0 { loss_sum / samples as f64 } else { f64::NAN };
    Ok((model, mean))
}

/// Score `model` on every batch of `loader` at once.
pub fn check_metrics<B: Backend>(
    model:     &SequenceClassifier<B>,
    loader:    &dyn DataLoader<ClassificationBatch<B>>,
    problem:   ProblemType,
    threshold: f64,
) -> Result<MetricMap> {
    let mut all_logits = Vec::new();
    let mut all_labels = Vec::new();

    for batch in loader.iter() {
        let logits = model.forward(batch.input_ids, batch.attention_mask);
        all_logits.push(logits);
        all_labels.push(batch.labels);
    }
    anyhow::ensure!(!all_logits.is_empty(), "cannot score an empty partition");

    compute_metrics(Tensor::cat(all_logits, 0), Tensor::cat(all_labels, 0), problem, threshold)
}

fn check_label_width(name: &str, rows: &[IndexedSample], num_classes: usize) -> Result<()> {
    if let Some(row) = rows.iter().find(|r| r.labels.len() != num_classes) {
        anyhow::bail!(
            "{name} row {} has {} labels, expected {num_classes}",
            row.idx,
            row.labels.len()
        );
    }
    Ok(())
}

fn epoch_progress(batches: usize, epoch: usize, num_epochs: usize) -> ProgressBar {
    let pb = ProgressBar::new(batches as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_prefix(format!("epoch {epoch}/{num_epochs}"));
    pb
}
