// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Model, optimizers, learning-rate schedules, metrics and the
// train / evaluate loops.
//
//   model.rs     — transformer encoder + linear head on [CLS]
//   optim.rs     — Adam (Burn) and Nadam, selected by name
//   schedule.rs  — linear / cosine / constant lr per step
//   metrics.rs   — weighted F1, Hamming loss, accuracy
//   trainer.rs   — epoch loop, best-only checkpoint, early stop
//   evaluator.rs — restores a checkpoint, scores and predicts
//
// Training runs on an AutodiffBackend; validation, evaluation
// and prediction run on its inner backend.
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Devlin et al. (2019) BERT
//            Dozat (2016) Incorporating Nesterov Momentum into Adam

/// Transformer encoder and sequence classifier
pub mod model;

/// Optimizer selection and Nadam
pub mod optim;

/// Learning-rate schedules
pub mod schedule;

/// Classification metrics
pub mod metrics;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Checkpoint scoring and single-text prediction
pub mod evaluator;
