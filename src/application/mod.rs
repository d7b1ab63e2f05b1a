// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Coordinates the other layers for one command each. No model
// math and no printing here; the CLI layer prints results.

/// Source dataset → persisted partitions
pub mod split_use_case;

/// Corpus → base model directory
pub mod bootstrap_use_case;

/// Backend selection and the training run
pub mod train_use_case;

/// Scoring, prediction and checkpoint inspection
pub mod evaluate_use_case;
