// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// training and evaluation loops:
//
//   checkpoint.rs      — run directories, the best-epoch
//                        checkpoint blob, trainer_config.json
//   base_model.rs      — the base model directory a run starts
//                        from (tokenizer, architecture, weights)
//   tokenizer_store.rs — loading and building tokenizer.json
//   metrics.rs         — per-epoch metrics.csv
//
// Reference: Burn Book §5 (Records and Checkpointing)

/// Run directories and training checkpoints
pub mod checkpoint;

/// Base model directory
pub mod base_model;

/// Tokenizer loading and building
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
