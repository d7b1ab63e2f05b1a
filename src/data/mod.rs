// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the raw JSON Lines dataset to tensor batches:
//
//   dataset.jsonl
//       │
//       ▼
//   JsonlSource       → reads labeled rows
//       │
//       ▼
//   split_dataset     → seeded shuffle, train / validation / test
//       │                (persisted as dataset_dir/<split>/data.jsonl)
//       ▼
//   SampleEncoder     → token ids + attention mask, padded to L
//       │
//       ▼
//   PartitionDataset  → implements Burn's Dataset trait
//       │
//       ▼
//   ClassificationBatcher + DataLoader → [N, L] / [N, C] batches

/// Reads JSON Lines datasets and persisted partitions
pub mod loader;

/// Seeded train / validation / test splitting
pub mod splitter;

/// Tokenises one sample into fixed-length vectors
pub mod encoder;

/// Implements Burn's Dataset trait for encoded samples
pub mod dataset;

/// Implements Burn's Batcher trait and builds the DataLoaders
pub mod batcher;
