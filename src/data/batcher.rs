// ============================================================
// Layer 4 — Classification Batcher
// ============================================================
// Implements Burn's Batcher trait to stack EncodedSamples into
// tensors, and builds the DataLoaders the trainer and the
// evaluator iterate over.
//
//   Input:  Vec of N EncodedSamples (length L, C classes)
//   Output: ClassificationBatch with
//             input_ids      [N, L] Int
//             attention_mask [N, L] Int
//             labels         [N, C] Float
//
// Samples are already padded to L by the SampleEncoder, so
// stacking is a flatten + reshape.
//
// Loaders:
//   - training:   shuffled with a seed; Burn draws a fresh
//                 permutation every time iteration restarts
//   - evaluation: partition order preserved
// The last batch is smaller when N is not a multiple of the
// batch size. No worker threads are used.

use std::sync::Arc;

use burn::{
    data::dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
    prelude::*,
};

use crate::data::dataset::{EncodedSample, PartitionDataset};

// ─── ClassificationBatch ──────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    /// Token ID sequences — shape: [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — shape: [batch_size, seq_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Multi-hot targets — shape: [batch_size, num_classes]
    pub labels: Tensor<B, 2>,
}

// ─── ClassificationBatcher ────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ClassificationBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<EncodedSample, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<EncodedSample>) -> ClassificationBatch<B> {
        let batch_size  = items.len();
        let seq_len     = items[0].input_ids.len();
        let num_classes = items[0].labels.len();

        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i32))
            .collect();

        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.attention_mask.iter().map(|&x| x as i32))
            .collect();

        let labels_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.labels.iter().copied())
            .collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(
            input_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let attention_mask = Tensor::<B, 1, Int>::from_ints(
            mask_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let labels = Tensor::<B, 1>::from_floats(
            labels_flat.as_slice(), &self.device
        ).reshape([batch_size, num_classes]);

        ClassificationBatch { input_ids, attention_mask, labels }
    }
}

/// Build a loader over `dataset`. `shuffle_seed = Some(_)` gives a
/// training loader, `None` an ordered evaluation loader.
pub fn build_loader<B: Backend>(
    dataset:      PartitionDataset,
    batch_size:   usize,
    shuffle_seed: Option<u64>,
    device:       B::Device,
) -> Arc<dyn DataLoader<ClassificationBatch<B>>> {
    let builder = DataLoaderBuilder::new(ClassificationBatcher::<B>::new(device))
        .batch_size(batch_size);

    match shuffle_seed {
        Some(seed) => builder.shuffle(seed).build(dataset),
        None       => builder.build(dataset),
    }
}

/// Number of batches one pass over `len` samples yields
pub fn num_batches(len: usize, batch_size: usize) -> usize {
    len.div_ceil(batch_size.max(1))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray<f32>;

    fn sample(id: u32) -> EncodedSample {
        EncodedSample {
            input_ids:      vec![101, id, 102, 0],
            attention_mask: vec![1, 1, 1, 0],
            labels:         vec![(id % 2) as f32, 1.0],
        }
    }

    fn dataset(n: u32) -> PartitionDataset {
        PartitionDataset::new((0..n).map(sample).collect())
    }

    fn second_tokens(batch: &ClassificationBatch<TestBackend>) -> Vec<i64> {
        let [b, l] = batch.input_ids.dims();
        let ids: Vec<i64> = batch
            .input_ids
            .clone()
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap();
        (0..b).map(|row| ids[row * l + 1]).collect()
    }

    #[test]
    fn test_batch_shapes() {
        let batcher = ClassificationBatcher::<TestBackend>::new(NdArrayDevice::Cpu);
        let batch = batcher.batch(vec![sample(5), sample(6), sample(7)]);
        assert_eq!(batch.input_ids.dims(), [3, 4]);
        assert_eq!(batch.attention_mask.dims(), [3, 4]);
        assert_eq!(batch.labels.dims(), [3, 2]);

        let labels: Vec<f32> = batch.labels.into_data().to_vec().unwrap();
        assert_eq!(labels, vec![1.0, 1.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_eval_loader_preserves_order_and_sizes() {
        let loader = build_loader::<TestBackend>(dataset(7), 3, None, NdArrayDevice::Cpu);
        let batches: Vec<_> = loader.iter().collect();
        let sizes: Vec<usize> = batches.iter().map(|b| b.input_ids.dims()[0]).collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        let order: Vec<i64> = batches.iter().flat_map(second_tokens).collect();
        assert_eq!(order, (0..7).collect::<Vec<i64>>());
    }

    #[test]
    fn test_training_loader_covers_every_sample_each_pass() {
        let loader = build_loader::<TestBackend>(dataset(10), 4, Some(42), NdArrayDevice::Cpu);
        for _ in 0..2 {
            let mut seen: Vec<i64> = loader.iter().flat_map(|b| second_tokens(&b)).collect();
            seen.sort();
            assert_eq!(seen, (0..10).collect::<Vec<i64>>());
        }
    }

    #[test]
    fn test_num_batches() {
        assert_eq!(num_batches(10, 8), 2);
        assert_eq!(num_batches(16, 8), 2);
        assert_eq!(num_batches(0, 8), 0);
    }
}
