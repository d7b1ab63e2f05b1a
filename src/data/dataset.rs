use anyhow::Result;
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::encoder::SampleEncoder;
use crate::domain::sample::IndexedSample;

/// One tokenised, padded sample.
/// Sequence format: [CLS] text [SEP] [PAD]...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedSample {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels:         Vec<f32>,
}

/// A dataset partition, encoded up front so tokenizer errors
/// surface when the loader is built rather than mid-epoch.
pub struct PartitionDataset {
    samples: Vec<EncodedSample>,
}

impl PartitionDataset {
    pub fn new(samples: Vec<EncodedSample>) -> Self { Self { samples } }

    pub fn encode(partition: &[IndexedSample], encoder: &SampleEncoder) -> Result<Self> {
        let samples = partition
            .iter()
            .map(|row| encoder.encode(&row.text, &row.labels))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { samples })
    }
}

impl Dataset<EncodedSample> for PartitionDataset {
    fn get(&self, index: usize) -> Option<EncodedSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::LabeledSample;
    use crate::infra::tokenizer_store::build_word_level;

    #[test]
    fn test_encode_partition_in_order() {
        let corpus = vec!["red green blue".to_string()];
        let encoder = SampleEncoder::new(build_word_level(&corpus, 50).unwrap(), 6).unwrap();
        let rows = vec![
            IndexedSample::new(4, LabeledSample::new("red", vec![1.0, 0.0])),
            IndexedSample::new(9, LabeledSample::new("green blue", vec![0.0, 1.0])),
        ];

        let ds = PartitionDataset::encode(&rows, &encoder).unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.get(2).is_none());

        let second = ds.get(1).unwrap();
        assert_eq!(second.labels, vec![0.0, 1.0]);
        assert_eq!(second.attention_mask, vec![1, 1, 1, 1, 0, 0]);
    }
}
