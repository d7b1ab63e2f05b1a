// ============================================================
// Layer 3 — Sample Domain Types
// ============================================================
// A labeled sample is one row of the tabular dataset: a text
// and a multi-hot label vector with one entry per class.
//
// Multi-hot means several positions may be 1 at once:
//   classes: [sports, politics, economy]
//   "Budget row delays stadium" → [1, 1, 1]
//   "Cup final tonight"         → [1, 0, 0]
//
// An indexed sample additionally remembers which row of the
// source dataset it came from, so partitions stay traceable
// after shuffling.

use serde::{Deserialize, Serialize};

/// One row of the source dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub text: String,

    /// Multi-hot vector, length = number of classes
    pub labels: Vec<f32>,
}

impl LabeledSample {
    pub fn new(text: impl Into<String>, labels: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            labels,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }
}

/// A labeled sample tagged with its original row position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedSample {
    /// 0-based row number in the source dataset
    pub idx: u64,
    pub text: String,
    pub labels: Vec<f32>,
}

impl IndexedSample {
    pub fn new(idx: u64, sample: LabeledSample) -> Self {
        Self {
            idx,
            text: sample.text,
            labels: sample.labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_sample_keeps_row_identity() {
        let s = IndexedSample::new(7, LabeledSample::new("hello", vec![1.0, 0.0]));
        assert_eq!(s.idx, 7);
        assert_eq!(s.text, "hello");
        assert_eq!(s.labels, vec![1.0, 0.0]);
    }

    #[test]
    fn test_row_json_shape() {
        let row: LabeledSample =
            serde_json::from_str(r#"{"text": "a b", "labels": [0, 1, 1]}"#).unwrap();
        assert_eq!(row.num_classes(), 3);
        assert_eq!(row.labels, vec![0.0, 1.0, 1.0]);
    }
}
