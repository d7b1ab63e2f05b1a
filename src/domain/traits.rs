// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================

use anyhow::Result;

use crate::domain::sample::LabeledSample;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce the rows of a labeled dataset.
///
/// Implementations:
///   - JsonlSource → reads a JSON Lines file
pub trait SampleSource {
    fn load_all(&self) -> Result<Vec<LabeledSample>>;
}

// ─── LabelDecoder ─────────────────────────────────────────────────────────────
/// Maps a binary prediction vector back to human-readable labels.
///
/// Implementations:
///   - LabelNames → one name per class, loaded from JSON
pub trait LabelDecoder {
    /// Returns the names of every position set to 1
    fn decode(&self, binary: &[u8]) -> Vec<String>;
}

/// Ordered list of class names; position i names class i.
#[derive(Debug, Clone)]
pub struct LabelNames {
    names: Vec<String>,
}

impl LabelNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

impl LabelDecoder for LabelNames {
    fn decode(&self, binary: &[u8]) -> Vec<String> {
        binary
            .iter()
            .zip(&self.names)
            .filter(|(&bit, _)| bit == 1)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_picks_set_positions() {
        let names = LabelNames::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(names.decode(&[1, 0, 1]), vec!["a", "c"]);
        assert!(names.decode(&[0, 0, 0]).is_empty());
    }
}
