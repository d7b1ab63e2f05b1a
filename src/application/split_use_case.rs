// ============================================================
// Layer 2 — SplitUseCase
// ============================================================
// Reads the labeled source dataset and cuts it into
// train / validation / (test) partitions. With a destination
// the partitions are written to disk; otherwise they are only
// returned.

use anyhow::Result;
use std::path::PathBuf;

use crate::data::{
    loader::JsonlSource,
    splitter::{split_dataset, DatasetSplits, SplitConfig},
};
use crate::domain::traits::SampleSource;

pub struct SplitUseCase {
    source: Box<dyn SampleSource>,
    dest:   Option<PathBuf>,
    config: SplitConfig,
}

impl SplitUseCase {
    pub fn new(source: impl Into<PathBuf>, dest: Option<PathBuf>, config: SplitConfig) -> Self {
        Self { source: Box::new(JsonlSource::new(source)), dest, config }
    }

    pub fn execute(&self) -> Result<DatasetSplits> {
        let rows = self.source.load_all()?;
        anyhow::ensure!(!rows.is_empty(), "source dataset is empty");

        let splits = split_dataset(rows, &self.config);
        if let Some(dir) = &self.dest {
            splits.save_to_disk(dir)?;
        }
        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::write_jsonl;
    use crate::domain::sample::LabeledSample;
    use tempfile::TempDir;

    #[test]
    fn test_split_and_save() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("rows.jsonl");
        let rows: Vec<LabeledSample> = (0..20)
            .map(|i| LabeledSample::new(format!("row {i}"), vec![1.0, 0.0]))
            .collect();
        write_jsonl(&source, &rows).unwrap();

        let dest = tmp.path().join("dataset");
        let splits = SplitUseCase::new(&source, Some(dest.clone()), SplitConfig::default())
            .execute()
            .unwrap();

        assert_eq!(splits.train.len(), 16);
        assert_eq!(splits.validation.len(), 2);
        assert_eq!(DatasetSplits::load_from_disk(&dest).unwrap(), splits);
    }

    #[test]
    fn test_without_destination_nothing_is_written() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("rows.jsonl");
        write_jsonl(&source, &[LabeledSample::new("only row", vec![0.0])]).unwrap();

        let splits = SplitUseCase::new(&source, None, SplitConfig::default()).execute().unwrap();
        assert_eq!(splits.train.len() + splits.validation.len(), 0);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
