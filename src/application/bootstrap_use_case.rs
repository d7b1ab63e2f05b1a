// ============================================================
// Layer 2 — BootstrapUseCase
// ============================================================
// Creates a base model directory from the texts of a labeled
// dataset so `train` can run without pretrained artefacts.

use anyhow::Result;
use std::path::PathBuf;

use crate::data::loader::JsonlSource;
use crate::domain::traits::SampleSource;
use crate::infra::base_model::BaseModel;
use crate::ml::model::EncoderConfig;

pub struct BootstrapUseCase {
    corpus:     PathBuf,
    out_dir:    PathBuf,
    vocab_size: usize,
    encoder:    EncoderConfig,
    seed:       u64,
}

impl BootstrapUseCase {
    pub fn new(
        corpus:     impl Into<PathBuf>,
        out_dir:    impl Into<PathBuf>,
        vocab_size: usize,
        encoder:    EncoderConfig,
        seed:       u64,
    ) -> Self {
        Self { corpus: corpus.into(), out_dir: out_dir.into(), vocab_size, encoder, seed }
    }

    pub fn execute(&self) -> Result<BaseModel> {
        anyhow::ensure!(
            self.encoder.d_model % self.encoder.num_heads == 0,
            "d_model ({}) must be divisible by num_heads ({})",
            self.encoder.d_model,
            self.encoder.num_heads
        );

        let texts: Vec<String> = JsonlSource::new(&self.corpus)
            .load_all()?
            .into_iter()
            .map(|row| row.text)
            .collect();
        anyhow::ensure!(!texts.is_empty(), "corpus '{}' has no rows", self.corpus.display());

        BaseModel::bootstrap(&self.out_dir, &texts, self.vocab_size, &self.encoder, self.seed)
    }
}
