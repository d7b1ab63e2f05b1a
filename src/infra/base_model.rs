// ============================================================
// Layer 6 — Base Model Store
// ============================================================
// A base model directory (the `model_ckpt` the trainer starts
// from) holds:
//
//   tokenizer.json   HuggingFace tokenizer
//   config.json      EncoderConfig (architecture)
//   encoder.mpk      pretrained encoder weights (optional)
//
// The classifier built from it is the base encoder plus a new,
// randomly initialised linear head sized to the class count.
// Without `encoder.mpk` the encoder is randomly initialised too.
//
// `bootstrap` writes such a directory from a text corpus so the
// pipeline can run with no pretrained artefacts at all.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use burn::{
    backend::ndarray::{NdArray, NdArrayDevice},
    config::Config,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use tokenizers::Tokenizer;

use crate::infra::tokenizer_store::{vocab_upper_bound, TokenizerStore, TOKENIZER_FILE};
use crate::ml::model::{EncoderConfig, SequenceClassifier, SequenceClassifierConfig};

pub const ENCODER_CONFIG_FILE: &str = "config.json";
/// Recorder adds the `.mpk` extension
pub const ENCODER_WEIGHTS_STEM: &str = "encoder";

#[derive(Debug, Clone)]
pub struct BaseModel {
    dir: PathBuf,
}

impl BaseModel {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        for file in [TOKENIZER_FILE, ENCODER_CONFIG_FILE] {
            anyhow::ensure!(
                dir.join(file).is_file(),
                "'{}' is not a base model directory: missing {file}. Run 'bootstrap' to create one.",
                dir.display()
            );
        }

        let base = Self { dir };
        let vocab_size = base.encoder_config()?.vocab_size;
        let needed = vocab_upper_bound(&base.tokenizer()?);
        anyhow::ensure!(
            needed <= vocab_size,
            "Tokenizer in '{}' emits ids up to {} but {ENCODER_CONFIG_FILE} has vocab_size {vocab_size}",
            base.dir.display(),
            needed - 1,
        );
        Ok(base)
    }

    /// Fail unless sequences of `max_len` tokens fit the encoder's
    /// position embeddings.
    pub fn check_max_len(&self, max_len: usize) -> Result<()> {
        let limit = self.encoder_config()?.max_position_embeddings;
        anyhow::ensure!(
            max_len <= limit,
            "max_len {max_len} exceeds the encoder's max_position_embeddings ({limit}) in '{}'",
            self.dir.display()
        );
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tokenizer(&self) -> Result<Tokenizer> {
        TokenizerStore::new(&self.dir).load()
    }

    pub fn encoder_config(&self) -> Result<EncoderConfig> {
        let path = self.dir.join(ENCODER_CONFIG_FILE);
        EncoderConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load encoder config '{}': {e:?}", path.display()))
    }

    pub fn has_pretrained_weights(&self) -> bool {
        self.weights_path().with_extension("mpk").is_file()
    }

    fn weights_path(&self) -> PathBuf {
        self.dir.join(ENCODER_WEIGHTS_STEM)
    }

    /// Encoder (pretrained when weights exist) plus a fresh head.
    pub fn classifier<B: Backend>(
        &self,
        num_classes: usize,
        device:      &B::Device,
    ) -> Result<SequenceClassifier<B>> {
        let config = SequenceClassifierConfig::new(self.encoder_config()?, num_classes);
        let model = config.init::<B>(device);

        if self.has_pretrained_weights() {
            tracing::info!("Loading pretrained encoder from '{}'", self.dir.display());
            model.load_encoder_file(&self.weights_path(), device)
        } else {
            tracing::warn!(
                "No pretrained encoder weights in '{}', starting from random initialisation",
                self.dir.display()
            );
            Ok(model)
        }
    }

    /// Create a base model directory from `texts`: word-level tokenizer,
    /// `template` architecture (vocab size taken from the tokenizer) and
    /// randomly initialised encoder weights.
    pub fn bootstrap(
        dir:        impl Into<PathBuf>,
        texts:      &[String],
        vocab_size: usize,
        template:   &EncoderConfig,
        seed:       u64,
    ) -> Result<Self> {
        let dir = dir.into();
        let tokenizer = TokenizerStore::new(&dir).build_and_save(texts, vocab_size)?;

        let mut config = template.clone();
        config.vocab_size = vocab_upper_bound(&tokenizer);

        let config_path = dir.join(ENCODER_CONFIG_FILE);
        config
            .save(&config_path)
            .with_context(|| format!("Cannot write '{}'", config_path.display()))?;

        NdArray::<f32>::seed(seed);
        let encoder = config.init::<NdArray<f32>>(&NdArrayDevice::Cpu);
        let weights = dir.join(ENCODER_WEIGHTS_STEM);
        encoder
            .save_file(weights.clone(), &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
            .map_err(|e| anyhow::anyhow!("Cannot save encoder weights to '{}': {e}", weights.display()))?;

        tracing::info!(
            vocab_size = config.vocab_size,
            d_model = config.d_model,
            num_layers = config.num_layers,
            "Bootstrapped base model in '{}'",
            dir.display()
        );
        Self::open(dir)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tiny_template() -> EncoderConfig {
        EncoderConfig::new(0)
            .with_max_position_embeddings(32)
            .with_d_model(16)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(32)
            .with_dropout(0.0)
    }

    fn corpus() -> Vec<String> {
        vec!["goal scored late".into(), "market prices fell".into(), "late goal".into()]
    }

    #[test]
    fn test_bootstrap_writes_all_artefacts() {
        let tmp = TempDir::new().unwrap();
        let base = BaseModel::bootstrap(tmp.path(), &corpus(), 100, &tiny_template(), 7).unwrap();

        assert!(tmp.path().join(TOKENIZER_FILE).is_file());
        assert!(tmp.path().join(ENCODER_CONFIG_FILE).is_file());
        assert!(base.has_pretrained_weights());

        let cfg = base.encoder_config().unwrap();
        assert_eq!(cfg.d_model, 16);
        assert_eq!(cfg.vocab_size, vocab_upper_bound(&base.tokenizer().unwrap()));
    }

    #[test]
    fn test_classifier_restores_encoder_weights() {
        let tmp = TempDir::new().unwrap();
        let base = BaseModel::bootstrap(tmp.path(), &corpus(), 100, &tiny_template(), 7).unwrap();
        let device = NdArrayDevice::Cpu;

        let a = base.classifier::<NdArray<f32>>(3, &device).unwrap();
        let b = base.classifier::<NdArray<f32>>(3, &device).unwrap();

        let wa: Vec<f32> = a.encoder.token_embedding.weight.val().into_data().to_vec().unwrap();
        let wb: Vec<f32> = b.encoder.token_embedding.weight.val().into_data().to_vec().unwrap();
        assert_eq!(wa, wb);
    }

    #[test]
    fn test_open_rejects_tokenizer_larger_than_vocab() {
        let tmp = TempDir::new().unwrap();
        let base = BaseModel::bootstrap(tmp.path(), &corpus(), 100, &tiny_template(), 7).unwrap();

        let mut cfg = base.encoder_config().unwrap();
        cfg.vocab_size = 32;
        cfg.save(tmp.path().join(ENCODER_CONFIG_FILE)).unwrap();

        let err = BaseModel::open(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("vocab_size 32"), "{err}");
    }

    #[test]
    fn test_check_max_len_against_position_table() {
        let tmp = TempDir::new().unwrap();
        let base = BaseModel::bootstrap(tmp.path(), &corpus(), 100, &tiny_template(), 7).unwrap();

        assert!(base.check_max_len(32).is_ok());
        assert!(base.check_max_len(33).is_err());
    }

    #[test]
    fn test_open_rejects_incomplete_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(BaseModel::open(tmp.path()).is_err());
    }
}
