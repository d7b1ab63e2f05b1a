// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the base model's tokenizer (`tokenizer.json`, the
// HuggingFace tokenizers format) and, for bootstrapping a base
// model offline, builds a word-level tokenizer from a corpus.
//
// The built tokenizer follows the BERT conventions:
//   - BertNormalizer (lowercase, clean text)
//   - Whitespace pre-tokenizer
//   - BertProcessing post-processor → [CLS] text [SEP]
//   - special ids [PAD]=0 [UNK]=1 [CLS]=101 [SEP]=102 [MASK]=103
//
// The JSON is assembled directly and parsed back, which avoids
// the trainer type juggling of the tokenizers crate.

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::PathBuf};
use tokenizers::Tokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const PAD_TOKEN: &str = "[PAD]";

const SPECIAL_TOKENS: [(&str, u32); 5] = [
    ("[PAD]", 0),
    ("[UNK]", 1),
    ("[CLS]", 101),
    ("[SEP]", 102),
    ("[MASK]", 103),
];
const FIRST_WORD_ID: usize = 104;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load the tokenizer saved in this directory
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path).map_err(|e| {
            anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e)
        })
    }

    /// Build a word-level tokenizer from `texts`, write it to this
    /// directory and return it.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let json = word_level_json(texts, vocab_size);
        let path = self.path();
        fs::write(&path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", path.display()))?;

        tracing::info!("Tokenizer saved to '{}'", path.display());
        self.load()
    }
}

/// Build a word-level tokenizer in memory (no file written).
pub fn build_word_level(texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
    let json = word_level_json(texts, vocab_size);
    Tokenizer::from_bytes(serde_json::to_vec(&json)?)
        .map_err(|e| anyhow::anyhow!("Cannot build tokenizer: {e}"))
}

/// Highest token id the tokenizer can emit, plus one.
pub fn vocab_upper_bound(tokenizer: &Tokenizer) -> usize {
    tokenizer
        .get_vocab(true)
        .values()
        .copied()
        .max()
        .map_or(0, |id| id as usize + 1)
}

fn word_level_json(texts: &[String], vocab_size: usize) -> serde_json::Value {
    // ── Step 1: Count word frequencies ───────────────────────────────────────
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in text.split_whitespace() {
            let w = word.to_lowercase();
            let w = w.trim_matches(|c: char| !c.is_alphanumeric());
            if !w.is_empty() {
                *freq.entry(w.to_string()).or_insert(0) += 1;
            }
        }
    }

    // Most frequent first; ties broken alphabetically so the ids
    // are stable across runs (HashMap order is not)
    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

    // ── Step 2: Vocabulary ───────────────────────────────────────────────────
    let mut vocab = serde_json::Map::new();
    for (token, id) in SPECIAL_TOKENS {
        vocab.insert(token.to_string(), serde_json::json!(id));
    }
    for (offset, (word, _)) in words.iter().enumerate() {
        vocab.insert(word.clone(), serde_json::json!(FIRST_WORD_ID + offset));
    }

    let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
        .iter()
        .map(|(token, id)| {
            serde_json::json!({
                "id": id, "content": token, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            })
        })
        .collect();

    // ── Step 3: HuggingFace tokenizer JSON ───────────────────────────────────
    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", 102],
            "cls": ["[CLS]", 101]
        },
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn corpus() -> Vec<String> {
        vec!["the cat sat".into(), "the dog ran, the end".into()]
    }

    #[test]
    fn test_built_tokenizer_adds_cls_and_sep() {
        let tok = build_word_level(&corpus(), 100).unwrap();
        let enc = tok.encode("the cat", true).unwrap();
        assert_eq!(enc.get_ids().first(), Some(&101));
        assert_eq!(enc.get_ids().last(), Some(&102));
        assert_eq!(enc.get_ids().len(), 4);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let tok = build_word_level(&corpus(), 100).unwrap();
        let enc = tok.encode("zebra", false).unwrap();
        assert_eq!(enc.get_ids(), &[1]);
    }

    #[test]
    fn test_most_frequent_word_gets_first_id() {
        let tok = build_word_level(&corpus(), 100).unwrap();
        assert_eq!(tok.token_to_id("the"), Some(FIRST_WORD_ID as u32));
    }

    #[test]
    fn test_vocab_size_caps_word_count() {
        let tok = build_word_level(&corpus(), 7).unwrap();
        // 5 specials + the two most frequent words
        assert_eq!(tok.get_vocab(true).len(), 7);
        assert_eq!(vocab_upper_bound(&tok), FIRST_WORD_ID + 2);
    }

    #[test]
    fn test_build_and_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = TokenizerStore::new(tmp.path());
        store.build_and_save(&corpus(), 50).unwrap();
        assert!(store.path().is_file());
        assert!(store.load().unwrap().token_to_id("cat").is_some());
    }
}
