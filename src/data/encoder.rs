// ============================================================
// Layer 4 — Sample Encoder
// ============================================================
// Turns one (text, labels) pair into fixed-length vectors the
// model can consume:
//
//   "Cup final tonight", L = 8
//     tokens:         [CLS] cup final tonight [SEP]
//     input_ids:      101  212 388   977     102  0 0 0
//     attention_mask: 1    1   1     1       1    0 0 0
//
// Special tokens come from the tokenizer's post-processor.
// Truncation is delegated to the tokenizer so [SEP] survives
// when the text is too long; padding is applied here so the
// length is exactly L no matter how the tokenizer is set up.

use anyhow::Result;
use tokenizers::{Tokenizer, TruncationParams};

use crate::data::dataset::EncodedSample;
use crate::infra::tokenizer_store::PAD_TOKEN;

#[derive(Clone)]
pub struct SampleEncoder {
    tokenizer: Tokenizer,
    max_len:   usize,
    pad_id:    u32,
}

impl SampleEncoder {
    /// Wrap `tokenizer` so every encoding is truncated to `max_len`.
    pub fn new(mut tokenizer: Tokenizer, max_len: usize) -> Result<Self> {
        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id(PAD_TOKEN))
            .unwrap_or(0);

        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Invalid truncation length {max_len}: {e}"))?;

        Ok(Self { tokenizer, max_len, pad_id })
    }

    /// Token ids and attention mask with special tokens, truncated but
    /// not padded.
    pub fn encode_text(&self, text: &str) -> Result<(Vec<u32>, Vec<u32>)> {
        let enc = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;

        let mut ids  = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        ids.truncate(self.max_len);
        mask.truncate(self.max_len);
        Ok((ids, mask))
    }

    /// Encode one labeled text into exactly `max_len` positions.
    pub fn encode(&self, text: &str, labels: &[f32]) -> Result<EncodedSample> {
        let (mut input_ids, mut attention_mask) = self.encode_text(text)?;

        input_ids.resize(self.max_len, self.pad_id);
        attention_mask.resize(self.max_len, 0);

        Ok(EncodedSample {
            input_ids,
            attention_mask,
            labels: labels.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::build_word_level;

    fn encoder(max_len: usize) -> SampleEncoder {
        let corpus = vec!["alpha beta gamma delta epsilon zeta eta theta".to_string()];
        SampleEncoder::new(build_word_level(&corpus, 100).unwrap(), max_len).unwrap()
    }

    #[test]
    fn test_short_text_is_padded_to_max_len() {
        let e = encoder(8);
        let s = e.encode("alpha beta", &[1.0, 0.0]).unwrap();
        assert_eq!(s.input_ids.len(), 8);
        assert_eq!(s.attention_mask, vec![1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(&s.input_ids[4..], &[0, 0, 0, 0]);
        assert_eq!(s.labels, vec![1.0, 0.0]);
    }

    #[test]
    fn test_long_text_is_truncated_and_keeps_sep() {
        let e = encoder(5);
        let s = e
            .encode("alpha beta gamma delta epsilon zeta", &[0.0])
            .unwrap();
        assert_eq!(s.input_ids.len(), 5);
        assert_eq!(s.input_ids[0], 101);
        assert_eq!(s.input_ids[4], 102);
        assert!(s.attention_mask.iter().all(|&m| m == 1));
    }

    #[test]
    fn test_mask_marks_min_of_tokens_and_max_len() {
        let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta"];
        for max_len in [3, 6, 10] {
            let e = encoder(max_len);
            for n in 0..=words.len() {
                let text = words[..n].join(" ");
                let s = e.encode(&text, &[]).unwrap();
                let attended: u32 = s.attention_mask.iter().sum();
                // n words + [CLS] + [SEP]
                assert_eq!(attended as usize, (n + 2).min(max_len));
                assert_eq!(s.input_ids.len(), max_len);
                assert_eq!(s.attention_mask.len(), max_len);
            }
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let e = encoder(6);
        assert_eq!(
            e.encode("gamma alpha", &[1.0]).unwrap(),
            e.encode("gamma alpha", &[1.0]).unwrap()
        );
    }
}
