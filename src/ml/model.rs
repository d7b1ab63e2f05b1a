use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::{BinaryCrossEntropyLossConfig, CrossEntropyLossConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use std::path::Path;

use crate::data::batcher::ClassificationBatch;
use crate::domain::problem::ProblemType;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size: usize,
    #[config(default = 512)]
    pub max_position_embeddings: usize,
    #[config(default = 256)]
    pub d_model: usize,
    #[config(default = 8)]
    pub num_heads: usize,
    #[config(default = 6)]
    pub num_layers: usize,
    #[config(default = 1024)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerEncoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_position_embeddings, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        TransformerEncoder {
            token_embedding, position_embedding, layers, final_norm, dropout,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad` is true at padding positions, which attention ignores.
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let input = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct TransformerEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
}

impl<B: Backend> TransformerEncoder<B> {
    /// input_ids, attention_mask: [batch, seq_len] → hidden: [batch, seq_len, d_model]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mask_pad = attention_mask.equal_elem(0);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        self.final_norm.forward(x)
    }
}

// ─── Sequence classifier ──────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct SequenceClassifierConfig {
    pub encoder:     EncoderConfig,
    pub num_classes: usize,
}

impl SequenceClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceClassifier<B> {
        SequenceClassifier {
            encoder:    self.encoder.init(device),
            dropout:    DropoutConfig::new(self.encoder.dropout).init(),
            classifier: LinearConfig::new(self.encoder.d_model, self.num_classes).init(device),
        }
    }
}

/// Encoder plus a linear head over the [CLS] position.
#[derive(Module, Debug)]
pub struct SequenceClassifier<B: Backend> {
    pub encoder:    TransformerEncoder<B>,
    pub dropout:    Dropout,
    pub classifier: Linear<B>,
}

impl<B: Backend> SequenceClassifier<B> {
    /// → logits: [batch, num_classes]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let hidden = self.encoder.forward(input_ids, attention_mask);
        let [batch_size, _, d_model] = hidden.dims();

        let pooled = hidden
            .slice([0..batch_size, 0..1, 0..d_model])
            .reshape([batch_size, d_model]);

        self.classifier.forward(self.dropout.forward(pooled))
    }

    /// Forward pass plus the loss the problem type trains with:
    /// BCE-with-logits for multi-label, cross-entropy over the
    /// arg-max of the one-hot label row for single-label.
    pub fn forward_loss(
        &self,
        batch:   ClassificationBatch<B>,
        problem: ProblemType,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(batch.input_ids, batch.attention_mask);
        let device = logits.device();

        let loss = match problem {
            ProblemType::MultiLabel => BinaryCrossEntropyLossConfig::new()
                .with_logits(true)
                .init(&device)
                .forward(logits.clone(), batch.labels.int()),
            ProblemType::SingleLabel => {
                let targets = batch.labels.argmax(1).flatten::<1>(0, 1);
                CrossEntropyLossConfig::new()
                    .init(&device)
                    .forward(logits.clone(), targets)
            }
        };

        (loss, logits)
    }

    /// Replace the encoder weights with a record saved by
    /// `NamedMpkFileRecorder` (the base model's `encoder.mpk`).
    pub fn load_encoder_file(mut self, path: &Path, device: &B::Device) -> anyhow::Result<Self> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.encoder = self
            .encoder
            .load_file(path.to_path_buf(), &recorder, device)
            .map_err(|e| anyhow::anyhow!("Cannot load encoder weights from '{}': {e}", path.display()))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::backend::Autodiff;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn tiny_config(num_classes: usize) -> SequenceClassifierConfig {
        // ids 101/102 are [CLS]/[SEP]
        let encoder = EncoderConfig::new(128)
            .with_max_position_embeddings(16)
            .with_d_model(16)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(32)
            .with_dropout(0.0);
        SequenceClassifierConfig::new(encoder, num_classes)
    }

    fn batch<B: Backend>(device: &B::Device) -> ClassificationBatch<B> {
        ClassificationBatch {
            input_ids: Tensor::<B, 1, Int>::from_ints([101, 5, 6, 0, 101, 7, 0, 0], device)
                .reshape([2, 4]),
            attention_mask: Tensor::<B, 1, Int>::from_ints([1, 1, 1, 0, 1, 1, 0, 0], device)
                .reshape([2, 4]),
            labels: Tensor::<B, 1>::from_floats([1.0, 0.0, 1.0, 0.0, 1.0, 0.0], device)
                .reshape([2, 3]),
        }
    }

    #[test]
    fn test_logits_shape() {
        let device = NdArrayDevice::Cpu;
        let model = tiny_config(3).init::<TestBackend>(&device);
        let b = batch::<TestBackend>(&device);
        let logits = model.forward(b.input_ids, b.attention_mask);
        assert_eq!(logits.dims(), [2, 3]);
    }

    #[test]
    fn test_padding_does_not_change_cls_logits() {
        // Extra padding positions are masked out of attention
        let device = NdArrayDevice::Cpu;
        let model = tiny_config(2).init::<TestBackend>(&device);

        let short_ids  = Tensor::<TestBackend, 1, Int>::from_ints([101, 5, 102], &device).reshape([1, 3]);
        let short_mask = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 1], &device).reshape([1, 3]);
        let long_ids   = Tensor::<TestBackend, 1, Int>::from_ints([101, 5, 102, 0, 0], &device).reshape([1, 5]);
        let long_mask  = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 1, 0, 0], &device).reshape([1, 5]);

        let a: Vec<f32> = model.forward(short_ids, short_mask).into_data().to_vec().unwrap();
        let b: Vec<f32> = model.forward(long_ids, long_mask).into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{x} vs {y}");
        }
    }

    #[test]
    fn test_losses_are_finite_and_backpropagate() {
        let device = NdArrayDevice::Cpu;
        let model = tiny_config(3).init::<TestAutodiffBackend>(&device);

        for problem in [ProblemType::MultiLabel, ProblemType::SingleLabel] {
            let (loss, logits) = model.forward_loss(batch(&device), problem);
            assert_eq!(logits.dims(), [2, 3]);
            let value: f32 = loss.clone().into_scalar().elem();
            assert!(value.is_finite() && value > 0.0);
            let _grads = loss.backward();
        }
    }
}
