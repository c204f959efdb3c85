use burn::{
    nn::{
        attention::generate_autoregressive_mask,
        transformer::{
            TransformerDecoder, TransformerDecoderConfig, TransformerDecoderInput,
            TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput,
        },
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
        PositionalEncoding, PositionalEncodingConfig,
    },
    prelude::*,
    tensor::activation::log_softmax,
};

#[derive(Config, Debug)]
pub struct Seq2SeqTransformerConfig {
    pub src_vocab_size: usize,
    pub trg_vocab_size: usize,
    pub src_pad_id:     usize,
    pub trg_pad_id:     usize,
    pub max_len:        usize,
    pub d_model:        usize,
    pub n_heads:        usize,
    pub n_layers:       usize,
    pub d_ff:           usize,
    pub dropout:        f64,
}

impl Seq2SeqTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqTransformer<B> {
        let positional = || {
            PositionalEncodingConfig::new(self.d_model)
                .with_max_sequence_size(self.max_len)
                .init(device)
        };
        let encoder = TransformerEncoderConfig::new(self.d_model, self.d_ff, self.n_heads, self.n_layers)
            .with_dropout(self.dropout)
            .init(device);
        let decoder = TransformerDecoderConfig::new(self.d_model, self.d_ff, self.n_heads, self.n_layers)
            .with_dropout(self.dropout)
            .init(device);

        Seq2SeqTransformer {
            src_embedding: EmbeddingConfig::new(self.src_vocab_size, self.d_model).init(device),
            trg_embedding: EmbeddingConfig::new(self.trg_vocab_size, self.d_model).init(device),
            src_position:  positional(),
            trg_position:  positional(),
            encoder,
            decoder,
            generator:     LinearConfig::new(self.d_model, self.trg_vocab_size).init(device),
            dropout:       DropoutConfig::new(self.dropout).init(),
            src_pad_id:    self.src_pad_id,
            trg_pad_id:    self.trg_pad_id,
        }
    }
}

#[derive(Module, Debug)]
pub struct Seq2SeqTransformer<B: Backend> {
    pub src_embedding: Embedding<B>,
    pub trg_embedding: Embedding<B>,
    pub src_position:  PositionalEncoding<B>,
    pub trg_position:  PositionalEncoding<B>,
    pub encoder:       TransformerEncoder<B>,
    pub decoder:       TransformerDecoder<B>,
    pub generator:     Linear<B>,
    pub dropout:       Dropout,
    pub src_pad_id:    usize,
    pub trg_pad_id:    usize,
}

/// Split a full target batch for teacher forcing.
///
/// trg: [batch, seq_len] → decoder input trg[:, :-1] and gold trg[:, 1:],
/// both [batch, seq_len - 1]. Position t of the decoder sees tokens 0..=t
/// and is scored against token t + 1.
pub fn teacher_forcing_split<B: Backend>(
    trg: Tensor<B, 2, Int>,
) -> (Tensor<B, 2, Int>, Tensor<B, 2, Int>) {
    let [batch_size, seq_len] = trg.dims();
    let decoder_input = trg.clone().slice([0..batch_size, 0..seq_len - 1]);
    let gold          = trg.slice([0..batch_size, 1..seq_len]);
    (decoder_input, gold)
}

impl<B: Backend> Seq2SeqTransformer<B> {
    /// src: [batch, src_len], trg: [batch, trg_len] → logits [batch, trg_len, trg_vocab]
    pub fn forward(&self, src: Tensor<B, 2, Int>, trg: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let device = src.device();
        let [batch_size, trg_len] = trg.dims();

        // true marks padding
        let src_pad_mask = src.clone().equal_elem(self.src_pad_id as i64);
        let trg_pad_mask = trg.clone().equal_elem(self.trg_pad_id as i64);

        let src_emb = self.src_position.forward(self.src_embedding.forward(src));
        let memory  = self.encoder.forward(
            TransformerEncoderInput::new(self.dropout.forward(src_emb))
                .mask_pad(src_pad_mask.clone()),
        );

        // Each target position may only attend to itself and earlier positions.
        let causal  = generate_autoregressive_mask::<B>(batch_size, trg_len, &device);
        let trg_emb = self.trg_position.forward(self.trg_embedding.forward(trg));
        let decoded = self.decoder.forward(
            TransformerDecoderInput::new(self.dropout.forward(trg_emb), memory)
                .target_mask_pad(trg_pad_mask)
                .target_mask_attn(causal)
                .memory_mask_pad(src_pad_mask),
        );

        self.generator.forward(decoded)
    }

    /// Parameter count plus the shapes of the vocabulary-sized tables.
    /// Two models with equal signatures can exchange weight records.
    pub fn shape_signature(&self) -> (usize, [usize; 2], [usize; 2], [usize; 2]) {
        (
            self.num_params(),
            self.src_embedding.weight.val().dims(),
            self.trg_embedding.weight.val().dims(),
            self.generator.weight.val().dims(),
        )
    }

    /// Teacher-forced cross-entropy for one batch, averaged over non-pad
    /// target tokens.
    pub fn forward_loss(&self, src: Tensor<B, 2, Int>, trg: Tensor<B, 2, Int>) -> Tensor<B, 1> {
        let (decoder_input, gold) = teacher_forcing_split(trg);
        let logits = self.forward(src, decoder_input);

        let [batch_size, steps, vocab] = logits.dims();
        let logits = logits.reshape([batch_size * steps, vocab]);
        let gold   = gold.reshape([batch_size * steps]);

        self.masked_cross_entropy(logits, gold)
    }

    /// Burn's CrossEntropyLoss divides by every position, padding included.
    /// Dividing by the non-pad count keeps batch losses comparable when
    /// padding varies from batch to batch.
    fn masked_cross_entropy(&self, logits: Tensor<B, 2>, gold: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [n] = gold.dims();
        let keep = gold.clone().not_equal_elem(self.trg_pad_id as i64).float();

        let picked = log_softmax(logits, 1)
            .gather(1, gold.reshape([n, 1]))
            .reshape([n]);

        let count = keep.clone().sum().clamp_min(1.0);
        (picked * keep).sum().neg() / count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn tiny_config() -> Seq2SeqTransformerConfig {
        Seq2SeqTransformerConfig::new(12, 10, 1, 1, 16, 8, 2, 1, 16, 0.0)
    }

    fn ids(rows: &[&[i32]]) -> Tensor<TestBackend, 2, Int> {
        let width = rows[0].len();
        let flat: Vec<i32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &Default::default())
            .reshape([rows.len(), width])
    }

    #[test]
    fn test_teacher_forcing_drops_last_and_first_token() {
        let trg = ids(&[&[2, 5, 6, 3], &[2, 7, 3, 1]]);
        let (input, gold) = teacher_forcing_split(trg);

        assert_eq!(input.dims(), [2, 3]);
        assert_eq!(gold.dims(),  [2, 3]);

        let input: Vec<i64> = input.into_data().iter::<i64>().collect();
        let gold:  Vec<i64> = gold.into_data().iter::<i64>().collect();
        assert_eq!(input, vec![2, 5, 6, 2, 7, 3]);
        assert_eq!(gold,  vec![5, 6, 3, 7, 3, 1]);
    }

    #[test]
    fn test_forward_output_shape() {
        let model: Seq2SeqTransformer<TestBackend> = tiny_config().init(&Default::default());
        let src = ids(&[&[2, 4, 5, 3, 1], &[2, 6, 3, 1, 1]]);
        let trg = ids(&[&[2, 8, 9], &[2, 4, 1]]);

        let logits = model.forward(src, trg);
        assert_eq!(logits.dims(), [2, 3, 10]);
    }

    #[test]
    fn test_loss_is_finite_and_positive() {
        let model: Seq2SeqTransformer<TestBackend> = tiny_config().init(&Default::default());
        let src = ids(&[&[2, 4, 5, 3], &[2, 6, 3, 1]]);
        let trg = ids(&[&[2, 8, 9, 3], &[2, 4, 3, 1]]);

        let loss: f64 = model.forward_loss(src, trg).into_scalar().elem::<f64>();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_padding_does_not_change_loss() {
        let model: Seq2SeqTransformer<TestBackend> = tiny_config().init(&Default::default());

        let short: f64 = model
            .forward_loss(ids(&[&[2, 4, 3]]), ids(&[&[2, 8, 3]]))
            .into_scalar()
            .elem::<f64>();
        let padded: f64 = model
            .forward_loss(ids(&[&[2, 4, 3, 1, 1]]), ids(&[&[2, 8, 3, 1, 1]]))
            .into_scalar()
            .elem::<f64>();

        assert!((short - padded).abs() < 1e-4, "short={short} padded={padded}");
    }
}
