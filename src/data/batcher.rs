// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec of encoded
// translation pairs into two padded id tensors.
//
// Source and target sentences have different lengths, so each
// side is padded independently to the longest row *in this
// batch* (dynamic padding), using the pad id:
//
//   src: [2, 14, 9, 3]        →  [2, 14, 9, 3]
//        [2, 7, 3]            →  [2,  7, 3, 1]
//
// Each side uses the pad id of its own vocabulary. The model
// builds its attention pad masks from the same ids and the
// loss ignores target padding, so padded positions never
// contribute to the gradient.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::TranslationSample;

// ─── Seq2SeqBatch ─────────────────────────────────────────────────────────────
/// A padded batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// Encoder input ids, shape [batch_size, src_len]
    pub src: Tensor<B, 2, Int>,

    /// Full target ids including <sos> and <eos>, shape [batch_size, trg_len]
    /// The model shifts this itself for teacher forcing.
    pub trg: Tensor<B, 2, Int>,
}

// ─── Seq2SeqBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    /// The device to create tensors on
    pub device: B::Device,

    /// Pad id of the source vocabulary
    pub src_pad_id: u32,

    /// Pad id of the target vocabulary
    pub trg_pad_id: u32,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(device: B::Device, src_pad_id: u32, trg_pad_id: u32) -> Self {
        Self { device, src_pad_id, trg_pad_id }
    }
}

/// Right-pad every row to the longest one and flatten row-major.
fn pad_rows<'a>(
    rows:   impl Iterator<Item = &'a Vec<u32>> + Clone,
    pad_id: u32,
) -> (Vec<i32>, usize) {
    let width = rows.clone().map(Vec::len).max().unwrap_or(0);
    let flat = rows
        .flat_map(|row| {
            row.iter()
                .copied()
                .chain(std::iter::repeat(pad_id).take(width - row.len()))
                .map(|id| id as i32)
        })
        .collect();
    (flat, width)
}

impl<B: Backend> Batcher<TranslationSample, Seq2SeqBatch<B>> for Seq2SeqBatcher<B> {
    fn batch(&self, items: Vec<TranslationSample>) -> Seq2SeqBatch<B> {
        let batch_size = items.len();

        let (src_flat, src_len) = pad_rows(items.iter().map(|s| &s.src_ids), self.src_pad_id);
        let (trg_flat, trg_len) = pad_rows(items.iter().map(|s| &s.trg_ids), self.trg_pad_id);

        let src = Tensor::<B, 1, Int>::from_ints(src_flat.as_slice(), &self.device)
            .reshape([batch_size, src_len]);
        let trg = Tensor::<B, 1, Int>::from_ints(trg_flat.as_slice(), &self.device)
            .reshape([batch_size, trg_len]);

        Seq2SeqBatch { src, trg }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_pads_each_side_to_longest_row() {
        let batcher = Seq2SeqBatcher::<TestBackend>::new(Default::default(), 1, 0);
        let batch = batcher.batch(vec![
            TranslationSample::new(vec![2, 14, 9, 3], vec![2, 5, 3]),
            TranslationSample::new(vec![2, 7, 3],     vec![2, 6, 8, 11, 3]),
        ]);

        assert_eq!(batch.src.dims(), [2, 4]);
        assert_eq!(batch.trg.dims(), [2, 5]);

        let src: Vec<i64> = batch.src.into_data().iter::<i64>().collect();
        assert_eq!(src, vec![2, 14, 9, 3, 2, 7, 3, 1]);

        let trg: Vec<i64> = batch.trg.into_data().iter::<i64>().collect();
        assert_eq!(trg, vec![2, 5, 3, 0, 0, 2, 6, 8, 11, 3]);
    }
}
