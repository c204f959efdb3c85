use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One encoded translation pair.
/// Both sides are framed as `<sos> tokens… <eos>` and unpadded;
/// padding happens per batch in the batcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSample {
    pub src_ids: Vec<u32>,
    pub trg_ids: Vec<u32>,
}

impl TranslationSample {
    pub fn new(src_ids: Vec<u32>, trg_ids: Vec<u32>) -> Self {
        Self { src_ids, trg_ids }
    }

    /// The decoder needs at least one input and one predicted position.
    pub fn is_trainable(&self) -> bool {
        !self.src_ids.is_empty() && self.trg_ids.len() >= 2
    }
}

pub struct TranslationDataset {
    samples: Vec<TranslationSample>,
}

impl TranslationDataset {
    pub fn new(samples: Vec<TranslationSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }
}

impl Dataset<TranslationSample> for TranslationDataset {
    fn get(&self, index: usize) -> Option<TranslationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
