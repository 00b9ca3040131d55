use std::fmt;

use async_trait::async_trait;
use nn_core::{Embedding, Error, Result, TextEmbedder};

use crate::tokenizer::Tokenizer;

pub const DEFAULT_DIMS: usize = 128;

/// Weight of a token bigram relative to a single token.
const BIGRAM_WEIGHT: f32 = 0.5;

/// Local embedding model: signed feature hashing of tokens and token bigrams,
/// L2 normalized. No network, no model files, same output for the same text.
pub struct HashingModel {
    tokenizer: Tokenizer,
    dims: usize,
}

impl fmt::Debug for HashingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashingModel")
            .field("dims", &self.dims)
            .finish()
    }
}

impl HashingModel {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::EmbeddingUnavailable(
                "hashing model needs at least one dimension".to_string(),
            ));
        }
        Ok(Self {
            tokenizer: Tokenizer::default(),
            dims,
        })
    }

    fn accumulate(&self, vector: &mut [f32], feature: u64, weight: f32) {
        let bucket = (feature % self.dims as u64) as usize;
        let sign = if (feature / self.dims as u64) % 2 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl TextEmbedder for HashingModel {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let tokens = self.tokenizer.tokenize(text);
        if tokens.is_empty() {
            return Err(Error::InvalidInput("text is empty after normalization".to_string()));
        }

        let mut vector = vec![0.0; self.dims];
        for token in &tokens {
            self.accumulate(&mut vector, *token as u64, 1.0);
        }
        for pair in tokens.windows(2) {
            let feature = (pair[0] as u64) * 31 + pair[1] as u64;
            self.accumulate(&mut vector, feature, BIGRAM_WEIGHT);
        }

        Ok(Embedding::new(vector).normalize())
    }
}
