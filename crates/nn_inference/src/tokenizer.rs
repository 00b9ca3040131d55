use nn_core::text::normalized;
use sha2::{Digest, Sha256};

/// Longest token sequence fed to a model. Extra words are dropped.
pub const MAX_TOKENS: usize = 128;

/// Same vocabulary size as the multilingual BERT family.
pub const VOCAB_SIZE: u32 = 30_522;

/// Deterministic word-level tokenizer.
///
/// Text is lowercased and split on whitespace; every word is normalized and
/// hashed into `1..vocab_size` (0 is the padding id). At most `max_tokens`
/// words are kept.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    max_tokens: usize,
    vocab_size: u32,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(MAX_TOKENS, VOCAB_SIZE)
    }
}

impl Tokenizer {
    pub fn new(max_tokens: usize, vocab_size: u32) -> Self {
        Self {
            max_tokens,
            vocab_size: vocab_size.max(2),
        }
    }

    /// The normalized words that survive truncation.
    pub fn words(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split_whitespace()
            .map(normalized)
            .filter(|w| !w.is_empty())
            .take(self.max_tokens)
            .collect()
    }

    pub fn tokenize(&self, text: &str) -> Vec<u32> {
        self.words(text).iter().map(|w| self.token_id(w)).collect()
    }

    fn token_id(&self, word: &str) -> u32 {
        let digest = Sha256::digest(word.as_bytes());
        let raw = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        1 + raw % (self.vocab_size - 1)
    }
}
