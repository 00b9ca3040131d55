use async_trait::async_trait;
use std::fmt;

use crate::embedding::Embedding;
use crate::Result;

#[async_trait]
pub trait TextEmbedder: Send + Sync + fmt::Debug {
    /// Model identifier, used in logs.
    fn name(&self) -> &str;

    /// Length of every embedding this model returns.
    fn dims(&self) -> usize;

    /// Generate the embedding for a piece of text.
    ///
    /// Fails with `EmbeddingUnavailable` when the model cannot be reached or
    /// loaded and with `InvalidInput` when the text is empty once normalized.
    async fn embed(&self, text: &str) -> Result<Embedding>;
}
