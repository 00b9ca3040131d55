use std::sync::Arc;

use futures::stream::{self, StreamExt};
use nn_core::{Article, Embedding, Result, TextEmbedder};
use tracing::warn;

pub struct EmbeddingGenerator {
    model: Arc<dyn TextEmbedder>,
    concurrency: usize,
}

impl EmbeddingGenerator {
    pub fn new(model: Arc<dyn TextEmbedder>, concurrency: usize) -> Self {
        Self {
            model,
            concurrency: concurrency.max(1),
        }
    }

    pub fn model(&self) -> &Arc<dyn TextEmbedder> {
        &self.model
    }

    /// Articles are compared on their body text.
    pub async fn generate_article_embedding(&self, article: &Article) -> Result<Embedding> {
        self.model.embed(&article.description).await
    }

    pub async fn generate_text_embedding(&self, text: &str) -> Result<Embedding> {
        self.model.embed(text).await
    }

    /// Embeds every article with bounded concurrency, keeping input order.
    /// Articles whose embedding fails are logged and left out.
    pub async fn embed_articles(&self, articles: Vec<Article>) -> Vec<(Article, Embedding)> {
        stream::iter(articles)
            .map(|article| async move {
                let embedding = self.generate_article_embedding(&article).await;
                (article, embedding)
            })
            .buffered(self.concurrency)
            .filter_map(|(article, embedding)| async move {
                match embedding {
                    Ok(embedding) => Some((article, embedding)),
                    Err(e) => {
                        warn!("⚠️ Skipping article {} ({}): {}", article.id, article.title, e);
                        None
                    }
                }
            })
            .collect()
            .await
    }
}
