use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use nn_core::{Embedding, Error, Result, TextEmbedder};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tokenizer::Tokenizer;

#[derive(Serialize)]
struct EmbeddingRequest {
    input: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeddings from an OpenAI compatible `/embeddings` endpoint.
pub struct RemoteModel {
    client: Arc<Client>,
    api_key: String,
    base_url: Option<String>,
    model: String,
    dims: usize,
    tokenizer: Tokenizer,
}

impl RemoteModel {
    pub fn new(base_url: Option<String>, api_key: Option<String>, model: String, dims: usize) -> Self {
        Self {
            client: Arc::new(Client::new()),
            api_key: api_key.unwrap_or_default(),
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            model,
            dims,
            tokenizer: Tokenizer::default(),
        }
    }
}

impl fmt::Debug for RemoteModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl TextEmbedder for RemoteModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            Error::EmbeddingUnavailable("no model URL configured".to_string())
        })?;

        let words = self.tokenizer.words(text);
        if words.is_empty() {
            return Err(Error::InvalidInput("text is empty after normalization".to_string()));
        }

        let request = EmbeddingRequest {
            input: words.join(" "),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::EmbeddingUnavailable(format!(
                "model endpoint returned {}",
                status
            )));
        }

        let response = response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("malformed embedding response: {}", e)))?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| Embedding::new(d.embedding))
            .ok_or_else(|| Error::EmbeddingUnavailable("empty embedding response".to_string()))?;
        debug!("🔢 {} returned {} dims", self.model, embedding.len());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_without_url_is_unavailable() {
        let model = RemoteModel::new(None, None, "test".to_string(), 3);
        assert!(matches!(
            model.embed("hola").await,
            Err(Error::EmbeddingUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_embeddings() {
        let router = Router::new().route(
            "/embeddings",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["input"], "hola mundo");
                Json(json!({ "data": [{ "embedding": [0.1, 0.2, 0.3] }] }))
            }),
        );
        let url = serve(router).await;
        let model = RemoteModel::new(Some(url), Some("key".to_string()), "test".to_string(), 3);
        let embedding = model.embed("Hola, MUNDO").await.unwrap();
        assert_eq!(embedding.as_slice(), &[0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let router = Router::new().route(
            "/embeddings",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "loading") }),
        );
        let url = serve(router).await;
        let model = RemoteModel::new(Some(url), None, "test".to_string(), 3);
        assert!(matches!(
            model.embed("hola").await,
            Err(Error::EmbeddingUnavailable(_))
        ));
    }
}
