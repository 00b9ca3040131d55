use std::sync::Arc;

use nn_core::{Error, Result, TextEmbedder};
use tracing::info;

use crate::Config;

pub mod hashing;
pub mod remote;

pub use hashing::HashingModel;
pub use remote::RemoteModel;

/// Builds the embedding model named in the configuration.
/// Available models: `hashing` (default, local) and `remote`.
pub fn create_model(config: Option<Config>) -> Result<Arc<dyn TextEmbedder>> {
    let config = config.unwrap_or_default();
    let model_name = config.model_name.as_deref().unwrap_or("hashing");

    let model: Arc<dyn TextEmbedder> = match model_name {
        "hashing" | "local" => Arc::new(HashingModel::new(config.dims)?),
        "remote" => {
            if config.model_url.is_none() {
                return Err(Error::EmbeddingUnavailable(
                    "remote model requires --model-url".to_string(),
                ));
            }
            Arc::new(RemoteModel::new(
                config.model_url,
                config.api_key,
                config
                    .remote_model
                    .unwrap_or_else(|| "text-embedding-3-small".to_string()),
                config.dims,
            ))
        }
        other => {
            return Err(Error::EmbeddingUnavailable(format!(
                "unknown model: {}",
                other
            )))
        }
    };

    info!("🧠 Embedding model ready: {} ({} dims)", model.name(), model.dims());
    Ok(model)
}
