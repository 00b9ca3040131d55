use std::fmt;
use std::str::FromStr;

pub mod clustering;
pub mod embeddings;
pub mod grouping;
pub mod models;
pub mod tokenizer;

/// Where group numbers come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum GroupingStrategy {
    /// Cosine similarity clustering on local embeddings.
    #[default]
    Local,
    /// Delegate to the external grouping service.
    Remote,
}

impl fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingStrategy::Local => f.write_str("local"),
            GroupingStrategy::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for GroupingStrategy {
    type Err = nn_core::Error;

    fn from_str(s: &str) -> nn_core::Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(GroupingStrategy::Local),
            "remote" => Ok(GroupingStrategy::Remote),
            other => Err(nn_core::Error::InvalidInput(format!(
                "unknown grouping strategy: {}",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// `hashing` (default) or `remote`.
    pub model_name: Option<String>,
    pub model_url: Option<String>,
    pub api_key: Option<String>,
    /// Model id sent to a remote embeddings endpoint.
    pub remote_model: Option<String>,
    pub dims: usize,
    pub threshold: f32,
    pub concurrency: usize,
    pub strategy: GroupingStrategy,
    pub grouping_url: Option<String>,
    pub grouping_token: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("model_name", &self.model_name)
            .field("model_url", &self.model_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("remote_model", &self.remote_model)
            .field("dims", &self.dims)
            .field("threshold", &self.threshold)
            .field("concurrency", &self.concurrency)
            .field("strategy", &self.strategy)
            .field("grouping_url", &self.grouping_url)
            .field("grouping_token", &self.grouping_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_name: None,
            model_url: None,
            api_key: None,
            remote_model: None,
            dims: models::hashing::DEFAULT_DIMS,
            threshold: clustering::DEFAULT_THRESHOLD,
            concurrency: 8,
            strategy: GroupingStrategy::default(),
            grouping_url: None,
            grouping_token: None,
        }
    }
}

pub mod prelude {
    pub use super::clustering::{cluster_embedded, SimilarityClusterer, DEFAULT_THRESHOLD};
    pub use super::embeddings::EmbeddingGenerator;
    pub use super::grouping::{assign_groups, filter_grouped_news, merge_assignments, Grouper};
    pub use super::models::create_model;
    pub use super::{Config, GroupingStrategy};
    pub use nn_core::{Article, Embedding, Error, Result, TextEmbedder};
}

pub use models::create_model;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::Grouper;
    use nn_core::{Article, Category, Media};

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Remote".parse::<GroupingStrategy>().unwrap(), GroupingStrategy::Remote);
        assert!("dbscan".parse::<GroupingStrategy>().is_err());
    }

    #[test]
    fn test_remote_strategy_requires_url() {
        let config = Config {
            strategy: GroupingStrategy::Remote,
            ..Config::default()
        };
        assert!(Grouper::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_local_grouping_pipeline() {
        let grouper = Grouper::from_config(&Config::default()).unwrap();
        let body = "El Congreso aprueba la reforma de la ley de vivienda con el apoyo de los socios";
        let pending = vec![
            Article::new("Vivienda", body, Category::Politica, "1", Media::Abc),
            Article::new("Vivienda", body, Category::Politica, "2", Media::ElPais),
            Article::new("Fútbol", "El Betis gana en el último minuto", Category::Deportes, "3", Media::Cope),
        ];
        let ids: Vec<String> = pending.iter().map(|a| a.id.clone()).collect();

        let assignments = grouper.group(pending, Vec::new(), 0).await;
        let group_of = |id: &str| assignments.iter().find(|a| a.id == id).and_then(|a| a.group_number);
        assert_eq!(group_of(&ids[0]), Some(0));
        assert_eq!(group_of(&ids[1]), Some(0));
        assert_eq!(group_of(&ids[2]), None);
    }
}
