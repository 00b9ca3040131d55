pub mod embedding;
pub mod error;
pub mod models;
pub mod storage;
pub mod text;
pub mod types;

pub use embedding::{cosine_similarity, Embedding};
pub use error::{Error, Result};
pub use models::TextEmbedder;
pub use storage::NewsStorage;
pub use types::{
    merge_assignments, Article, Category, GroupAssignment, Media, NeutralArticle, Relevance, UNGROUPED,
};

pub mod prelude {
    pub use super::{
        Article, Category, Embedding, Error, GroupAssignment, Media, NeutralArticle, NewsStorage,
        Relevance, Result, TextEmbedder,
    };
}
