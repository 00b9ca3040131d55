use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate vector: zero magnitude embedding")]
    DegenerateVector,

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Authentication expired")]
    AuthExpired,

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
