use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("index error: {0}")]
    Index(#[from] scout_indexer::IndexerError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for RetrievalError {
    fn from(err: tokio::task::JoinError) -> Self {
        RetrievalError::Task(err.to_string())
    }
}
