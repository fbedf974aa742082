use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path escapes the project root: {0}")]
    PathEscape(PathBuf),

    #[error("not valid UTF-8: {0}")]
    NotText(PathBuf),

    #[error("walk error: {0}")]
    Walk(String),
}

impl From<ignore::Error> for IndexerError {
    fn from(err: ignore::Error) -> Self {
        IndexerError::Walk(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
