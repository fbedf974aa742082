use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextError>;

/// Startup-time failures only. Per-query trouble is logged and absorbed,
/// `resolve` always hands back a list.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("project root does not exist: {0}")]
    MissingRoot(PathBuf),
}
