use std::time::Duration;

use async_trait::async_trait;
use scout_query_parser::ContextRequest;

use crate::error::Result;
use crate::result::ContextMatch;
use crate::result::RetrieverKind;

/// Point-in-time shape of a strategy's index, for introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub entries: usize,
    /// Time since the last full rebuild, `None` before the first one.
    pub rebuilt_ago: Option<Duration>,
}

/// A retrieval strategy the orchestrator can fan a request out to.
///
/// `retrieve` returns at most `limit` matches with scores in `[0.0, 1.0]`.
/// A strategy that cannot serve a request returns an empty list rather
/// than an error; errors are reserved for infrastructure failures.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn kind(&self) -> RetrieverKind;

    async fn retrieve(&self, request: &ContextRequest, limit: usize) -> Result<Vec<ContextMatch>>;

    /// Drop any indexed state for one project-relative path. The next
    /// lookup touching it re-reads from disk.
    async fn invalidate(&self, path: &str);

    async fn index_stats(&self) -> IndexStats {
        IndexStats::default()
    }
}
