use async_trait::async_trait;
use log::debug;
use scout_query_parser::ContextRequest;

use crate::error::Result;
use crate::result::ContextMatch;
use crate::result::RetrieverKind;
use crate::retriever::Retriever;

/// Placeholder semantic strategy.
///
/// Participates in fan-out with the same contract as the real strategies
/// so wiring an embedding backend later is a drop-in change, but it never
/// produces matches. Orchestration treats an empty result like any other.
#[derive(Default)]
pub struct SemanticRetriever;

impl SemanticRetriever {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Retriever for SemanticRetriever {
    fn kind(&self) -> RetrieverKind {
        RetrieverKind::Semantic
    }

    async fn retrieve(&self, request: &ContextRequest, _limit: usize) -> Result<Vec<ContextMatch>> {
        debug!("semantic retrieval not configured, skipping {:?}", request.kind);
        Ok(Vec::new())
    }

    async fn invalidate(&self, _path: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_query_parser::parse;

    #[tokio::test]
    async fn always_empty() {
        let retriever = SemanticRetriever::new();
        let request = parse("@code login").remove(0);
        assert!(retriever.retrieve(&request, 10).await.unwrap().is_empty());
    }
}
