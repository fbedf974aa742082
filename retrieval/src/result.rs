use std::collections::HashMap;

use scout_bounded_cache::DeepSize;
use scout_bounded_cache::SizeSeen;

/// Which strategy produced a match. Metadata covers answers assembled from
/// version control rather than a content index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrieverKind {
    Keyword,
    Structure,
    Semantic,
    Metadata,
}

impl RetrieverKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RetrieverKind::Keyword => "keyword",
            RetrieverKind::Structure => "structure",
            RetrieverKind::Semantic => "semantic",
            RetrieverKind::Metadata => "metadata",
        }
    }
}

/// One scored span of project content. Never mutated after production;
/// re-ranking builds new values.
///
/// `score` is normalized to `[0.0, 1.0]` by the producing strategy so
/// matches from different strategies rank against each other. Lines are
/// 1-based and inclusive; a whole-file match carries no line span and an
/// empty snippet.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMatch {
    pub source_path: String,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub snippet: String,
    pub score: f32,
    pub retriever: RetrieverKind,
    pub metadata: HashMap<String, String>,
}

impl ContextMatch {
    /// A spanless match standing for a whole file.
    pub fn whole_file(source_path: String, score: f32, retriever: RetrieverKind) -> Self {
        Self {
            source_path,
            start_line: None,
            end_line: None,
            snippet: String::new(),
            score,
            retriever,
            metadata: HashMap::new(),
        }
    }

    /// Span identity used for deduplication across strategies.
    pub fn span_key(&self) -> (String, Option<u32>, Option<u32>) {
        (self.source_path.clone(), self.start_line, self.end_line)
    }
}

impl DeepSize for ContextMatch {
    fn heap_size(&self, seen: &mut SizeSeen) -> usize {
        self.source_path.heap_size(seen)
            + self.snippet.heap_size(seen)
            + self.metadata.heap_size(seen)
    }
}
