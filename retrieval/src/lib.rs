/*!
Retrieval strategies over a project index.

# Features

- **Keyword retrieval**: inverted token index with AND/OR term folding,
  path and glob targeting, and snippet windows built from matching lines.
- **Structure retrieval**: per-file symbol tables answering definition and
  usage lookups, exact matches first, fuzzy matches ranked behind them.
- **Semantic retrieval**: a placeholder strategy that returns no matches
  until an embedding backend is wired in.
- **Merging**: deduplication of overlapping spans and a single ranked,
  capped result list.

# Architecture

Each strategy owns an immutable index snapshot behind an `RwLock` and
rebuilds it off the async runtime with `spawn_blocking`; a build mutex
collapses concurrent rebuild requests into one. Lookups never block on a
rebuild already in flight, they read whichever snapshot is current.
*/

mod error;
mod keyword;
mod merge;
mod result;
mod retriever;
mod semantic;
mod structure;

pub use error::Result;
pub use error::RetrievalError;
pub use keyword::KeywordRetriever;
pub use merge::merge_ranked;
pub use result::ContextMatch;
pub use result::RetrieverKind;
pub use retriever::IndexStats;
pub use retriever::Retriever;
pub use semantic::SemanticRetriever;
pub use structure::StructureRetriever;
