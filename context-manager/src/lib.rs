/*!
# Scout Context Manager

Orchestrates project context retrieval: free-form text goes in, a ranked
list of scored matches comes out.

# Architecture

```text
text -> parse -> ContextRequest[] -> per-request cache key
     -> cache hit? serve : fan out applicable retrievers concurrently
     -> merge / dedup / rank / cap -> ContextMatch[]
```

Dispatch is bounded by one process-wide semaphore sized from the CPU
count. Each retriever gets its own timeout, capped by the remaining
overall deadline; whatever has been gathered when the deadline passes is
returned. No per-query failure escapes `resolve`: a failing or slow
strategy contributes nothing and is logged.

# Example

```no_run
use scout_context_manager::{ContextManager, ContextManagerConfig, ResolveOptions};

# async fn demo() -> Result<(), Box<dyn std::error::Error>> {
let config = ContextManagerConfig::new("/path/to/project");
let manager = ContextManager::new(config)?;
let matches = manager
    .resolve("@code login function", &ResolveOptions::default())
    .await;
for m in &matches {
    println!("{} {:.2}", m.source_path, m.score);
}
# Ok(())
# }
```
*/

mod config;
mod error;
mod format;
mod manager;

pub use config::ContextManagerConfig;
pub use config::ResolveOptions;
pub use error::ContextError;
pub use error::Result;
pub use format::format_matches;
pub use manager::ContextManager;
pub use manager::EngineStats;
pub use manager::IndexReport;
pub use manager::TimingReport;
