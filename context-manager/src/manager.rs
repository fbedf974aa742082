use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use log::debug;
use log::info;
use log::warn;
use scout_bounded_cache::BoundedCache;
use scout_bounded_cache::CacheStats;
use scout_query_parser::parse;
use scout_query_parser::ContextKind;
use scout_query_parser::ContextRequest;
use scout_repo_meta::changed_files;
use scout_repo_meta::recent_commits;
use scout_retrieval::merge_ranked;
use scout_retrieval::ContextMatch;
use scout_retrieval::IndexStats;
use scout_retrieval::KeywordRetriever;
use scout_retrieval::Retriever;
use scout_retrieval::RetrieverKind;
use scout_retrieval::SemanticRetriever;
use scout_retrieval::StructureRetriever;
use tokio::sync::Semaphore;

use crate::config::ContextManagerConfig;
use crate::config::ResolveOptions;
use crate::error::ContextError;
use crate::error::Result;

/// The orchestrator. One instance per project root; cheap to share behind
/// an `Arc`.
pub struct ContextManager {
    config: ContextManagerConfig,
    retrievers: Vec<Arc<dyn Retriever>>,
    cache: BoundedCache<String, Vec<ContextMatch>>,
    semaphore: Arc<Semaphore>,
    timings: Mutex<HashMap<RetrieverKind, Timing>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Timing {
    invocations: u64,
    timeouts: u64,
    total: Duration,
}

/// Read-only engine introspection for a health or dashboard collaborator.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
    pub indexes: Vec<IndexReport>,
    pub timings: Vec<TimingReport>,
}

#[derive(Debug, Clone)]
pub struct IndexReport {
    pub retriever: RetrieverKind,
    pub stats: IndexStats,
}

#[derive(Debug, Clone)]
pub struct TimingReport {
    pub retriever: RetrieverKind,
    pub invocations: u64,
    pub timeouts: u64,
    pub total: Duration,
}

impl ContextManager {
    /// Builds the standard strategy set over the configured root. The only
    /// fallible construction point; a missing root or nonsensical budget is
    /// a startup error, never a per-query one.
    pub fn new(config: ContextManagerConfig) -> Result<Self> {
        let retrievers: Vec<Arc<dyn Retriever>> = vec![
            Arc::new(KeywordRetriever::with_limits(
                config.root.clone(),
                config.file_cap,
                config.index_refresh(),
            )),
            Arc::new(StructureRetriever::with_limits(
                config.root.clone(),
                config.file_cap,
                config.index_refresh(),
            )),
            Arc::new(SemanticRetriever::new()),
        ];
        Self::with_retrievers(config, retrievers)
    }

    /// Construction with a caller-supplied strategy set.
    pub fn with_retrievers(
        config: ContextManagerConfig,
        retrievers: Vec<Arc<dyn Retriever>>,
    ) -> Result<Self> {
        config.validate()?;
        if !config.root.is_dir() {
            return Err(ContextError::MissingRoot(config.root.clone()));
        }
        let semaphore = Arc::new(Semaphore::new(config.dispatch_permits()));
        let cache = BoundedCache::new(config.cache_max_bytes);
        info!(
            "context manager ready: root={}, {} retrievers, {} dispatch permits",
            config.root.display(),
            retrievers.len(),
            config.dispatch_permits()
        );
        Ok(Self {
            config,
            retrievers,
            cache,
            semaphore,
            timings: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve free-form text into ranked matches. Always returns a list;
    /// prose without markers resolves to an empty one with zero dispatches.
    pub async fn resolve(&self, text: &str, opts: &ResolveOptions) -> Vec<ContextMatch> {
        let requests = parse(text);
        if requests.is_empty() {
            debug!("no context markers in input, nothing to resolve");
            return Vec::new();
        }
        let deadline = Instant::now() + self.config.overall_deadline();
        let limit = opts.max_results.unwrap_or(self.config.max_results);
        let mut batches = Vec::with_capacity(requests.len());
        for request in &requests {
            batches.push(
                self.resolve_request(request, limit, deadline, opts.bypass_cache)
                    .await,
            );
        }
        merge_ranked(batches, limit)
    }

    /// File-watcher hook: drop one path from every index ahead of the next
    /// staleness check. Cached answers may cite the changed file, so the
    /// request cache is flushed too.
    pub async fn invalidate(&self, path: &str) {
        debug!("invalidating {path}");
        for retriever in &self.retrievers {
            retriever.invalidate(path).await;
        }
        self.cache.clear();
    }

    pub async fn stats(&self) -> EngineStats {
        let cache = self.cache.stats();
        let mut indexes = Vec::new();
        for retriever in &self.retrievers {
            indexes.push(IndexReport {
                retriever: retriever.kind(),
                stats: retriever.index_stats().await,
            });
        }
        let mut timings: Vec<TimingReport> = {
            let guard = match self.timings.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard
                .iter()
                .map(|(retriever, timing)| TimingReport {
                    retriever: *retriever,
                    invocations: timing.invocations,
                    timeouts: timing.timeouts,
                    total: timing.total,
                })
                .collect()
        };
        timings.sort_by_key(|report| report.retriever.as_str());
        EngineStats {
            cache_hit_rate: cache.hit_rate(),
            cache,
            indexes,
            timings,
        }
    }

    async fn resolve_request(
        &self,
        request: &ContextRequest,
        limit: usize,
        deadline: Instant,
        bypass_cache: bool,
    ) -> Vec<ContextMatch> {
        let key = cache_key(request);
        if !bypass_cache && let Some(hit) = self.cache.get(&key) {
            debug!("cache hit for {key}");
            return (*hit).clone();
        }
        let matches = match request.kind {
            ContextKind::Git => self.git_matches(request).await,
            _ => self.dispatch(request, limit, deadline).await,
        };
        let ttl = if request.kind == ContextKind::Git {
            self.config.git_cache_ttl()
        } else {
            self.config.cache_ttl()
        };
        self.cache.put(key, matches.clone(), Some(ttl));
        matches
    }

    async fn dispatch(
        &self,
        request: &ContextRequest,
        limit: usize,
        deadline: Instant,
    ) -> Vec<ContextMatch> {
        let mut handles = Vec::new();
        for retriever in self
            .retrievers
            .iter()
            .filter(|r| applies(r.kind(), request.kind))
        {
            let retriever = Arc::clone(retriever);
            let request = request.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let budget = self
                .config
                .retriever_timeout()
                .min(deadline.saturating_duration_since(Instant::now()));
            let kind = retriever.kind();
            handles.push((
                kind,
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return None;
                    };
                    let started = Instant::now();
                    let outcome =
                        tokio::time::timeout(budget, retriever.retrieve(&request, limit)).await;
                    Some((started.elapsed(), outcome))
                }),
            ));
        }

        let mut gathered = Vec::new();
        for (kind, handle) in handles {
            match handle.await {
                Ok(Some((took, Ok(Ok(batch))))) => {
                    self.record(kind, took, false);
                    gathered.extend(batch);
                }
                Ok(Some((took, Ok(Err(err))))) => {
                    self.record(kind, took, false);
                    warn!("{} retrieval failed: {err}", kind.as_str());
                }
                Ok(Some((took, Err(_)))) => {
                    self.record(kind, took, true);
                    warn!(
                        "{} retrieval exceeded its {:?} budget, continuing without it",
                        kind.as_str(),
                        took
                    );
                }
                Ok(None) => {}
                Err(err) => warn!("{} retrieval task failed: {err}", kind.as_str()),
            }
        }
        gathered
    }

    /// Git-kind requests bypass the retriever fan-out entirely; answers
    /// come from version control metadata and degrade to empty when the
    /// root is not a repository.
    async fn git_matches(&self, request: &ContextRequest) -> Vec<ContextMatch> {
        let root = self.config.root.clone();
        let targets = request.targets.clone();
        let limit = self.config.git_log_limit;
        match tokio::task::spawn_blocking(move || gather_git(&root, &targets, limit)).await {
            Ok(matches) => matches,
            Err(err) => {
                warn!("git metadata task failed: {err}");
                Vec::new()
            }
        }
    }

    fn record(&self, kind: RetrieverKind, took: Duration, timed_out: bool) {
        let mut guard = match self.timings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let timing = guard.entry(kind).or_default();
        timing.invocations += 1;
        timing.total += took;
        if timed_out {
            timing.timeouts += 1;
        }
    }
}

fn applies(retriever: RetrieverKind, kind: ContextKind) -> bool {
    match kind {
        ContextKind::Git => false,
        ContextKind::Docs => matches!(retriever, RetrieverKind::Keyword),
        ContextKind::Files | ContextKind::Folder => {
            matches!(retriever, RetrieverKind::Keyword | RetrieverKind::Structure)
        }
        ContextKind::Code => matches!(
            retriever,
            RetrieverKind::Keyword | RetrieverKind::Structure | RetrieverKind::Semantic
        ),
    }
}

/// Stable per-request cache key: kind, whitespace-normalized lowercased
/// pattern, then the boolean terms in evaluation order.
fn cache_key(request: &ContextRequest) -> String {
    let pattern = request
        .raw_pattern
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    let mut key = format!("{}|{pattern}", request.kind.as_str());
    for term in &request.boolean_terms {
        key.push('|');
        key.push(if term.include { '+' } else { '-' });
        key.push_str(&term.term.to_ascii_lowercase());
    }
    key
}

fn gather_git(
    root: &std::path::Path,
    targets: &[String],
    limit: usize,
) -> Vec<ContextMatch> {
    if targets.is_empty() {
        // Bare @git: whatever the working tree has touched.
        let mut changed: Vec<String> = changed_files(root, None).into_iter().collect();
        changed.sort();
        return changed
            .into_iter()
            .map(|path| {
                let mut m = ContextMatch::whole_file(path, 0.8, RetrieverKind::Metadata);
                m.metadata
                    .insert("change".to_string(), "uncommitted".to_string());
                m
            })
            .collect();
    }
    let mut out = Vec::new();
    for target in targets {
        let commits = recent_commits(root, target, limit);
        if commits.is_empty() {
            continue;
        }
        let snippet = commits
            .iter()
            .map(|c| {
                let short = c.reference.get(..8).unwrap_or(&c.reference);
                format!("{short} {}", c.message)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let mut m = ContextMatch::whole_file(target.clone(), 0.9, RetrieverKind::Metadata);
        m.snippet = snippet;
        m.metadata
            .insert("commits".to_string(), commits.len().to_string());
        if let Some(latest) = commits.first() {
            m.metadata
                .insert("latest".to_string(), latest.reference.clone());
            m.metadata
                .insert("timestamp".to_string(), latest.timestamp.to_string());
        }
        out.push(m);
    }
    out
}
