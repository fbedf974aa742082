use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use std::time::SystemTime;

use async_trait::async_trait;
use log::debug;
use log::info;
use log::warn;
use nucleo_matcher::pattern::AtomKind;
use nucleo_matcher::pattern::CaseMatching;
use nucleo_matcher::pattern::Normalization;
use nucleo_matcher::pattern::Pattern;
use nucleo_matcher::Matcher;
use nucleo_matcher::Utf32Str;
use scout_indexer::extract_symbols;
use scout_indexer::scan_window;
use scout_indexer::LanguageHint;
use scout_indexer::PathScope;
use scout_indexer::SymbolEntry;
use scout_indexer::DEFAULT_FILE_CAP;
use scout_query_parser::ContextKind;
use scout_query_parser::ContextRequest;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::result::ContextMatch;
use crate::result::RetrieverKind;
use crate::retriever::Retriever;

const MAX_SNIPPET_LINES: u32 = 40;
const FUZZY_SCORE_CEILING: f32 = 0.95;
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Symbol-table retrieval answering definition and usage questions.
///
/// Exact name matches always outrank fuzzy ones; fuzzy similarity is
/// normalized under an exact-match ceiling so the two never interleave.
/// Like the keyword index, the table is rebuilt one rolling window at a
/// time in the background once the refresh interval elapses, so files
/// created after the first build are picked up without an external nudge.
pub struct StructureRetriever {
    inner: Arc<Inner>,
}

struct Inner {
    scope: PathScope,
    file_cap: usize,
    refresh_interval: Duration,
    index: RwLock<Arc<StructureIndex>>,
    build_lock: Mutex<()>,
}

#[derive(Default)]
struct StructureIndex {
    files: HashMap<String, FileSymbols>,
    built_at: Option<Instant>,
    cursor: Option<String>,
}

impl StructureIndex {
    fn is_fresh(&self, interval: Duration) -> bool {
        self.built_at
            .map(|at| at.elapsed() < interval)
            .unwrap_or(false)
    }
}

#[derive(Clone)]
struct FileSymbols {
    mtime: SystemTime,
    size: u64,
    symbols: Vec<SymbolEntry>,
}

enum Lookup {
    Definition(String),
    Usages(String),
}

impl Lookup {
    /// Usage intent is carried in the pattern itself, e.g.
    /// `@code usages of issue_token`.
    fn from_pattern(pattern: &str) -> Option<Self> {
        let trimmed = pattern.trim();
        for prefix in ["usages of ", "callers of ", "uses "] {
            if let Some(rest) = strip_prefix_ci(trimmed, prefix) {
                let name = rest.trim();
                if name.is_empty() {
                    return None;
                }
                return Some(Lookup::Usages(name.to_string()));
            }
        }
        let name = trimmed.split_whitespace().next()?;
        Some(Lookup::Definition(name.to_string()))
    }
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    // get() rejects offsets inside a multibyte character, which a plain
    // byte slice of free-form input would panic on.
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        return Some(&text[prefix.len()..]);
    }
    None
}

impl StructureRetriever {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self::with_file_cap(root, DEFAULT_FILE_CAP)
    }

    pub fn with_file_cap(root: impl Into<std::path::PathBuf>, file_cap: usize) -> Self {
        Self::with_limits(root, file_cap, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_limits(
        root: impl Into<std::path::PathBuf>,
        file_cap: usize,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                scope: PathScope::new(root),
                file_cap,
                refresh_interval,
                index: RwLock::new(Arc::new(StructureIndex::default())),
                build_lock: Mutex::new(()),
            }),
        }
    }

    async fn snapshot(&self) -> Result<Arc<StructureIndex>> {
        let current = { Arc::clone(&*self.inner.index.read().await) };
        if current.built_at.is_none() {
            return rebuild(&self.inner).await;
        }
        if !current.is_fresh(self.inner.refresh_interval) {
            // New files are discovered by the next rolling window; queries
            // keep reading the previous snapshot meanwhile.
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                if let Err(err) = rebuild(&inner).await {
                    warn!("background structure rebuild failed: {err}");
                }
            });
        }
        let root = self.inner.scope.root();
        let stale: Vec<String> = current
            .files
            .iter()
            .filter(|(rel, file)| file.is_stale(root, rel))
            .map(|(rel, _)| rel.clone())
            .collect();
        if stale.is_empty() {
            return Ok(current);
        }
        debug!("reparsing {} stale symbol tables", stale.len());
        self.refresh_paths(stale).await
    }

    async fn refresh_paths(&self, paths: Vec<String>) -> Result<Arc<StructureIndex>> {
        let _guard = self.inner.build_lock.lock().await;
        let current = Arc::clone(&*self.inner.index.read().await);
        let root = self.inner.scope.root().to_path_buf();
        let patched = tokio::task::spawn_blocking(move || {
            let mut files = current.files.clone();
            for rel in paths {
                match parse_table(&root, &rel) {
                    Some(table) => {
                        files.insert(rel, table);
                    }
                    None => {
                        files.remove(&rel);
                    }
                }
            }
            StructureIndex {
                files,
                built_at: current.built_at,
                cursor: current.cursor.clone(),
            }
        })
        .await?;
        let next = Arc::new(patched);
        *self.inner.index.write().await = Arc::clone(&next);
        Ok(next)
    }
}

impl FileSymbols {
    fn is_stale(&self, root: &Path, rel: &str) -> bool {
        let Ok(meta) = std::fs::metadata(root.join(rel)) else {
            return true;
        };
        if meta.len() != self.size {
            return true;
        }
        match meta.modified() {
            Ok(mtime) => mtime != self.mtime,
            Err(_) => true,
        }
    }
}

/// Parse the next rolling window of the tree on top of the current table
/// and swap the patched index in. A window file without symbols drops out
/// of the table rather than lingering as an empty entry.
async fn rebuild(inner: &Arc<Inner>) -> Result<Arc<StructureIndex>> {
    let _guard = inner.build_lock.lock().await;
    let current = { Arc::clone(&*inner.index.read().await) };
    if current.is_fresh(inner.refresh_interval) {
        return Ok(current);
    }
    let root = inner.scope.root().to_path_buf();
    let cap = inner.file_cap;
    let next = tokio::task::spawn_blocking(move || -> Result<StructureIndex> {
        let window = scan_window(&root, cap, current.cursor.as_deref())?;
        let mut files = current.files.clone();
        for rel in &window.paths {
            match parse_table(&root, rel) {
                Some(table) => {
                    files.insert(rel.clone(), table);
                }
                None => {
                    files.remove(rel);
                }
            }
        }
        Ok(StructureIndex {
            files,
            built_at: Some(Instant::now()),
            cursor: window.resume_after,
        })
    })
    .await??;
    info!("structure index window parsed: {} files total", next.files.len());
    let next = Arc::new(next);
    *inner.index.write().await = Arc::clone(&next);
    Ok(next)
}

fn parse_table(root: &Path, rel: &str) -> Option<FileSymbols> {
    let path = root.join(rel);
    let meta = std::fs::metadata(&path).ok()?;
    let content = std::fs::read_to_string(&path).ok()?;
    let language = LanguageHint::from_path(Path::new(rel));
    let symbols = extract_symbols(language, &content);
    if symbols.is_empty() {
        return None;
    }
    Some(FileSymbols {
        mtime: meta.modified().ok()?,
        size: meta.len(),
        symbols,
    })
}

#[async_trait]
impl Retriever for StructureRetriever {
    fn kind(&self) -> RetrieverKind {
        RetrieverKind::Structure
    }

    async fn retrieve(&self, request: &ContextRequest, limit: usize) -> Result<Vec<ContextMatch>> {
        // Path listings and doc prose have no symbol structure to offer.
        if !matches!(request.kind, ContextKind::Code) {
            return Ok(Vec::new());
        }
        let Some(lookup) = Lookup::from_pattern(&request.raw_pattern) else {
            return Ok(Vec::new());
        };
        let index = self.snapshot().await?;

        let mut scored: Vec<(f32, SystemTime, &str, &SymbolEntry)> = Vec::new();
        match &lookup {
            Lookup::Definition(name) => {
                let pattern = Pattern::new(
                    name,
                    CaseMatching::Smart,
                    Normalization::Smart,
                    AtomKind::Fuzzy,
                );
                let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
                let mut buf = Vec::new();
                for (rel, file) in &index.files {
                    for symbol in &file.symbols {
                        if symbol.name.eq_ignore_ascii_case(name) {
                            scored.push((1.0, file.mtime, rel, symbol));
                            continue;
                        }
                        let haystack = Utf32Str::new(&symbol.name, &mut buf);
                        if let Some(raw) = pattern.score(haystack, &mut matcher) {
                            let score = (raw as f32 / 1000.0).min(FUZZY_SCORE_CEILING);
                            scored.push((score, file.mtime, rel, symbol));
                        }
                    }
                }
            }
            Lookup::Usages(name) => {
                for (rel, file) in &index.files {
                    for symbol in &file.symbols {
                        if symbol.name.eq_ignore_ascii_case(name) {
                            continue;
                        }
                        if symbol
                            .refs
                            .iter()
                            .any(|r| r.eq_ignore_ascii_case(name))
                        {
                            scored.push((0.8, file.mtime, rel, symbol));
                        }
                    }
                }
            }
        }

        // Similarity first, recently edited files break ties.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.cmp(b.2))
        });
        scored.truncate(limit);

        let mut matches = Vec::new();
        for (score, _, rel, symbol) in scored {
            let snippet = match read_span(self.inner.scope.root(), rel, symbol).await {
                Some(snippet) => snippet,
                None => {
                    warn!("span read failed for {rel}:{}", symbol.start_line);
                    continue;
                }
            };
            matches.push(ContextMatch {
                source_path: rel.to_string(),
                start_line: Some(symbol.start_line),
                end_line: Some(symbol.end_line),
                snippet,
                score,
                retriever: RetrieverKind::Structure,
                metadata: HashMap::new(),
            });
        }
        Ok(matches)
    }

    async fn invalidate(&self, path: &str) {
        let built = { self.inner.index.read().await.built_at.is_some() };
        if !built {
            return;
        }
        if let Err(err) = self.refresh_paths(vec![path.to_string()]).await {
            warn!("structure invalidate for {path} failed: {err}");
        }
    }

    async fn index_stats(&self) -> crate::retriever::IndexStats {
        let index = Arc::clone(&*self.inner.index.read().await);
        crate::retriever::IndexStats {
            entries: index.files.len(),
            rebuilt_ago: index.built_at.map(|at| at.elapsed()),
        }
    }
}

async fn read_span(root: &Path, rel: &str, symbol: &SymbolEntry) -> Option<String> {
    let content = tokio::fs::read_to_string(root.join(rel)).await.ok()?;
    let lines: Vec<&str> = content.lines().collect();
    let start = symbol.start_line.saturating_sub(1) as usize;
    let end = (symbol
        .end_line
        .min(symbol.start_line + MAX_SNIPPET_LINES) as usize)
        .min(lines.len());
    if start >= end {
        return None;
    }
    Some(lines[start..end].join("\n"))
}
