use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use globset::GlobBuilder;
use globset::GlobSet;
use globset::GlobSetBuilder;
use log::debug;
use log::info;
use log::warn;
use scout_indexer::index_file;
use scout_indexer::is_doc_path;
use scout_indexer::scan_window;
use scout_indexer::tokenize_query;
use scout_indexer::FileIndexEntry;
use scout_indexer::PathScope;
use scout_indexer::DEFAULT_FILE_CAP;
use scout_query_parser::ContextKind;
use scout_query_parser::ContextRequest;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::result::ContextMatch;
use crate::result::RetrieverKind;
use crate::retriever::Retriever;

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
const MAX_WINDOWS_PER_FILE: usize = 3;
const WINDOW_GAP: u32 = 2;
const WINDOW_CONTEXT: u32 = 1;
const MAX_WINDOW_LINES: u32 = 12;

/// Inverted-index retrieval over token postings.
///
/// The index is an immutable snapshot swapped atomically after each
/// rebuild. Rebuilds are collapsed by a build mutex and cover one rolling
/// window of at most `file_cap` files, resuming where the previous window
/// stopped; a snapshot older than the refresh interval triggers the next
/// window in the background while queries keep reading the previous one.
/// Individual files whose mtime or size drifted are re-read in place
/// without a full rebuild.
pub struct KeywordRetriever {
    inner: Arc<Inner>,
}

struct Inner {
    scope: PathScope,
    file_cap: usize,
    refresh_interval: Duration,
    index: RwLock<Arc<KeywordIndex>>,
    build_lock: Mutex<()>,
}

#[derive(Default)]
struct KeywordIndex {
    entries: HashMap<String, FileIndexEntry>,
    built_at: Option<Instant>,
    // Rolling scan cursor: the next rebuild resumes after this path, so a
    // tree larger than the file cap is covered over successive windows.
    cursor: Option<String>,
}

impl KeywordIndex {
    fn is_fresh(&self, interval: Duration) -> bool {
        self.built_at
            .map(|at| at.elapsed() < interval)
            .unwrap_or(false)
    }
}

impl KeywordRetriever {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self::with_limits(root, DEFAULT_FILE_CAP, DEFAULT_REFRESH_INTERVAL)
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
                index: RwLock::new(Arc::new(KeywordIndex::default())),
                build_lock: Mutex::new(()),
            }),
        }
    }

    async fn fresh_snapshot(&self) -> Result<Arc<KeywordIndex>> {
        let current = { Arc::clone(&*self.inner.index.read().await) };
        if current.built_at.is_none() {
            // Nothing to serve yet; only the very first build is awaited.
            return rebuild(&self.inner).await;
        }
        if !current.is_fresh(self.inner.refresh_interval) {
            // Queries keep reading the previous snapshot while a
            // single-flighted background task rolls the index forward.
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                if let Err(err) = rebuild(&inner).await {
                    warn!("background keyword rebuild failed: {err}");
                }
            });
        }
        Ok(current)
    }

    /// Re-read a handful of files into a patched copy of the current
    /// snapshot. A path that no longer reads cleanly drops out.
    async fn refresh_paths(&self, paths: Vec<String>) -> Result<Arc<KeywordIndex>> {
        let _guard = self.inner.build_lock.lock().await;
        let current = Arc::clone(&*self.inner.index.read().await);
        let root = self.inner.scope.root().to_path_buf();
        let patched = tokio::task::spawn_blocking(move || {
            let mut entries = current.entries.clone();
            for rel in paths {
                match index_file(&root, &rel) {
                    Ok(entry) => {
                        entries.insert(rel, entry);
                    }
                    Err(err) => {
                        debug!("dropping {rel} from keyword index: {err}");
                        entries.remove(&rel);
                    }
                }
            }
            KeywordIndex {
                entries,
                built_at: current.built_at,
                cursor: current.cursor.clone(),
            }
        })
        .await?;
        let next = Arc::new(patched);
        *self.inner.index.write().await = Arc::clone(&next);
        Ok(next)
    }

    async fn snapshot_with_stale_refresh(&self) -> Result<Arc<KeywordIndex>> {
        let index = self.fresh_snapshot().await?;
        let root = self.inner.scope.root();
        let stale: Vec<String> = index
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_stale(root))
            .map(|(rel, _)| rel.clone())
            .collect();
        if stale.is_empty() {
            return Ok(index);
        }
        debug!("refreshing {} stale keyword entries", stale.len());
        self.refresh_paths(stale).await
    }
}

/// Index the next rolling window of the tree on top of the current
/// snapshot and swap the patched index in. Concurrent callers collapse on
/// the build lock; whoever loses the race returns the winner's snapshot.
async fn rebuild(inner: &Arc<Inner>) -> Result<Arc<KeywordIndex>> {
    let _guard = inner.build_lock.lock().await;
    let current = { Arc::clone(&*inner.index.read().await) };
    if current.is_fresh(inner.refresh_interval) {
        return Ok(current);
    }
    let root = inner.scope.root().to_path_buf();
    let cap = inner.file_cap;
    let next = tokio::task::spawn_blocking(move || -> Result<KeywordIndex> {
        let window = scan_window(&root, cap, current.cursor.as_deref())?;
        let mut entries = current.entries.clone();
        for rel in &window.paths {
            match index_file(&root, rel) {
                Ok(entry) => {
                    entries.insert(rel.clone(), entry);
                }
                Err(err) => {
                    debug!("skipping {rel}: {err}");
                    entries.remove(rel);
                }
            }
        }
        Ok(KeywordIndex {
            entries,
            built_at: Some(Instant::now()),
            cursor: window.resume_after,
        })
    })
    .await??;
    info!("keyword index window indexed: {} files total", next.entries.len());
    let next = Arc::new(next);
    *inner.index.write().await = Arc::clone(&next);
    Ok(next)
}

#[async_trait]
impl Retriever for KeywordRetriever {
    fn kind(&self) -> RetrieverKind {
        RetrieverKind::Keyword
    }

    async fn retrieve(&self, request: &ContextRequest, limit: usize) -> Result<Vec<ContextMatch>> {
        let index = self.snapshot_with_stale_refresh().await?;
        let mut matches = match request.kind {
            ContextKind::Files | ContextKind::Folder => {
                path_matches(&self.inner.scope, &index, request)
            }
            _ => content_matches(&self.inner.scope, &index, request).await,
        };
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_path.cmp(&b.source_path))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn invalidate(&self, path: &str) {
        if let Err(err) = self.refresh_paths(vec![path.to_string()]).await {
            warn!("keyword invalidate for {path} failed: {err}");
        }
    }

    async fn index_stats(&self) -> crate::retriever::IndexStats {
        let index = Arc::clone(&*self.inner.index.read().await);
        crate::retriever::IndexStats {
            entries: index.entries.len(),
            rebuilt_ago: index.built_at.map(|at| at.elapsed()),
        }
    }
}

/// Per-request term plan keeping groups in written order. The chain folds
/// left to right with no precedence: an AND-joined group must also match,
/// an OR-joined group widens the running result.
struct TermPlan {
    groups: Vec<TermGroup>,
}

struct TermGroup {
    tokens: Vec<String>,
    include: bool,
}

impl TermPlan {
    fn new(request: &ContextRequest) -> Self {
        let groups = request
            .boolean_terms
            .iter()
            .filter_map(|term| {
                let tokens = tokenize_query(&term.term);
                if tokens.is_empty() {
                    return None;
                }
                Some(TermGroup {
                    tokens,
                    include: term.include,
                })
            })
            .collect();
        Self { groups }
    }

    fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

struct FileHit {
    lines: BTreeSet<u32>,
    matched_groups: usize,
    total_groups: usize,
}

fn evaluate_file(plan: &TermPlan, entry: &FileIndexEntry) -> Option<FileHit> {
    let group_lines = |group: &TermGroup| -> Option<BTreeSet<u32>> {
        let mut lines = BTreeSet::new();
        for token in &group.tokens {
            let postings = entry.token_postings.get(token)?;
            lines.extend(postings.iter().copied());
        }
        Some(lines)
    };

    let mut lines = BTreeSet::new();
    let mut matched = 0;
    let mut qualifies = false;
    for (idx, group) in plan.groups.iter().enumerate() {
        let hit = group_lines(group);
        let group_ok = hit.is_some();
        if let Some(hits) = hit {
            lines.extend(hits);
            matched += 1;
        }
        qualifies = if idx == 0 {
            group_ok
        } else if group.include {
            qualifies && group_ok
        } else {
            qualifies || group_ok
        };
    }
    if !qualifies {
        return None;
    }
    Some(FileHit {
        lines,
        matched_groups: matched,
        total_groups: plan.groups.len(),
    })
}

fn score_hit(hit: &FileHit, entry: &FileIndexEntry, plan: &TermPlan) -> f32 {
    let coverage = if hit.total_groups == 0 {
        0.0
    } else {
        hit.matched_groups as f32 / hit.total_groups as f32
    };
    let density = (hit.lines.len().min(8)) as f32 / 8.0;
    let path_lower = entry.path.to_ascii_lowercase();
    let mut in_path = false;
    let mut names_symbol = false;
    for token in plan.groups.iter().flat_map(|g| &g.tokens) {
        if path_lower.contains(token.as_str()) {
            in_path = true;
        }
        if entry
            .symbols
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(token))
        {
            names_symbol = true;
        }
    }
    let mut score = coverage * 0.6 + density * 0.2;
    if in_path {
        score += 0.05;
    }
    // A term naming a defined symbol outranks a prose mention of it.
    if names_symbol {
        score += 0.15;
    }
    score.min(1.0)
}

async fn content_matches(
    scope: &PathScope,
    index: &KeywordIndex,
    request: &ContextRequest,
) -> Vec<ContextMatch> {
    let plan = TermPlan::new(request);
    if plan.is_empty() {
        return Vec::new();
    }
    let docs_only = request.kind == ContextKind::Docs;
    let mut out = Vec::new();
    for (rel, entry) in &index.entries {
        if docs_only && !is_doc_path(rel) {
            continue;
        }
        if let Some(hint) = &request.path_hint
            && !rel.starts_with(hint.trim_end_matches('/'))
        {
            continue;
        }
        let Some(hit) = evaluate_file(&plan, entry) else {
            continue;
        };
        let score = score_hit(&hit, entry, &plan);
        let windows = line_windows(&hit.lines);
        if windows.is_empty() {
            out.push(ContextMatch::whole_file(
                rel.clone(),
                score,
                RetrieverKind::Keyword,
            ));
            continue;
        }
        let content = match tokio::fs::read_to_string(scope.root().join(rel)).await {
            Ok(content) => content,
            Err(err) => {
                debug!("snippet read for {rel} failed: {err}");
                continue;
            }
        };
        let lines: Vec<&str> = content.lines().collect();
        for (start, end) in windows {
            out.push(ContextMatch {
                source_path: rel.clone(),
                start_line: Some(start),
                end_line: Some(end),
                snippet: slice_lines(&lines, start, end),
                score,
                retriever: RetrieverKind::Keyword,
                metadata: HashMap::new(),
            });
        }
    }
    out
}

/// Collapse matched line numbers into a few padded windows.
fn line_windows(lines: &BTreeSet<u32>) -> Vec<(u32, u32)> {
    let mut windows: Vec<(u32, u32)> = Vec::new();
    for &line in lines {
        match windows.last_mut() {
            Some((_, end)) if line <= *end + WINDOW_GAP => *end = line,
            _ => windows.push((line, line)),
        }
    }
    windows.truncate(MAX_WINDOWS_PER_FILE);
    windows
        .into_iter()
        .map(|(start, end)| {
            let start = start.saturating_sub(WINDOW_CONTEXT).max(1);
            let end = (end + WINDOW_CONTEXT).min(start + MAX_WINDOW_LINES);
            (start, end)
        })
        .collect()
}

fn slice_lines(lines: &[&str], start: u32, end: u32) -> String {
    let start_idx = (start.saturating_sub(1)) as usize;
    let end_idx = (end as usize).min(lines.len());
    if start_idx >= end_idx {
        return String::new();
    }
    lines[start_idx..end_idx].join("\n")
}

fn path_matches(
    scope: &PathScope,
    index: &KeywordIndex,
    request: &ContextRequest,
) -> Vec<ContextMatch> {
    let mut out = Vec::new();
    let globs = build_globs(&request.targets);
    let folder_mode = request.kind == ContextKind::Folder;
    let plain: Vec<String> = request
        .targets
        .iter()
        .filter(|t| !is_glob(t))
        .filter(|t| {
            // A path-like target outside the project root matches nothing.
            if t.contains('/') && !scope.contains(t) {
                warn!("ignoring out-of-scope target {t}");
                return false;
            }
            true
        })
        .map(|t| t.trim_end_matches('/').to_ascii_lowercase())
        .collect();

    for rel in index.entries.keys() {
        let rel_lower = rel.to_ascii_lowercase();
        let mut score: f32 = 0.0;
        if let Some(globs) = &globs
            && globs.is_match(rel)
        {
            score = 0.8;
        }
        for target in &plain {
            if folder_mode || target.contains('/') {
                if rel_lower.starts_with(&format!("{target}/")) || rel_lower == *target {
                    score = score.max(0.9);
                }
                continue;
            }
            let name = rel_lower.rsplit('/').next().unwrap_or(&rel_lower);
            let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
            if stem == target {
                score = score.max(1.0);
            } else if name.contains(target.as_str()) {
                score = score.max(0.7);
            } else if rel_lower.contains(target.as_str()) {
                score = score.max(0.5);
            }
        }
        if score > 0.0 {
            out.push(ContextMatch::whole_file(
                rel.clone(),
                score,
                RetrieverKind::Keyword,
            ));
        }
    }
    out
}

fn is_glob(target: &str) -> bool {
    target.contains(['*', '?', '['])
}

fn build_globs(targets: &[String]) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut any = false;
    for target in targets {
        if !is_glob(target) {
            continue;
        }
        // Bare globs like *.py should match at any depth.
        let pattern = if target.contains('/') {
            target.clone()
        } else {
            format!("**/{target}")
        };
        match GlobBuilder::new(&pattern).literal_separator(true).build() {
            Ok(glob) => {
                builder.add(glob);
                any = true;
            }
            Err(err) => warn!("ignoring malformed glob {target}: {err}"),
        }
    }
    if !any {
        return None;
    }
    match builder.build() {
        Ok(set) => Some(set),
        Err(err) => {
            warn!("glob set build failed: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scout_query_parser::parse;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_project(root: &Path) {
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(
            root.join("src/auth.py"),
            "def login(user, password):\n    token = issue_token(user)\n    return token\n\ndef logout(user):\n    revoke_token(user)\n",
        )
        .unwrap();
        fs::write(
            root.join("src/db.py"),
            "def connect(url):\n    return Pool(url)\n",
        )
        .unwrap();
        fs::write(
            root.join("docs/auth.md"),
            "# Authentication\n\nThe login flow issues a token per session.\n",
        )
        .unwrap();
    }

    fn one(text: &str) -> ContextRequest {
        let mut requests = parse(text);
        assert_eq!(requests.len(), 1);
        requests.remove(0)
    }

    #[test_log::test(tokio::test)]
    async fn code_terms_find_matching_lines() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let retriever = KeywordRetriever::new(temp.path());

        let matches = retriever.retrieve(&one("@code login"), 10).await.unwrap();
        assert!(!matches.is_empty());
        assert_eq!(matches[0].source_path, "src/auth.py");
        assert!(matches[0].snippet.contains("def login"));
        assert!(matches[0].score > 0.0 && matches[0].score <= 1.0);
    }

    #[test_log::test(tokio::test)]
    async fn docs_requests_only_touch_doc_files() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let retriever = KeywordRetriever::new(temp.path());

        let matches = retriever.retrieve(&one("@docs login"), 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source_path, "docs/auth.md");
    }

    #[test_log::test(tokio::test)]
    async fn and_narrows_or_widens() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let retriever = KeywordRetriever::new(temp.path());

        let narrowed = retriever
            .retrieve(&one("@code login AND @code token"), 10)
            .await
            .unwrap();
        let narrowed_paths: std::collections::HashSet<&str> =
            narrowed.iter().map(|m| m.source_path.as_str()).collect();
        assert!(narrowed_paths.contains("src/auth.py"));
        assert!(!narrowed_paths.contains("src/db.py"));

        let widened = retriever
            .retrieve(&one("@code login OR @code connect"), 10)
            .await
            .unwrap();
        let paths: std::collections::HashSet<&str> =
            widened.iter().map(|m| m.source_path.as_str()).collect();
        assert!(paths.contains("src/auth.py"));
        assert!(paths.contains("src/db.py"));
    }

    #[test_log::test(tokio::test)]
    async fn mixed_chain_folds_left_to_right() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("only_b.py"), "bravo = 1\n").unwrap();
        fs::write(temp.path().join("both.py"), "alpha = 1\ncharlie = 2\n").unwrap();
        let retriever = KeywordRetriever::new(temp.path());

        // alpha OR bravo AND charlie folds as (alpha | bravo) & charlie.
        let matches = retriever
            .retrieve(&one("@code alpha OR @code bravo AND @code charlie"), 10)
            .await
            .unwrap();
        let paths: std::collections::HashSet<&str> =
            matches.iter().map(|m| m.source_path.as_str()).collect();
        assert!(paths.contains("both.py"));
        assert!(!paths.contains("only_b.py"));
    }

    #[test_log::test(tokio::test)]
    async fn rolling_windows_cover_trees_larger_than_the_cap() {
        let temp = tempdir().unwrap();
        for (i, word) in ["alpha", "bravo", "charlie", "delta"].iter().enumerate() {
            fs::write(temp.path().join(format!("file{i}.py")), format!("{word} = 1\n"))
                .unwrap();
        }
        let retriever = KeywordRetriever::with_limits(temp.path(), 2, Duration::ZERO);

        // First build covers only the first window.
        let immediate = retriever.retrieve(&one("@code delta"), 10).await.unwrap();
        assert!(immediate.is_empty());

        let mut entries = 0;
        for _ in 0..100 {
            retriever.retrieve(&one("@code delta"), 10).await.unwrap();
            entries = retriever.index_stats().await.entries;
            if entries == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(entries, 4);

        let matches = retriever.retrieve(&one("@code delta"), 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source_path, "file3.py");
    }

    #[test_log::test(tokio::test)]
    async fn elapsed_interval_serves_the_previous_snapshot() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.py"), "alpha = 1\n").unwrap();
        let retriever =
            KeywordRetriever::with_limits(temp.path(), DEFAULT_FILE_CAP, Duration::ZERO);
        retriever.retrieve(&one("@code alpha"), 10).await.unwrap();

        fs::write(temp.path().join("b.py"), "bravo = 1\n").unwrap();

        // The snapshot is read before the background rebuild is spawned,
        // so this query answers from the old index without waiting.
        let stale_view = retriever.retrieve(&one("@code bravo"), 10).await.unwrap();
        assert!(stale_view.is_empty());

        let mut found = false;
        for _ in 0..100 {
            if !retriever.retrieve(&one("@code bravo"), 10).await.unwrap().is_empty() {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(found);
    }

    #[test_log::test(tokio::test)]
    async fn glob_targets_list_paths() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let retriever = KeywordRetriever::new(temp.path());

        let matches = retriever.retrieve(&one("@files *.py"), 10).await.unwrap();
        let paths: Vec<&str> = matches.iter().map(|m| m.source_path.as_str()).collect();
        assert_eq!(paths, vec!["src/auth.py", "src/db.py"]);
        assert!(matches.iter().all(|m| m.snippet.is_empty()));
    }

    #[test_log::test(tokio::test)]
    async fn folder_targets_list_subtree() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let retriever = KeywordRetriever::new(temp.path());

        let matches = retriever.retrieve(&one("@folder docs/"), 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source_path, "docs/auth.md");
    }

    #[test_log::test(tokio::test)]
    async fn out_of_scope_target_matches_nothing() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let retriever = KeywordRetriever::new(temp.path());

        let matches = retriever
            .retrieve(&one("@files ../../etc/passwd"), 10)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn edited_file_is_reindexed_before_matching() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let retriever = KeywordRetriever::new(temp.path());

        assert!(retriever
            .retrieve(&one("@code refresh_session"), 10)
            .await
            .unwrap()
            .is_empty());

        fs::write(
            temp.path().join("src/auth.py"),
            "def refresh_session(user):\n    return reissue(user)\n",
        )
        .unwrap();

        let matches = retriever
            .retrieve(&one("@code refresh_session"), 10)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source_path, "src/auth.py");
    }

    #[test_log::test(tokio::test)]
    async fn invalidate_reloads_one_path() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let retriever = KeywordRetriever::new(temp.path());
        retriever.retrieve(&one("@code login"), 10).await.unwrap();

        fs::remove_file(temp.path().join("src/db.py")).unwrap();
        retriever.invalidate("src/db.py").await;

        let matches = retriever.retrieve(&one("@code connect"), 10).await.unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn windows_merge_adjacent_lines() {
        let lines: BTreeSet<u32> = [3, 4, 6, 20].into_iter().collect();
        let windows = line_windows(&lines);
        assert_eq!(windows, vec![(2, 7), (19, 21)]);
    }
}
