use crate::error::Result;
use ignore::WalkBuilder;
use log::debug;
use log::warn;
use std::path::Path;

/// Per-rebuild file cap. Files beyond the cap are picked up on the next
/// rolling rebuild instead of blocking the caller.
pub const DEFAULT_FILE_CAP: usize = 500;

const MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;

/// One rolling window over the project tree.
pub struct ScanWindow {
    /// Root-relative paths, sorted, at most `cap` of them.
    pub paths: Vec<String>,
    /// Cursor the next rebuild resumes after, wrapping to the start of the
    /// tree when it runs off the end. `None` when the whole tree fit.
    pub resume_after: Option<String>,
}

/// Walk the project root and return the first window of root-relative
/// paths of indexable files, honoring gitignore rules and skipping
/// oversized files. At most `cap` paths are returned.
pub fn scan_files(root: &Path, cap: usize) -> Result<Vec<String>> {
    Ok(scan_window(root, cap, None)?.paths)
}

/// Walk the project root and return the window of at most `cap` indexable
/// paths that follows `resume_after` in sorted order. Successive rebuilds
/// thread the returned cursor back in, so a tree larger than the cap is
/// covered in full over consecutive windows.
pub fn scan_window(root: &Path, cap: usize, resume_after: Option<&str>) -> Result<ScanWindow> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .build();

    let mut all = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("skipping walk entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if entry
            .metadata()
            .map(|m| m.len() > MAX_FILE_BYTES)
            .unwrap_or(true)
        {
            continue;
        }
        let Some(rel) = relative_path(root, entry.path()) else {
            continue;
        };
        if rel.starts_with(".git/") {
            continue;
        }
        all.push(rel);
    }
    all.sort();

    if all.len() <= cap {
        return Ok(ScanWindow {
            paths: all,
            resume_after: None,
        });
    }
    debug!(
        "file cap {cap} reached ({} candidates); remaining files deferred to next rebuild",
        all.len()
    );
    let start = match resume_after {
        Some(cursor) => all.partition_point(|p| p.as_str() <= cursor),
        None => 0,
    };
    let window: Vec<String> = all.iter().cycle().skip(start).take(cap).cloned().collect();
    let resume_after = window.last().cloned();
    let mut paths = window;
    paths.sort();
    Ok(ScanWindow {
        paths,
        resume_after,
    })
}

/// Whether a path looks like documentation rather than source.
pub fn is_doc_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".md")
        || lower.ends_with(".rst")
        || lower.ends_with(".txt")
        || lower.ends_with(".adoc")
        || lower.ends_with(".mdx")
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let rel = rel.to_string_lossy().replace('\\', "/");
    if rel.is_empty() { None } else { Some(rel) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walk_respects_gitignore() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(root.join(".gitignore"), "target/\n").unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn visible() {}\n").unwrap();
        fs::write(root.join("target/out.rs"), "pub fn hidden() {}\n").unwrap();

        let files = scan_files(root, DEFAULT_FILE_CAP).unwrap();
        assert!(files.contains(&"src/lib.rs".to_string()));
        assert!(!files.iter().any(|f| f.starts_with("target/")));
    }

    #[test]
    fn walk_honors_cap() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for i in 0..10 {
            fs::write(root.join(format!("file{i}.rs")), "fn f() {}\n").unwrap();
        }
        let files = scan_files(root, 4).unwrap();
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn windows_roll_over_the_whole_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for i in 0..8 {
            fs::write(root.join(format!("file{i}.rs")), "fn f() {}\n").unwrap();
        }

        let mut covered = HashSet::new();
        let mut cursor: Option<String> = None;
        for _ in 0..4 {
            let window = scan_window(root, 4, cursor.as_deref()).unwrap();
            assert_eq!(window.paths.len(), 4);
            covered.extend(window.paths);
            cursor = window.resume_after;
        }
        assert_eq!(covered.len(), 8);
    }

    #[test]
    fn window_cursor_wraps_past_the_end() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for i in 0..5 {
            fs::write(root.join(format!("file{i}.rs")), "fn f() {}\n").unwrap();
        }

        let first = scan_window(root, 3, None).unwrap();
        assert_eq!(first.paths, vec!["file0.rs", "file1.rs", "file2.rs"]);
        let second = scan_window(root, 3, first.resume_after.as_deref()).unwrap();
        // Runs off the end of the tree and wraps to the front.
        assert_eq!(second.paths, vec!["file0.rs", "file3.rs", "file4.rs"]);
    }

    #[test]
    fn small_tree_fits_one_window() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("only.rs"), "fn f() {}\n").unwrap();

        let window = scan_window(root, 4, None).unwrap();
        assert_eq!(window.paths, vec!["only.rs"]);
        assert!(window.resume_after.is_none());
    }

    #[test]
    fn doc_paths_classified() {
        assert!(is_doc_path("README.md"));
        assert!(is_doc_path("docs/guide.RST"));
        assert!(!is_doc_path("src/main.rs"));
    }
}
