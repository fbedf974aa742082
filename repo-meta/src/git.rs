use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::process::Command;

use log::warn;

/// One commit touching a path, newest first in [`recent_commits`] output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub reference: String,
    pub timestamp: u64,
    pub message: String,
}

/// Paths with uncommitted changes, plus paths changed since `since` when a
/// revision is given. Returns an empty set outside a git repository.
pub fn changed_files(root: &Path, since: Option<&str>) -> HashSet<String> {
    let mut paths = HashSet::new();
    if let Err(err) = collect_status(root, &mut paths) {
        warn!("git status failed: {err}");
    }
    if let Some(revision) = since
        && let Err(err) = collect_diff(root, revision, &mut paths)
    {
        warn!("git diff against {revision} failed: {err}");
    }
    paths
}

/// Working-tree paths that are modified or untracked right now.
pub fn recent_paths(root: &Path) -> HashSet<String> {
    changed_files(root, None)
}

/// Commit history for one path, newest first, capped at `limit`.
pub fn recent_commits(root: &Path, path: &str, limit: usize) -> Vec<CommitInfo> {
    match collect_log(root, path, limit) {
        Ok(commits) => commits,
        Err(err) => {
            warn!("git log for {path} failed: {err}");
            Vec::new()
        }
    }
}

fn run_git(root: &Path, args: &[&str]) -> io::Result<Option<String>> {
    let output = Command::new("git").args(args).current_dir(root).output()?;
    if !output.status.success() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

fn collect_status(root: &Path, paths: &mut HashSet<String>) -> io::Result<()> {
    let Some(stdout) = run_git(root, &["status", "--porcelain"])? else {
        return Ok(());
    };
    for line in stdout.lines() {
        if line.len() < 4 {
            continue;
        }
        let path_part = line[3..].trim();
        // Renames come through as "old -> new"; the new side is the one
        // that exists on disk.
        let path = match path_part.find(" -> ") {
            Some(idx) => &path_part[idx + 4..],
            None => path_part,
        };
        if path.is_empty() {
            continue;
        }
        paths.insert(path.trim_matches('"').replace('\\', "/"));
    }
    Ok(())
}

fn collect_diff(root: &Path, revision: &str, paths: &mut HashSet<String>) -> io::Result<()> {
    let Some(stdout) = run_git(root, &["diff", "--name-only", revision])? else {
        return Ok(());
    };
    for line in stdout.lines() {
        let path = line.trim();
        if !path.is_empty() {
            paths.insert(path.replace('\\', "/"));
        }
    }
    Ok(())
}

fn collect_log(root: &Path, path: &str, limit: usize) -> io::Result<Vec<CommitInfo>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let max = limit.to_string();
    let Some(stdout) = run_git(
        root,
        &[
            "log",
            "--max-count",
            &max,
            "--pretty=format:%H%x1f%ct%x1f%s",
            "--",
            path,
        ],
    )?
    else {
        return Ok(Vec::new());
    };
    let mut commits = Vec::new();
    for line in stdout.lines() {
        let mut fields = line.split('\u{1f}');
        let (Some(reference), Some(timestamp), Some(message)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let Ok(timestamp) = timestamp.parse::<u64>() else {
            continue;
        };
        commits.push(CommitInfo {
            reference: reference.to_string(),
            timestamp,
            message: message.to_string(),
        });
    }
    Ok(commits)
}
