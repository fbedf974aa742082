use crate::error::IndexerError;
use crate::error::Result;
use log::warn;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// Confines all file access to a configured project root.
///
/// Resolution is lexical: `..` components and absolute candidates are
/// rejected without touching the filesystem, so a hostile pattern never
/// triggers I/O outside the root. Rejections are logged because they are
/// security-relevant, but the caller treats them as "no result".
#[derive(Debug, Clone)]
pub struct PathScope {
    root: PathBuf,
}

impl PathScope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative candidate against the root, rejecting escapes.
    pub fn resolve(&self, candidate: &str) -> Result<PathBuf> {
        let candidate_path = Path::new(candidate);
        if candidate_path.is_absolute() {
            warn!("rejected absolute path outside scope: {candidate}");
            return Err(IndexerError::PathEscape(candidate_path.to_path_buf()));
        }
        for component in candidate_path.components() {
            match component {
                Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                    warn!("rejected path escaping project root: {candidate}");
                    return Err(IndexerError::PathEscape(candidate_path.to_path_buf()));
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }
        Ok(self.root.join(candidate_path))
    }

    /// Whether a candidate stays inside the root.
    pub fn contains(&self, candidate: &str) -> bool {
        self.resolve(candidate).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_plain_relative_paths() {
        let scope = PathScope::new("/project");
        let resolved = scope.resolve("src/main.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/main.rs"));
    }

    #[test]
    fn rejects_parent_traversal() {
        let scope = PathScope::new("/project");
        assert!(matches!(
            scope.resolve("../../etc/passwd"),
            Err(IndexerError::PathEscape(_))
        ));
        assert!(matches!(
            scope.resolve("src/../../etc/passwd"),
            Err(IndexerError::PathEscape(_))
        ));
    }

    #[test]
    fn rejects_absolute_candidates() {
        let scope = PathScope::new("/project");
        assert!(!scope.contains("/etc/passwd"));
    }

    #[test]
    fn curdir_components_are_fine() {
        let scope = PathScope::new("/project");
        assert!(scope.contains("./src/lib.rs"));
    }
}
