/*!
Version control metadata for a project root.

Shells out to the `git` binary rather than linking a libgit2 binding; the
host repository may be absent, shallow, or broken, and every lookup here
degrades to an empty answer with a logged warning instead of failing the
caller.
*/

mod git;

pub use git::changed_files;
pub use git::recent_commits;
pub use git::recent_paths;
pub use git::CommitInfo;
