use serde::Deserialize;
use serde::Serialize;

/// Kind of material a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKind {
    Files,
    Code,
    Docs,
    Git,
    Folder,
}

impl ContextKind {
    /// Map a marker keyword to a kind. Unknown keywords are not an error;
    /// the caller treats the marker as inert prose.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "files" => Some(Self::Files),
            "code" => Some(Self::Code),
            "docs" => Some(Self::Docs),
            "git" => Some(Self::Git),
            "folder" => Some(Self::Folder),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Code => "code",
            Self::Docs => "docs",
            Self::Git => "git",
            Self::Folder => "folder",
        }
    }
}

/// One term of a request's boolean composition.
///
/// `include == true` means the term must match (AND-joined); `false` means
/// it widens the result set (OR-joined). Terms are evaluated left to right
/// with no precedence between the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanTerm {
    pub term: String,
    pub include: bool,
}

impl BooleanTerm {
    pub fn required(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            include: true,
        }
    }

    pub fn optional(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            include: false,
        }
    }
}

/// A parsed, typed representation of one marker-introduced pattern.
///
/// Immutable once produced by [`crate::parse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRequest {
    pub kind: ContextKind,

    /// The raw pattern body as written, whitespace-trimmed.
    pub raw_pattern: String,

    /// Individual targets extracted from the body. Quoted targets keep
    /// their embedded spaces; quotes themselves are stripped.
    pub targets: Vec<String>,

    /// Boolean composition for retrievers that fold term postings.
    pub boolean_terms: Vec<BooleanTerm>,

    /// First target that looks like a path, if any.
    pub path_hint: Option<String>,
}
