/*!
# Scout Indexer

File-level plumbing shared by the index-backed retrievers: ignore-aware
tree walking with a per-rebuild file cap, root-scoped path resolution,
per-line token postings, and line-based symbol extraction with spans and
one-hop reference names.

Every operation is scoped to a configured project root; a candidate path
that resolves outside it is rejected before any I/O happens. A file that
fails to read or parse is excluded on its own; it never aborts a build.
*/

mod entry;
mod error;
mod scope;
mod symbols;
mod tokens;
mod walk;

pub use entry::{index_file, FileIndexEntry};
pub use error::{IndexerError, Result};
pub use scope::PathScope;
pub use symbols::{extract_symbols, LanguageHint, SymbolEntry, SymbolKind};
pub use tokens::{tokenize_lines, tokenize_query};
pub use walk::{is_doc_path, scan_files, scan_window, ScanWindow, DEFAULT_FILE_CAP};
