use crate::error::IndexerError;
use crate::error::Result;
use crate::symbols::extract_symbols;
use crate::symbols::LanguageHint;
use crate::symbols::SymbolEntry;
use crate::tokens::tokenize_lines;
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Everything the retrievers know about one file. Owned exclusively by
/// the retriever that built it and rebuilt whole when the file's mtime
/// changes; entries are copied, never shared by reference, across
/// retrievers.
#[derive(Debug, Clone)]
pub struct FileIndexEntry {
    /// Root-relative path with `/` separators.
    pub path: String,
    pub mtime: SystemTime,
    pub size: u64,
    /// token -> sorted 1-based line numbers.
    pub token_postings: HashMap<String, Vec<u32>>,
    pub symbols: Vec<SymbolEntry>,
}

impl FileIndexEntry {
    /// Whether the on-disk file has drifted from this entry. A missing
    /// file also counts as stale so the caller drops the entry.
    pub fn is_stale(&self, root: &Path) -> bool {
        let Ok(metadata) = fs::metadata(root.join(&self.path)) else {
            return true;
        };
        match metadata.modified() {
            Ok(modified) => modified != self.mtime || metadata.len() != self.size,
            Err(_) => true,
        }
    }
}

/// Index one file: read it, tokenize it, extract symbols. Fails only for
/// this file; callers log and continue.
pub fn index_file(root: &Path, rel: &str) -> Result<FileIndexEntry> {
    let absolute = root.join(rel);
    let metadata = fs::metadata(&absolute)?;
    let mtime = metadata.modified()?;
    let bytes = fs::read(&absolute)?;
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| IndexerError::NotText(absolute.clone()))?;

    let language = LanguageHint::from_path(Path::new(rel));
    let token_postings = tokenize_lines(content);
    let symbols = extract_symbols(language, content);
    debug!(
        "indexed {rel}: {} token(s), {} symbol(s)",
        token_postings.len(),
        symbols.len()
    );

    Ok(FileIndexEntry {
        path: rel.to_string(),
        mtime,
        size: metadata.len(),
        token_postings,
        symbols,
    })
}
