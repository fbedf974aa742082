use log::debug;
use regex_lite::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;

const MAX_REFS_PER_SYMBOL: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Trait,
    Module,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Trait => "trait",
            Self::Module => "module",
        }
    }
}

/// A definition extracted from one file, with its line span and the names
/// it references (one hop: calls and imports inside the span).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub refs: Vec<String>,
}

/// Rough language classification by file extension. Enough to pick the
/// right definition prefixes; unknown languages simply produce no symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageHint {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Unknown,
}

impl LanguageHint {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => Self::Rust,
            Some("py") => Self::Python,
            Some("js" | "jsx" | "mjs") => Self::JavaScript,
            Some("ts" | "tsx") => Self::TypeScript,
            Some("go") => Self::Go,
            _ => Self::Unknown,
        }
    }
}

/// Extract definitions from `content`. A line that fails to classify is
/// skipped; extraction never fails for the whole file.
pub fn extract_symbols(language: LanguageHint, content: &str) -> Vec<SymbolEntry> {
    if language == LanguageHint::Unknown {
        return Vec::new();
    }
    let lines: Vec<&str> = content.lines().collect();
    let call_re = call_regex();
    let mut symbols = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some((name, kind)) = classify_definition(language, line) else {
            continue;
        };
        let start = idx + 1;
        let end = span_end(language, &lines, idx);
        let refs = collect_refs(&call_re, &lines[idx..end], &name);
        symbols.push(SymbolEntry {
            name,
            kind,
            start_line: start as u32,
            end_line: end as u32,
            refs,
        });
    }

    debug!("extracted {} symbol(s)", symbols.len());
    symbols
}

fn classify_definition(language: LanguageHint, line: &str) -> Option<(String, SymbolKind)> {
    let indented = line.starts_with(char::is_whitespace);
    let trimmed = line.trim_start();
    match language {
        LanguageHint::Rust => {
            let bare = trimmed
                .strip_prefix("pub(crate) ")
                .or_else(|| trimmed.strip_prefix("pub "))
                .unwrap_or(trimmed);
            if let Some(rest) = bare.strip_prefix("async fn ").or_else(|| bare.strip_prefix("fn ")) {
                let kind = if indented {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };
                return Some((identifier(rest)?, kind));
            }
            if let Some(rest) = bare.strip_prefix("struct ") {
                return Some((identifier(rest)?, SymbolKind::Struct));
            }
            if let Some(rest) = bare.strip_prefix("enum ") {
                return Some((identifier(rest)?, SymbolKind::Enum));
            }
            if let Some(rest) = bare.strip_prefix("trait ") {
                return Some((identifier(rest)?, SymbolKind::Trait));
            }
            if let Some(rest) = bare.strip_prefix("mod ") {
                return Some((identifier(rest)?, SymbolKind::Module));
            }
            None
        }
        LanguageHint::Python => {
            if let Some(rest) = trimmed
                .strip_prefix("async def ")
                .or_else(|| trimmed.strip_prefix("def "))
            {
                let kind = if indented {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };
                return Some((identifier(rest)?, kind));
            }
            if let Some(rest) = trimmed.strip_prefix("class ") {
                return Some((identifier(rest)?, SymbolKind::Class));
            }
            None
        }
        LanguageHint::JavaScript | LanguageHint::TypeScript => {
            let bare = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            if let Some(rest) = bare
                .strip_prefix("async function ")
                .or_else(|| bare.strip_prefix("function "))
            {
                return Some((identifier(rest)?, SymbolKind::Function));
            }
            if let Some(rest) = bare.strip_prefix("class ") {
                return Some((identifier(rest)?, SymbolKind::Class));
            }
            if language == LanguageHint::TypeScript
                && let Some(rest) = bare.strip_prefix("interface ")
            {
                return Some((identifier(rest)?, SymbolKind::Trait));
            }
            None
        }
        LanguageHint::Go => {
            if let Some(rest) = trimmed.strip_prefix("func ") {
                // Skip the receiver on methods: `func (s *Server) Name(`.
                let rest = if rest.starts_with('(') {
                    rest.find(')').map(|i| rest[i + 1..].trim_start())?
                } else {
                    rest
                };
                return Some((identifier(rest)?, SymbolKind::Function));
            }
            if let Some(rest) = trimmed.strip_prefix("type ") {
                return Some((identifier(rest)?, SymbolKind::Struct));
            }
            None
        }
        LanguageHint::Unknown => None,
    }
}

fn identifier(rest: &str) -> Option<String> {
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() { None } else { Some(name) }
}

/// Span end for a definition starting at `start_idx` (0-based), returned
/// as an exclusive 0-based index usable as a 1-based inclusive end line.
fn span_end(language: LanguageHint, lines: &[&str], start_idx: usize) -> usize {
    match language {
        LanguageHint::Python => indent_span_end(lines, start_idx),
        _ => brace_span_end(lines, start_idx),
    }
}

fn indent_span_end(lines: &[&str], start_idx: usize) -> usize {
    let base_indent = leading_whitespace(lines[start_idx]);
    let mut end = start_idx + 1;
    for (offset, line) in lines[start_idx + 1..].iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if leading_whitespace(line) <= base_indent {
            break;
        }
        end = start_idx + 2 + offset;
    }
    end
}

fn brace_span_end(lines: &[&str], start_idx: usize) -> usize {
    let mut depth: i32 = 0;
    let mut opened = false;
    for (offset, line) in lines[start_idx..].iter().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            return start_idx + offset + 1;
        }
    }
    if opened { lines.len() } else { start_idx + 1 }
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn call_regex() -> Regex {
    // Identifier directly followed by an open paren: calls and decorated
    // imports alike. Built once per extraction pass.
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex")
}

fn collect_refs(call_re: &Regex, span: &[&str], own_name: &str) -> Vec<String> {
    let mut refs = Vec::new();
    for line in span {
        for caps in call_re.captures_iter(line) {
            let Some(m) = caps.get(1) else { continue };
            let name = m.as_str();
            if name == own_name || is_control_word(name) {
                continue;
            }
            if !refs.iter().any(|r| r == name) {
                refs.push(name.to_string());
                if refs.len() >= MAX_REFS_PER_SYMBOL {
                    return refs;
                }
            }
        }
    }
    refs
}

fn is_control_word(name: &str) -> bool {
    matches!(
        name,
        "if" | "for" | "while" | "match" | "switch" | "return" | "fn" | "def" | "catch"
    )
}
