use std::fmt::Write as _;

use scout_retrieval::ContextMatch;

/// Rough chars-per-token ratio for the budget estimate.
const CHARS_PER_TOKEN: usize = 4;

/// Render matches as a markdown block for hand-off to a language model.
///
/// Spanless matches render as a path line; spanned matches get a fenced
/// snippet. A rough token estimate trails the block so the caller can
/// budget before sending.
pub fn format_matches(matches: &[ContextMatch]) -> String {
    if matches.is_empty() {
        return String::new();
    }
    let mut out = String::from("## Project context\n");
    for m in matches {
        let _ = match (m.start_line, m.end_line) {
            (Some(start), Some(end)) => writeln!(
                out,
                "\n### {}:{start}-{end} ({}, score {:.2})",
                m.source_path,
                m.retriever.as_str(),
                m.score
            ),
            _ => writeln!(
                out,
                "\n### {} ({}, score {:.2})",
                m.source_path,
                m.retriever.as_str(),
                m.score
            ),
        };
        if !m.snippet.is_empty() {
            let _ = writeln!(out, "```\n{}\n```", m.snippet);
        }
    }
    let estimate = out.len() / CHARS_PER_TOKEN;
    let _ = writeln!(out, "\n(~{estimate} tokens)");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_retrieval::RetrieverKind;

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(format_matches(&[]), "");
    }

    #[test]
    fn spanned_matches_get_fenced_snippets() {
        let mut m = ContextMatch::whole_file(
            "src/auth.py".to_string(),
            0.87,
            RetrieverKind::Structure,
        );
        m.start_line = Some(4);
        m.end_line = Some(6);
        m.snippet = "def login(user, password):\n    return issue_token(user)".to_string();

        let rendered = format_matches(std::slice::from_ref(&m));
        assert!(rendered.contains("### src/auth.py:4-6 (structure, score 0.87)"));
        assert!(rendered.contains("```\ndef login"));
        assert!(rendered.contains("tokens)"));
    }

    #[test]
    fn spanless_matches_render_as_path_lines() {
        let m = ContextMatch::whole_file("src/db.py".to_string(), 0.8, RetrieverKind::Keyword);
        let rendered = format_matches(&[m]);
        assert!(rendered.contains("### src/db.py (keyword, score 0.80)"));
        assert!(!rendered.contains("```"));
    }
}
