use std::collections::HashMap;

const MIN_TOKEN_LEN: usize = 3;

/// Tokenize file content into per-line postings: token -> sorted 1-based
/// line numbers. Tokens are lowercased identifier-shaped runs; language
/// keywords are skipped so they do not dominate the index.
pub fn tokenize_lines(content: &str) -> HashMap<String, Vec<u32>> {
    let mut postings: HashMap<String, Vec<u32>> = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        for token in line_tokens(line) {
            let lines = postings.entry(token).or_default();
            if lines.last() != Some(&line_no) {
                lines.push(line_no);
            }
        }
    }
    postings
}

/// Tokenize a query pattern with the same rules used for indexing, so
/// lookups and postings agree.
pub fn tokenize_query(pattern: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for token in line_tokens(pattern) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

fn line_tokens(line: &str) -> impl Iterator<Item = String> + '_ {
    let mut buf = String::new();
    let mut out = Vec::new();
    for ch in line.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            buf.push(ch);
        } else {
            flush_token(&mut buf, &mut out);
        }
    }
    flush_token(&mut buf, &mut out);
    out.into_iter()
}

fn flush_token(buf: &mut String, out: &mut Vec<String>) {
    if buf.len() >= MIN_TOKEN_LEN {
        let mut chars = buf.chars();
        if let Some(first) = chars.next()
            && (first.is_ascii_alphabetic() || first == '_')
        {
            let token = buf.to_ascii_lowercase();
            if !is_keyword(&token) {
                out.push(token);
            }
        }
    }
    buf.clear();
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token,
        "struct"
            | "impl"
            | "enum"
            | "class"
            | "const"
            | "let"
            | "pub"
            | "mod"
            | "type"
            | "return"
            | "else"
            | "while"
            | "for"
            | "match"
            | "def"
            | "self"
            | "this"
            | "var"
            | "function"
            | "import"
            | "from"
            | "use"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn postings_are_per_line_and_sorted() {
        let content = "fn login() {\n    check_password();\n}\nlogin();\n";
        let postings = tokenize_lines(content);
        assert_eq!(postings.get("login"), Some(&vec![1, 4]));
        assert_eq!(postings.get("check_password"), Some(&vec![2]));
    }

    #[test]
    fn duplicate_tokens_on_one_line_counted_once() {
        let postings = tokenize_lines("login login login\n");
        assert_eq!(postings.get("login"), Some(&vec![1]));
    }

    #[test]
    fn keywords_and_short_runs_skipped() {
        let postings = tokenize_lines("pub struct Db { id: u32 }\n");
        assert!(!postings.contains_key("pub"));
        assert!(!postings.contains_key("struct"));
        assert!(!postings.contains_key("db"));
    }

    #[test]
    fn numeric_leading_runs_skipped() {
        let postings = tokenize_lines("123abc real_token\n");
        assert!(!postings.contains_key("123abc"));
        assert!(postings.contains_key("real_token"));
    }

    #[test]
    fn query_tokens_match_index_rules() {
        assert_eq!(
            tokenize_query("Login AND check_password"),
            vec!["login".to_string(), "and".to_string(), "check_password".to_string()]
        );
    }
}
