use crate::request::BooleanTerm;
use crate::request::ContextKind;
use crate::request::ContextRequest;
use log::debug;

const MARKER: char = '@';

/// Parse free-form text into zero or more context requests.
///
/// Pure and stateless; the only failure mode is an empty list. Repeated
/// parses of the same input always produce identical output.
pub fn parse(text: &str) -> Vec<ContextRequest> {
    let segments = split_segments(text);
    if segments.is_empty() {
        return Vec::new();
    }
    debug!("parsed {} marker segment(s)", segments.len());
    assemble_requests(segments)
}

/// One marker-introduced pattern plus the connector (if any) that joins it
/// to the following pattern.
struct Segment {
    kind: ContextKind,
    body: String,
    connector: Option<Connector>,
}

#[derive(Clone, Copy, PartialEq)]
enum Connector {
    And,
    Or,
}

fn split_segments(text: &str) -> Vec<Segment> {
    let mut raw: Vec<(ContextKind, usize, usize)> = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(MARKER) {
        let marker_at = pos + offset;
        let keyword_start = marker_at + MARKER.len_utf8();
        let keyword_end = text[keyword_start..]
            .find(|c: char| !c.is_ascii_alphabetic())
            .map(|i| keyword_start + i)
            .unwrap_or(text.len());
        let keyword = &text[keyword_start..keyword_end];
        let boundary_ok = keyword_end == text.len()
            || bytes
                .get(keyword_end)
                .is_some_and(|b| b.is_ascii_whitespace());

        match ContextKind::from_keyword(keyword) {
            // The marker must sit directly against the keyword and the
            // keyword must end at a whitespace boundary; anything else is
            // inert prose (an email address, a handle, a typo).
            Some(kind) if boundary_ok => {
                if let Some((_, _, end)) = raw.last_mut() {
                    *end = marker_at;
                }
                raw.push((kind, keyword_end, text.len()));
                pos = keyword_end;
            }
            _ => {
                pos = keyword_start;
            }
        }
    }

    let mut segments: Vec<Segment> = raw
        .into_iter()
        .map(|(kind, start, end)| Segment {
            kind,
            body: text[start..end].trim().to_string(),
            connector: None,
        })
        .collect();

    // AND/OR is composition only *between* whole patterns, so it can only
    // appear as the final token of a body that has a successor.
    let count = segments.len();
    for (idx, segment) in segments.iter_mut().enumerate() {
        if idx + 1 >= count {
            break;
        }
        if let Some(stripped) = strip_trailing_connector(&segment.body, "AND") {
            segment.body = stripped;
            segment.connector = Some(Connector::And);
        } else if let Some(stripped) = strip_trailing_connector(&segment.body, "OR") {
            segment.body = stripped;
            segment.connector = Some(Connector::Or);
        }
    }

    segments
}

fn strip_trailing_connector(body: &str, token: &str) -> Option<String> {
    let trimmed = body.trim_end();
    let rest = trimmed.strip_suffix(token)?;
    // Connector must be a standalone trailing token, not a word suffix.
    if !rest.is_empty() && !rest.ends_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_end().to_string())
}

fn assemble_requests(segments: Vec<Segment>) -> Vec<ContextRequest> {
    let mut requests: Vec<ContextRequest> = Vec::new();
    let mut pending: Option<(Connector, ContextKind)> = None;

    for segment in segments {
        let targets = split_targets(&segment.body);
        if targets.is_empty() {
            // Marker with nothing following: dropped silently.
            pending = None;
            continue;
        }

        let joined = pending
            .take()
            .filter(|(_, kind)| *kind == segment.kind)
            .map(|(connector, _)| connector);

        match (joined, requests.last_mut()) {
            (Some(connector), Some(last)) => {
                let token = match connector {
                    Connector::And => "AND",
                    Connector::Or => "OR",
                };
                last.raw_pattern = format!("{} {token} {}", last.raw_pattern, segment.body);
                for target in &targets {
                    last.boolean_terms.push(match connector {
                        Connector::And => BooleanTerm::required(target.clone()),
                        Connector::Or => BooleanTerm::optional(target.clone()),
                    });
                }
                if last.path_hint.is_none() {
                    last.path_hint = find_path_hint(&targets);
                }
                last.targets.extend(targets);
            }
            _ => {
                let boolean_terms = targets
                    .iter()
                    .map(|t| BooleanTerm::required(t.clone()))
                    .collect();
                requests.push(ContextRequest {
                    kind: segment.kind,
                    raw_pattern: segment.body.clone(),
                    path_hint: find_path_hint(&targets),
                    targets,
                    boolean_terms,
                });
            }
        }

        pending = segment.connector.map(|c| (c, segment.kind));
    }

    requests
}

/// Split a body into targets. Quotes preserve embedded spaces and are
/// stripped from the result.
fn split_targets(body: &str) -> Vec<String> {
    let mut targets = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in body.chars() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                if !current.is_empty() {
                    targets.push(std::mem::take(&mut current));
                }
            }
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                if !current.is_empty() {
                    targets.push(std::mem::take(&mut current));
                }
                quote = Some(ch);
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    targets.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }
    if !current.is_empty() {
        targets.push(current);
    }
    targets
}

fn find_path_hint(targets: &[String]) -> Option<String> {
    targets
        .iter()
        .find(|t| t.contains('/') || t.starts_with("./"))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(parse("just talk to me").is_empty());
        assert!(parse("").is_empty());
    }

    #[test]
    fn single_files_pattern() {
        let requests = parse("please look at @files src/main.rs first");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, ContextKind::Files);
        assert_eq!(
            requests[0].targets,
            vec!["src/main.rs".to_string(), "first".to_string()]
        );
        assert_eq!(requests[0].path_hint.as_deref(), Some("src/main.rs"));
    }

    #[test]
    fn multiple_targets_in_one_body() {
        let requests = parse("@files a.py b.py");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].targets, vec!["a.py", "b.py"]);
    }

    #[test]
    fn separate_markers_stay_separate_requests() {
        let requests = parse("@files a.py @files b.py");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].targets, vec!["a.py"]);
        assert_eq!(requests[1].targets, vec!["b.py"]);
        // Fixed policy: repeated parses are identical.
        assert_eq!(requests, parse("@files a.py @files b.py"));
    }

    #[test]
    fn quoted_target_keeps_spaces() {
        let requests = parse("@files \"My Documents/notes.md\"");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].targets, vec!["My Documents/notes.md"]);
    }

    #[test]
    fn unknown_kind_is_inert_text() {
        assert!(parse("mail me @example.com about it").is_empty());
        let requests = parse("@nothing here but @code login works");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, ContextKind::Code);
    }

    #[test]
    fn marker_inside_word_is_inert() {
        assert!(parse("user@files.example.com").is_empty());
    }

    #[test]
    fn empty_body_dropped_silently() {
        assert!(parse("@files").is_empty());
        assert!(parse("@files   ").is_empty());
        let requests = parse("@files @code login");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, ContextKind::Code);
    }

    #[test]
    fn and_joins_same_kind_patterns() {
        let requests = parse("@code retry AND @code backoff");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].targets, vec!["retry", "backoff"]);
        assert_eq!(
            requests[0].boolean_terms,
            vec![
                BooleanTerm::required("retry"),
                BooleanTerm::required("backoff"),
            ]
        );
        assert_eq!(requests[0].raw_pattern, "retry AND backoff");
    }

    #[test]
    fn or_marks_widening_terms() {
        let requests = parse("@code parse OR @code tokenize");
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].boolean_terms,
            vec![
                BooleanTerm::required("parse"),
                BooleanTerm::optional("tokenize"),
            ]
        );
    }

    #[test]
    fn chained_connectors_fold_left_to_right() {
        let requests = parse("@code read AND @code write OR @code flush");
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].boolean_terms,
            vec![
                BooleanTerm::required("read"),
                BooleanTerm::required("write"),
                BooleanTerm::optional("flush"),
            ]
        );
    }

    #[test]
    fn connector_across_kinds_splits_requests() {
        let requests = parse("@files util.py AND @code helper");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].kind, ContextKind::Files);
        assert_eq!(requests[1].kind, ContextKind::Code);
    }

    #[test]
    fn mid_body_and_is_a_plain_target() {
        let requests = parse("@code fetch AND retry logic");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].targets, vec!["fetch", "AND", "retry", "logic"]);
    }

    #[test]
    fn trailing_connector_without_successor_stays_in_body() {
        let requests = parse("@code cleanup AND");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].targets, vec!["cleanup", "AND"]);
    }

    #[test]
    fn git_and_folder_kinds_recognized() {
        let requests = parse("@git src/lib.rs and @folder src/util");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].kind, ContextKind::Git);
        assert_eq!(requests[1].kind, ContextKind::Folder);
    }
}
