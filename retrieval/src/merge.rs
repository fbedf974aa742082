use std::cmp::Ordering;
use std::collections::HashMap;

use crate::result::ContextMatch;

type SpanKey = (String, Option<u32>, Option<u32>);

/// Fuse per-strategy result lists into one ranked list.
///
/// Matches covering the same span are collapsed to the highest-scoring
/// one, so a file found by two strategies does not appear twice. Ordering
/// is score descending with path then start line as tie-breaks, which
/// keeps repeat runs byte-stable.
pub fn merge_ranked(batches: Vec<Vec<ContextMatch>>, limit: usize) -> Vec<ContextMatch> {
    let mut best: HashMap<SpanKey, ContextMatch> = HashMap::new();
    for batch in batches {
        for m in batch {
            match best.get(&m.span_key()) {
                Some(existing) if existing.score >= m.score => {}
                _ => {
                    best.insert(m.span_key(), m);
                }
            }
        }
    }
    let mut merged: Vec<ContextMatch> = best.into_values().collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.source_path.cmp(&b.source_path))
            .then_with(|| a.start_line.cmp(&b.start_line))
    });
    merged.truncate(limit);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::RetrieverKind;
    use pretty_assertions::assert_eq;

    fn m(path: &str, start: u32, end: u32, score: f32, retriever: RetrieverKind) -> ContextMatch {
        ContextMatch {
            source_path: path.to_string(),
            start_line: Some(start),
            end_line: Some(end),
            snippet: String::new(),
            score,
            retriever,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn same_span_keeps_highest_score() {
        let merged = merge_ranked(
            vec![
                vec![m("src/auth.py", 10, 20, 0.4, RetrieverKind::Keyword)],
                vec![m("src/auth.py", 10, 20, 0.9, RetrieverKind::Structure)],
            ],
            10,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].score, 0.9);
        assert_eq!(merged[0].retriever, RetrieverKind::Structure);
    }

    #[test]
    fn spanless_and_spanned_matches_are_distinct() {
        let merged = merge_ranked(
            vec![vec![
                ContextMatch::whole_file("src/auth.py".to_string(), 0.7, RetrieverKind::Keyword),
                m("src/auth.py", 10, 20, 0.7, RetrieverKind::Structure),
            ]],
            10,
        );
        assert_eq!(merged.len(), 2);
        // Spanless sorts ahead of spanned at equal score.
        assert_eq!(merged[0].start_line, None);
    }

    #[test]
    fn different_spans_in_one_file_both_survive() {
        let merged = merge_ranked(
            vec![vec![
                m("src/auth.py", 1, 5, 0.5, RetrieverKind::Keyword),
                m("src/auth.py", 30, 40, 0.5, RetrieverKind::Keyword),
            ]],
            10,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn ordering_is_score_then_path_then_line() {
        let merged = merge_ranked(
            vec![vec![
                m("b.rs", 1, 1, 0.5, RetrieverKind::Keyword),
                m("a.rs", 9, 9, 0.5, RetrieverKind::Keyword),
                m("a.rs", 2, 2, 0.5, RetrieverKind::Keyword),
                m("c.rs", 1, 1, 0.8, RetrieverKind::Keyword),
            ]],
            10,
        );
        let order: Vec<(String, Option<u32>)> = merged
            .iter()
            .map(|m| (m.source_path.clone(), m.start_line))
            .collect();
        assert_eq!(
            order,
            vec![
                ("c.rs".to_string(), Some(1)),
                ("a.rs".to_string(), Some(2)),
                ("a.rs".to_string(), Some(9)),
                ("b.rs".to_string(), Some(1)),
            ]
        );
    }

    #[test]
    fn limit_caps_output() {
        let batch: Vec<ContextMatch> = (0..20)
            .map(|i| m(&format!("f{i}.rs"), 1, 1, 0.1 * i as f32, RetrieverKind::Keyword))
            .collect();
        assert_eq!(merge_ranked(vec![batch], 5).len(), 5);
    }
}
