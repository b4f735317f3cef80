//! Citation extraction, formatting and linking

use regex::Regex;
use std::sync::OnceLock;

use crate::types::{Citation, RerankedHit};

/// Characters of chunk text kept in a citation excerpt
pub const CITATION_TEXT_LIMIT: usize = 200;

/// One citation per hit, in re-rank order
pub fn extract_citations(hits: &[RerankedHit]) -> Vec<Citation> {
    hits.iter()
        .map(|h| {
            let chunk = h.chunk();
            let document_name = if chunk.source.file_name.is_empty() {
                "Unknown".to_string()
            } else {
                chunk.source.file_name.clone()
            };
            Citation {
                chunk_id: chunk.id.to_string(),
                document_name,
                page_number: chunk.source.page_number,
                score: h.rerank_score,
                text: truncate_snippet(&chunk.content, CITATION_TEXT_LIMIT),
            }
        })
        .collect()
}

/// Numbered source list appended to the answer prompt
pub fn format_citations_for_prompt(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut out = String::from("\n\nSources:\n");
    for (i, citation) in citations.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, citation.format_source()));
    }
    out
}

/// Context block with `[Source i]` headers the model can cite
pub fn format_context_with_citations(hits: &[RerankedHit], include_scores: bool) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut out = String::from("Context from documents:\n\n");

    for (i, h) in hits.iter().enumerate() {
        let chunk = h.chunk();
        let name = if chunk.source.file_name.is_empty() {
            "Unknown"
        } else {
            chunk.source.file_name.as_str()
        };

        out.push_str(&format!("[Source {}] {}", i + 1, name));
        if let Some(page) = chunk.source.page_number {
            out.push_str(&format!(" (Page {})", page));
        }
        if include_scores {
            out.push_str(&format!(" [Score: {:.3}]", h.rerank_score));
        }
        out.push_str(":\n");
        out.push_str(&chunk.content);
        out.push_str("\n\n");
    }

    out
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[(?:Source\s*)?(\d+)\]").expect("Invalid regex")
    })
}

/// Narrow citations to the ones an answer refers to.
///
/// Markers are 1-based `[Source n]` or `[n]`. Referenced citations come back in
/// first-mention order; if none are referenced (or all markers are out of
/// range), every citation is kept.
pub fn link_citations(answer: &str, citations: Vec<Citation>) -> Vec<Citation> {
    let mut picked: Vec<usize> = Vec::new();
    for cap in marker_pattern().captures_iter(answer) {
        let Some(n) = cap.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
            continue;
        };
        if n >= 1 && n <= citations.len() && !picked.contains(&(n - 1)) {
            picked.push(n - 1);
        }
    }

    if picked.is_empty() {
        return citations;
    }

    let mut slots: Vec<Option<Citation>> = citations.into_iter().map(Some).collect();
    picked.into_iter().filter_map(|i| slots[i].take()).collect()
}

/// Truncate a snippet to `max_len` characters, appending `...`
pub fn truncate_snippet(snippet: &str, max_len: usize) -> String {
    match snippet.char_indices().nth(max_len) {
        Some((byte, _)) => format!("{}...", &snippet[..byte]),
        None => snippet.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::hit;
    use crate::types::RerankedHit;

    fn reranked(file: &str, content: &str, score: f32) -> RerankedHit {
        RerankedHit {
            hit: hit(file, 0, content, score),
            rerank_score: score,
        }
    }

    #[test]
    fn test_extract_citations() {
        let long = "word ".repeat(100);
        let hits = vec![reranked("policy.pdf", &long, 0.8), reranked("", "short", 0.4)];

        let citations = extract_citations(&hits);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].chunk_id, hits[0].chunk().id.to_string());
        assert_eq!(citations[0].page_number, Some(1));
        assert!(citations[0].text.ends_with("..."));
        assert_eq!(citations[0].text.chars().count(), CITATION_TEXT_LIMIT + 3);
        assert_eq!(citations[1].document_name, "Unknown");
        assert_eq!(citations[1].text, "short");
    }

    #[test]
    fn test_format_for_prompt() {
        assert_eq!(format_citations_for_prompt(&[]), "");

        let citations = extract_citations(&[reranked("guide.pdf", "text", 0.5)]);
        assert_eq!(
            format_citations_for_prompt(&citations),
            "\n\nSources:\n[1] guide.pdf (Page 1)\n"
        );
    }

    #[test]
    fn test_format_context() {
        let hits = vec![reranked("guide.pdf", "Install with the wizard.", 0.91234)];
        let context = format_context_with_citations(&hits, true);
        assert_eq!(
            context,
            "Context from documents:\n\n[Source 1] guide.pdf (Page 1) [Score: 0.912]:\nInstall with the wizard.\n\n"
        );
        assert!(!format_context_with_citations(&hits, false).contains("Score"));
        assert_eq!(format_context_with_citations(&[], true), "");
    }

    #[test]
    fn test_same_file_name_gets_distinct_ids() {
        let mut a = reranked("notes.txt", "team a notes", 0.9);
        a.hit.chunk.source.file_path = "/team-a/notes.txt".into();
        let mut b = reranked("notes.txt", "team b notes", 0.8);
        b.hit.chunk.source.file_path = "/team-b/notes.txt".into();
        assert_eq!(a.chunk().label(), b.chunk().label());

        let citations = extract_citations(&[a.clone(), b.clone()]);
        assert_ne!(citations[0].chunk_id, citations[1].chunk_id);
        assert_eq!(citations[0].chunk_id, a.chunk().id.to_string());
        assert_eq!(citations[1].chunk_id, b.chunk().id.to_string());
    }

    #[test]
    fn test_link_citations_subset() {
        let hits = vec![
            reranked("a.txt", "one", 0.9),
            reranked("b.txt", "two", 0.8),
            reranked("c.txt", "three", 0.7),
        ];
        let all = extract_citations(&hits);

        let linked = link_citations("Per [Source 3] and [1], also [3] again.", all.clone());
        let names: Vec<_> = linked.iter().map(|c| c.document_name.as_str()).collect();
        assert_eq!(names, vec!["c.txt", "a.txt"]);

        assert_eq!(link_citations("No markers here.", all.clone()).len(), 3);
        assert_eq!(link_citations("Bogus [9].", all).len(), 3);
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_snippet("ééééé", 3), "ééé...");
        assert_eq!(truncate_snippet("abc", 3), "abc");
    }
}
