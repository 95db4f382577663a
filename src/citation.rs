//! Citation gate: show sources only when the answer cites them.
//!
//! An answer earns its sources listing by containing at least one bracket
//! citation like `[1]` or `[2, 5]`. Answers without citations (refusals,
//! "I don't know", model error placeholders) get no sources block.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::RetrievalResult;

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[\s*\d+(?:\s*,\s*\d+)*\s*\]").unwrap()
    })
}

/// Whether `answer` contains at least one bracket citation.
pub fn has_citation(answer: &str) -> bool {
    citation_pattern().is_match(answer)
}

/// Disclosure policy for one completed turn: true iff evidence was
/// retrieved AND the answer cites it. A citation token with nothing
/// behind it (empty evidence set) discloses nothing.
pub fn should_disclose_sources(answer: &str, retrieved: &RetrievalResult) -> bool {
    !retrieved.is_empty() && has_citation(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_citation() {
        assert!(has_citation("The answer is 42 [1]."));
    }

    #[test]
    fn test_citation_list() {
        assert!(has_citation("Both sources agree [1, 3]."));
        assert!(has_citation("Spaced [ 2 , 4 ] still counts."));
    }

    #[test]
    fn test_no_citation() {
        assert!(!has_citation("I don't know."));
        assert!(!has_citation(""));
    }

    #[test]
    fn test_non_numeric_brackets_ignored() {
        assert!(!has_citation("See [source] for details."));
        assert!(!has_citation("An empty [] bracket."));
        assert!(!has_citation("[1, two]"));
    }

    #[test]
    fn test_citation_anywhere_in_text() {
        assert!(has_citation("Preamble.\n\nDetails [12] follow.\n\nSources:\n..."));
    }

    fn evidence() -> RetrievalResult {
        vec![crate::models::Retrieved {
            chunk: crate::models::Chunk {
                id: "c1".to_string(),
                document_id: "d1".to_string(),
                text: "the forest area is large".to_string(),
                start_offset: 0,
                length: 24,
            },
            source_uri: "forest.txt".to_string(),
            score: 0.9,
            rank: 1,
        }]
    }

    #[test]
    fn test_disclosure_requires_citation_and_evidence() {
        assert!(should_disclose_sources(
            "The forest area is large [1].",
            &evidence()
        ));
        assert!(!should_disclose_sources("I don't know.", &evidence()));
    }

    #[test]
    fn test_citation_without_evidence_discloses_nothing() {
        assert!(!should_disclose_sources(
            "The forest area is large [1].",
            &Vec::new()
        ));
    }
}
