//! Context and prompt assembly for grounded question answering.
//!
//! The retrieved evidence set becomes a numbered context block the model
//! can cite by bracket number, plus a compact sources listing shown to the
//! user when the answer actually cites something.

use crate::models::{RetrievalResult, Retrieved};

/// Render the evidence set as a numbered context block.
///
/// Each entry is `[n] {source} — {text}`, numbered from 1 in rank order,
/// joined by blank lines. The numbering here is what the system prompt
/// tells the model to cite, so it must match the sources listing exactly.
pub fn build_context(retrieved: &RetrievalResult) -> String {
    retrieved
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {} — {}", i + 1, r.source_uri, r.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render the user-facing sources listing with one preview line per
/// retrieved chunk.
///
/// Previews collapse newlines to spaces and are truncated to
/// `preview_max_chars` characters with a `…` suffix. An empty evidence set
/// renders as `(no sources)`.
pub fn summarize_sources(retrieved: &RetrievalResult, preview_max_chars: usize) -> String {
    if retrieved.is_empty() {
        return "(no sources)".to_string();
    }
    retrieved
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {} — {}", i + 1, r.source_uri, preview(r, preview_max_chars)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn preview(r: &Retrieved, max_chars: usize) -> String {
    let flat: String = r
        .chunk
        .text
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        flat.to_string()
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

/// Combine the question and context block into the user message sent to
/// the model.
pub fn user_prompt(question: &str, context: &str) -> String {
    format!("Question: {}\n\nContext:\n{}", question, context)
}
