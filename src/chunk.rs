//! Recursive boundary text chunker.
//!
//! Splits document text into [`Chunk`]s that respect a configurable
//! character budget. Splitting tries the largest semantic boundary first —
//! paragraph break, then line break, then sentence-ending punctuation,
//! then whitespace — and hard-cuts at the budget only when a piece has no
//! usable boundary at all. After splitting, each chunk except the first is
//! prefixed with the trailing `overlap` characters of its predecessor so
//! retrieval never loses context at a cut point.
//!
//! Budgets and overlap are measured in characters (not bytes); chunk
//! offsets are byte offsets into the parent document, always on UTF-8
//! boundaries.

use std::ops::Range;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::Chunk;

/// Boundary ladder, largest first. The hard cut is the implicit last rung.
#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

/// Split `text` into overlapping chunks of at most `chunk_size` characters
/// (plus up to `overlap` characters of injected leading context).
///
/// Returns chunks in document order. Whitespace-only pieces are dropped.
/// An empty document produces no chunks.
///
/// # Errors
///
/// `EngineError::Config` when `chunk_size == 0` or `overlap >= chunk_size`;
/// rejected before any splitting occurs.
pub fn split(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, EngineError> {
    if chunk_size == 0 {
        return Err(EngineError::Config("chunk_size must be > 0".to_string()));
    }
    if overlap >= chunk_size {
        return Err(EngineError::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let mut ranges = Vec::new();
    split_slice(text, 0, chunk_size, 0, &mut ranges);
    ranges.retain(|r| !text[r.clone()].trim().is_empty());

    let chunks = ranges
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let start = if i == 0 {
                r.start
            } else {
                back_up_chars(text, r.start, overlap)
            };
            let piece = &text[start..r.end];
            Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                text: piece.to_string(),
                start_offset: start,
                length: piece.len(),
            }
        })
        .collect();

    Ok(chunks)
}

/// Recursively split `text` (a slice beginning at absolute byte offset
/// `base`) into contiguous ranges of at most `budget` characters, pushing
/// absolute byte ranges into `out`.
fn split_slice(text: &str, base: usize, budget: usize, level: usize, out: &mut Vec<Range<usize>>) {
    if text.is_empty() {
        return;
    }
    if char_count(text) <= budget {
        out.push(base..base + text.len());
        return;
    }
    if level >= BOUNDARIES.len() {
        hard_cut(text, base, budget, out);
        return;
    }

    let cuts = cut_points(text, BOUNDARIES[level]);
    if cuts.is_empty() {
        split_slice(text, base, budget, level + 1, out);
        return;
    }

    // Fragments between consecutive cut points partition the slice.
    let mut fragments = Vec::with_capacity(cuts.len() + 1);
    let mut prev = 0;
    for cut in cuts {
        fragments.push(prev..cut);
        prev = cut;
    }
    fragments.push(prev..text.len());

    // Greedily merge adjacent fragments while the combined piece fits the
    // budget; oversized single fragments recurse one boundary down.
    let mut seg_start = 0usize;
    let mut seg_chars = 0usize;
    for frag in fragments {
        let frag_chars = char_count(&text[frag.clone()]);
        if seg_chars > 0 && seg_chars + frag_chars > budget {
            out.push(base + seg_start..base + frag.start);
            seg_start = frag.start;
            seg_chars = 0;
        }
        if frag_chars > budget {
            split_slice(
                &text[frag.clone()],
                base + frag.start,
                budget,
                level + 1,
                out,
            );
            seg_start = frag.end;
            seg_chars = 0;
        } else {
            seg_chars += frag_chars;
        }
    }
    if seg_chars > 0 {
        out.push(base + seg_start..base + text.len());
    }
}

/// Byte positions strictly inside `text` where a new piece may begin.
fn cut_points(text: &str, boundary: Boundary) -> Vec<usize> {
    let mut cuts = Vec::new();
    match boundary {
        Boundary::Paragraph => {
            for (pos, _) in text.match_indices("\n\n") {
                cuts.push(pos + 2);
            }
        }
        Boundary::Line => {
            for (pos, _) in text.match_indices('\n') {
                cuts.push(pos + 1);
            }
        }
        Boundary::Sentence => {
            let mut iter = text.char_indices().peekable();
            while let Some((i, c)) = iter.next() {
                if matches!(c, '.' | '!' | '?') {
                    if let Some(&(_, next)) = iter.peek() {
                        if next.is_whitespace() {
                            cuts.push(i + c.len_utf8());
                        }
                    }
                }
            }
        }
        Boundary::Word => {
            let mut prev_ws = false;
            for (i, c) in text.char_indices() {
                if prev_ws && !c.is_whitespace() {
                    cuts.push(i);
                }
                prev_ws = c.is_whitespace();
            }
        }
    }
    cuts.retain(|&c| c > 0 && c < text.len());
    cuts.dedup();
    cuts
}

/// No boundary fits: cut every `budget` characters.
fn hard_cut(text: &str, base: usize, budget: usize, out: &mut Vec<Range<usize>>) {
    let mut piece_start = 0;
    let mut taken = 0;
    for (i, _) in text.char_indices() {
        if taken == budget {
            out.push(base + piece_start..base + i);
            piece_start = i;
            taken = 0;
        }
        taken += 1;
    }
    if piece_start < text.len() {
        out.push(base + piece_start..base + text.len());
    }
}

/// Byte position `n` characters before `pos`, clamped to the text start.
fn back_up_chars(text: &str, pos: usize, n: usize) -> usize {
    let mut start = pos;
    for (i, _) in text[..pos].char_indices().rev().take(n) {
        start = i;
    }
    start
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}
