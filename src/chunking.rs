//! Chunk Planner
//!
//! Splits extracted text into fixed windows of at most `max_chunk_chars`
//! characters. Windows are cut on character boundaries only, so a chunk may
//! end mid-word. Windows that are empty after trimming are skipped and do
//! not consume an index.

use serde::Serialize;

/// A contiguous slice of the extracted text, the unit of synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in synthesis order, starting at 0 with no gaps
    pub index: usize,
    /// Character offset of the window in the source text
    pub char_offset: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split `text` into windows of `max_chunk_chars` characters
///
/// A `max_chunk_chars` of 0 is treated as 1.
pub fn plan(text: &str, max_chunk_chars: usize) -> Vec<Chunk> {
    let window = max_chunk_chars.max(1);
    let mut chunks = Vec::with_capacity(text.len() / window + 1);

    let mut start = 0;
    let mut char_offset = 0;
    let mut chars_in_window = 0;

    for (byte_idx, _) in text.char_indices() {
        if chars_in_window == window {
            push_window(&mut chunks, &text[start..byte_idx], char_offset);
            start = byte_idx;
            char_offset += window;
            chars_in_window = 0;
        }
        chars_in_window += 1;
    }
    if chars_in_window > 0 {
        push_window(&mut chunks, &text[start..], char_offset);
    }

    chunks
}

fn push_window(chunks: &mut Vec<Chunk>, slice: &str, char_offset: usize) {
    if slice.trim().is_empty() {
        return;
    }
    chunks.push(Chunk {
        index: chunks.len(),
        char_offset,
        text: slice.to_string(),
    });
}

/// Keep at most `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
