
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A span of extracted text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text, an exact substring of the source
    pub content: String,
    /// Position of this chunk in the sequence
    pub chunk_index: usize,
    /// Byte offset of the first character in the source text
    pub start: usize,
    /// Byte offset one past the last character in the source text
    pub end: usize,
    /// Estimated token count
    pub token_count: usize,
}

/// Configuration for text chunking, measured in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
        }
    }
}

/// Where a chunk may end, most preferred first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Sentence,
    Line,
    Word,
}

const BOUNDARY_PREFERENCE: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Sentence,
    Boundary::Line,
    Boundary::Word,
];

/// Split text into overlapping chunks no longer than `chunk_size` characters
///
/// Chunks end at the latest paragraph break, sentence end, line break or word
/// boundary inside the window, in that order of preference, and fall back to a
/// hard cut when the window has none. Each chunk after the first starts at most
/// `chunk_overlap` characters before its predecessor ends, snapped forward to
/// the start of a word.
#[inline]
#[expect(
    clippy::string_slice,
    reason = "offsets are taken from char_indices and always fall on char boundaries"
)]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let chunk_size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(chunk_size - 1);

    // Byte offset of every char, plus the end of the text
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = offsets.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        if total_chars - start <= chunk_size {
            chunks.push(make_chunk(text, offsets[start], text.len(), chunks.len()));
            break;
        }

        let window = &text[offsets[start]..offsets[start + chunk_size]];
        let split_chars = find_split(window, overlap).unwrap_or(chunk_size);
        let end = start + split_chars;

        chunks.push(make_chunk(text, offsets[start], offsets[end], chunks.len()));

        start = next_start(text, &offsets, end, overlap);
    }

    debug!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        total_chars,
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

fn make_chunk(text: &str, start: usize, end: usize, chunk_index: usize) -> TextChunk {
    let content = text.get(start..end).unwrap_or_default().to_string();
    let token_count = estimate_token_count(&content);
    TextChunk {
        content,
        chunk_index,
        start,
        end,
        token_count,
    }
}

/// Length in chars of the preferred chunk inside `window`
///
/// A boundary only counts if the chunk it produces is longer than the overlap,
/// otherwise the next chunk could not start past this one.
fn find_split(window: &str, overlap: usize) -> Option<usize> {
    BOUNDARY_PREFERENCE.iter().find_map(|boundary| {
        let split = last_boundary(window, *boundary)?;
        let chars = window.get(..split)?.chars().count();
        (chars > overlap).then_some(chars)
    })
}

/// Byte offset just past the last `boundary` in `window`
fn last_boundary(window: &str, boundary: Boundary) -> Option<usize> {
    match boundary {
        Boundary::Paragraph => window.rfind("\n\n").map(|pos| pos + 2),
        Boundary::Line => window.rfind('\n').map(|pos| pos + 1),
        Boundary::Sentence => {
            let mut previous: Option<char> = None;
            let mut found = None;
            for (offset, ch) in window.char_indices() {
                if ch.is_whitespace() && matches!(previous, Some('.' | '!' | '?')) {
                    found = Some(offset + ch.len_utf8());
                }
                previous = Some(ch);
            }
            found
        }
        Boundary::Word => window
            .char_indices()
            .rev()
            .find(|(_, ch)| ch.is_whitespace())
            .map(|(offset, ch)| offset + ch.len_utf8()),
    }
}

/// Char index where the chunk after one ending at `end` begins
fn next_start(text: &str, offsets: &[usize], end: usize, overlap: usize) -> usize {
    let mut start = end - overlap;
    while start < end && !is_word_start(text, offsets, start) {
        start += 1;
    }
    start
}

fn is_word_start(text: &str, offsets: &[usize], index: usize) -> bool {
    let current = text
        .get(offsets[index]..)
        .and_then(|rest| rest.chars().next());
    let previous = index
        .checked_sub(1)
        .and_then(|prev| text.get(offsets[prev]..))
        .and_then(|rest| rest.chars().next());

    match (previous, current) {
        (_, None) => false,
        (_, Some(ch)) if ch.is_whitespace() => false,
        (None, Some(_)) => true,
        (Some(prev), Some(_)) => prev.is_whitespace(),
    }
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
