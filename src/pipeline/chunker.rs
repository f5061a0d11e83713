//! Text chunking under a size budget.
//!
//! Two modes:
//!
//! * [`word_bounded_chunks`] — stage 1. Words are accumulated until the next
//!   one would overflow the budget. No overlap.
//! * [`overlap_chunks`] — stages 2 and 3 on oversized inputs. Fixed character
//!   windows where each window after the first starts `overlap_percent`% of
//!   the window before the previous one ended.
//!
//! All sizes are counted in characters, never bytes, so slicing never lands
//! inside a multi-byte code point.

/// Conservative characters-per-token ratio used for budget estimates.
pub const CHARS_PER_TOKEN: f64 = 3.5;

/// A slice of the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position in the chunk sequence.
    pub index: usize,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    /// Whether this chunk shares leading text with its predecessor.
    pub overlap: bool,
    pub text: String,
}

/// Estimated token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 / CHARS_PER_TOKEN).ceil() as usize
}

/// Character budget equivalent to `tokens`.
pub fn token_budget_chars(tokens: usize) -> usize {
    (tokens as f64 * CHARS_PER_TOKEN) as usize
}

/// Whether `text` needs the chunked path for a limit of `token_limit` tokens.
pub fn exceeds_token_budget(text: &str, token_limit: usize) -> bool {
    estimate_tokens(text) > token_limit
}

/// Split `text` on whitespace and pack words into chunks of at most
/// `chunk_size` characters.
///
/// Every word costs its length plus one separator. A word that does not fit
/// flushes the current chunk and starts the next one; a single word longer
/// than the budget becomes a chunk of its own.
pub fn word_bounded_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count() + 1;
        if current_len + word_len > chunk_size && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
        current.push(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

/// Slice `text` into `window`-character windows overlapping by
/// `overlap_percent`% of the window.
///
/// The overlap is clamped so every window advances by at least one
/// character. The final window may be shorter than `window`. Empty input
/// yields no chunks.
pub fn overlap_chunks(text: &str, window: usize, overlap_percent: u8) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }
    let window = window.max(1);
    let overlap = (window * overlap_percent as usize / 100).min(window - 1);
    let step = window - overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + window).min(len);
        chunks.push(Chunk {
            index: chunks.len(),
            start,
            end,
            overlap: start > 0 && overlap > 0,
            text: chars[start..end].iter().collect(),
        });
        if end >= len {
            break;
        }
        start += step;
    }
    chunks
}
