//! Splitting filing text into overlapping chunks for embedding.

use super::models::FilingChunk;

/// Split text into chunks of at most `chunk_size` characters, with
/// `chunk_overlap` characters carried over between consecutive chunks.
///
/// Splits fall on character boundaries; offsets recorded on each chunk are
/// byte offsets into the original text.
pub fn chunk_text(
    text: &str,
    year: u16,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<FilingChunk> {
    assert!(chunk_size > chunk_overlap, "overlap must be below chunk size");

    let mut chunks = Vec::new();
    if text.trim().is_empty() {
        return chunks;
    }

    // Byte offset of every char boundary, plus the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let step = chunk_size - chunk_overlap;
    let mut start_char = 0;
    let mut ordinal = 0;

    while start_char < char_count {
        let end_char = (start_char + chunk_size).min(char_count);
        let start = boundaries[start_char];
        let end = boundaries[end_char];

        let content = text[start..end].trim();
        if !content.is_empty() {
            chunks.push(FilingChunk::new(year, ordinal, content, start, end));
            ordinal += 1;
        }

        if end_char == char_count {
            break;
        }
        start_char += step;
    }

    chunks
}
