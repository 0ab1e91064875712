//! Fixed-window character chunking with overlap, used during document
//! ingestion before embedding.

use crate::error::ApiError;

/// Collapses whitespace runs to single spaces and trims both ends.
///
/// Applied once before windowing so chunk offsets are stable regardless of
/// the source formatting (PDF extraction in particular is newline-happy).
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            in_run = true;
        } else {
            if in_run && !out.is_empty() {
                out.push(' ');
            }
            in_run = false;
            out.push(ch);
        }
    }
    out
}

/// Splits `text` into overlapping windows of up to `size` characters.
///
/// Chunk `i` starts at character offset `i * (size - overlap)` of the
/// normalized text. Offsets are character offsets, never byte offsets, so
/// multi-byte input cannot split a code point. The empty string yields an
/// empty vector; `overlap >= size` is a caller error and fails fast instead
/// of looping.
pub fn chunk_by_chars(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ApiError> {
    if size == 0 || overlap >= size {
        return Err(ApiError::Validation(format!(
            "invalid chunking parameters: size {size}, overlap {overlap}"
        )));
    }

    let clean: Vec<char> = normalize_whitespace(text).chars().collect();
    if clean.is_empty() {
        return Ok(Vec::new());
    }

    let step = size - overlap;
    let mut chunks = Vec::with_capacity(clean.len().div_ceil(step));
    let mut start = 0;
    while start < clean.len() {
        let end = (start + size).min(clean.len());
        chunks.push(clean[start..end].iter().collect());
        start += step;
    }
    Ok(chunks)
}
