/// Default slice size in characters; sized so a chunk plus the instruction
/// stays well inside the backend's input budget.
pub const DEFAULT_CHUNK_SIZE: usize = 2500;

/// Split `text` into consecutive slices of `chunk_size` characters. Only the
/// last slice may be shorter. Empty input gives no chunks.
///
/// Sizes count `char`s, so multi-byte text is never split inside a code point.
/// A `chunk_size` of zero yields the whole text as a single chunk.
pub fn chunk(text: &str, chunk_size: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if chunk_size == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::with_capacity(text.len() / chunk_size + 1);
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == chunk_size {
            chunks.push(text[start..offset].to_string());
            start = offset;
            count = 0;
        }
        count += 1;
    }
    chunks.push(text[start..].to_string());
    chunks
}
