//! splits rendered message text into telegram sized pieces

/// Splits `text` into chunks of exactly `limit` code points; the final chunk
/// holds the remainder. Splitting on code points instead of bytes keeps
/// multi byte characters intact. An empty input yields no chunks.
pub fn split(text: &str, limit: usize) -> Vec<String> {
    // settings validation rejects a zero limit before we get here
    debug_assert!(limit > 0);

    let total = text.chars().count();
    let mut chunks = Vec::new();
    let mut current = String::new();

    for (i, c) in text.chars().enumerate() {
        current.push(c);
        if (i + 1) % limit == 0 {
            chunks.push(std::mem::take(&mut current));
        } else if i + 1 == total {
            chunks.push(std::mem::take(&mut current));
        }
    }

    chunks
}
