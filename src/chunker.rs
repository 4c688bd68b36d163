//! Splits utterances into bounded-size chunks for the mirror topic.
//!
//! Sizes are counted in characters (Unicode scalar values), so a chunk never
//! ends in the middle of a multi-byte code point.

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split `text` into an ordered sequence of chunks of at most `max_size`
/// characters.
///
/// Text that already fits is returned as a single, untouched chunk. Longer
/// text is packed greedily word by word, words joined by single spaces. A
/// word longer than `max_size` is cut at `max_size` characters; each full
/// piece becomes its own chunk and the remainder starts the next running
/// chunk.
///
/// Empty input produces no chunks. A `max_size` of zero is treated as one.
pub fn chunk(text: &str, max_size: usize) -> Vec<String> {
    let max_size = max_size.max(1);

    if text.is_empty() {
        return Vec::new();
    }
    if char_len(text) <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = char_len(word);

        if current_len == 0 && word_len <= max_size {
            current.push_str(word);
            current_len = word_len;
            continue;
        }
        if current_len > 0 && current_len + 1 + word_len <= max_size {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
            continue;
        }

        if current_len > 0 {
            chunks.push(std::mem::take(&mut current));
        }

        let mut rest = word;
        let mut rest_len = word_len;
        while rest_len > max_size {
            let (head, tail) = split_at_char(rest, max_size);
            chunks.push(head.to_string());
            rest = tail;
            rest_len -= max_size;
        }
        current.push_str(rest);
        current_len = rest_len;
    }

    if current_len > 0 {
        chunks.push(current);
    }

    chunks
}

/// Split `s` after its first `n` characters.
fn split_at_char(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, ""),
    }
}
