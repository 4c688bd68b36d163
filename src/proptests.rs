//! Property-based tests for the chunker.
//!
//! These tests verify the chunking invariants:
//!
//! - Text that fits is returned unchanged as one chunk
//! - No chunk is empty or longer than the limit
//! - Rejoining word-packed chunks reproduces the normalized text
//! - Oversized words are cut into full-size pieces without inserted spaces

use proptest::prelude::*;

use crate::chunker::{char_len, chunk};

fn normalized(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

proptest! {
    /// Non-empty text within the limit is a single, untouched chunk.
    #[test]
    fn short_text_is_identity(text in "\\PC{1,60}", extra in 0usize..40) {
        let max = char_len(&text) + extra;
        prop_assert_eq!(chunk(&text, max), vec![text.clone()]);
    }

    /// Every chunk is non-empty and within the limit.
    #[test]
    fn chunks_are_bounded(text in "[a-zA-Zñ ]{0,300}", max in 1usize..64) {
        for c in chunk(&text, max) {
            prop_assert!(!c.is_empty());
            prop_assert!(char_len(&c) <= max);
        }
    }

    /// With words that fit the limit, rejoining with single spaces gives the
    /// whitespace-normalized input.
    #[test]
    fn rejoin_reproduces_normalized_text(
        words in prop::collection::vec("[a-záéíóú]{1,10}", 1..80),
        separators in prop::collection::vec("[ \t\n]{1,3}", 80),
        max in 10usize..120,
    ) {
        let mut text = String::new();
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                text.push_str(&separators[i]);
            }
            text.push_str(word);
        }
        prop_assume!(char_len(&text) > max);

        let chunks = chunk(&text, max);
        prop_assert_eq!(chunks.join(" "), normalized(&text));
    }

    /// A single oversized word becomes full-size pieces plus a remainder,
    /// whose concatenation is the word itself.
    #[test]
    fn oversized_word_is_hard_split(len in 2usize..900, max in 1usize..400) {
        prop_assume!(len > max);
        let word: String = "a".repeat(len);

        let chunks = chunk(&word, max);

        let (last, full) = chunks.split_last().expect("at least one chunk");
        for piece in full {
            prop_assert_eq!(char_len(piece), max);
        }
        prop_assert!(char_len(last) <= max);
        prop_assert!(chunks.iter().all(|c| !c.contains(' ')));
        prop_assert_eq!(chunks.concat(), word);
    }

    /// Chunking is deterministic.
    #[test]
    fn chunking_is_deterministic(text in "\\PC{0,200}", max in 1usize..50) {
        prop_assert_eq!(chunk(&text, max), chunk(&text, max));
    }
}
