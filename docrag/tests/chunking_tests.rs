//! Property tests for fixed-size chunking.

use docrag::{FixedSizeChunker, chunk_text};
use proptest::prelude::*;

/// Chunk sizes with a strictly smaller overlap.
fn arb_window() -> impl Strategy<Value = (usize, usize)> {
    (1usize..64).prop_flat_map(|size| (Just(size), 0..size))
}

mod prop_fixed_size_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The first `step` characters of each chunk, in order, rebuild a
        /// prefix of the text, and the last chunk ends at the end of the text.
        #[test]
        fn strides_rebuild_a_prefix_and_last_chunk_reaches_end(
            text in "\\PC{0,300}",
            (size, overlap) in arb_window(),
        ) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&text);
            let chars: Vec<char> = text.chars().collect();

            if chars.is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            let step = chunker.step();
            let stitched: String =
                chunks.iter().flat_map(|c| c.chars().take(step)).collect();
            prop_assert!(text.starts_with(&stitched));

            for (i, chunk) in chunks.iter().enumerate() {
                let start = i * step;
                let expected: String = chars[start..(start + size).min(chars.len())].iter().collect();
                prop_assert_eq!(chunk, &expected);
            }

            let last_start = (chunks.len() - 1) * step;
            let last_end = last_start + chunks[chunks.len() - 1].chars().count();
            prop_assert_eq!(last_end, chars.len());
        }

        #[test]
        fn chunking_is_deterministic(
            text in "[a-z ]{0,500}",
            (size, overlap) in arb_window(),
        ) {
            let first = chunk_text(&text, size, overlap).unwrap();
            let second = chunk_text(&text, size, overlap).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn sequence_indices_are_dense_and_ordered(
            text in "[a-z]{1,200}",
            (size, overlap) in arb_window(),
        ) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&text, "doc-1");
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.sequence_index, i);
                prop_assert_eq!(chunk.source_id.as_str(), "doc-1");
            }
        }
    }
}

#[test]
fn empty_text_yields_no_chunks() {
    assert!(chunk_text("", 1000, 150).unwrap().is_empty());
}

#[test]
fn overlap_not_below_size_is_rejected() {
    assert!(chunk_text("abc", 5, 5).is_err());
    assert!(chunk_text("abc", 5, 9).is_err());
}
