//! Sentence-aligned text chunker
//!
//! Splits raw content into chunks of roughly `target_size` characters for
//! indexing. Splitting happens on sentence boundaries (`.`, `!`, `?`,
//! newline); sentences are packed greedily, counting the `". "` joiner,
//! and a single sentence longer than the target becomes its own chunk
//! rather than being cut mid-sentence. Pure function, deterministic.

/// Split `content` into sentence-aligned chunks of at most `target_size`
/// characters each (oversized single sentences excepted).
pub fn chunk_text(content: &str, target_size: usize) -> Vec<String> {
    let sentences: Vec<&str> = content
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        if current.is_empty() {
            current.push_str(sentence);
            continue;
        }

        if current.len() + 2 + sentence.len() <= target_size {
            current.push_str(". ");
            current.push_str(sentence);
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_CHUNK_SIZE;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("Hello world. Second sentence.", DEFAULT_CHUNK_SIZE);
        assert_eq!(chunks, vec!["Hello world. Second sentence"]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(chunk_text("", DEFAULT_CHUNK_SIZE).is_empty());
        assert!(chunk_text("  \n  \n", DEFAULT_CHUNK_SIZE).is_empty());
    }

    #[test]
    fn test_respects_target_size() {
        let text = (0..40)
            .map(|i| format!("Sentence number {i} talks about topic {i}."))
            .collect::<String>();
        let chunks = chunk_text(&text, 120);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.len() <= 120,
                "chunk of {} chars exceeds target",
                chunk.len()
            );
        }
    }

    #[test]
    fn test_oversized_sentence_stands_alone() {
        let long = "x".repeat(600);
        let text = format!("Short one. {long}. Short two.");
        let chunks = chunk_text(&text, 400);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "Short one");
        assert_eq!(chunks[1].len(), 600);
        assert_eq!(chunks[2], "Short two");
    }

    #[test]
    fn test_chunk_count_bound() {
        // No more than ceil(L/T) + 1 chunks for sentence-sized input.
        let text = (0..50)
            .map(|i| format!("This is sentence {i}."))
            .collect::<Vec<_>>()
            .join(" ");
        let target = 100;
        let chunks = chunk_text(&text, target);
        let bound = text.len().div_ceil(target) + 1;
        assert!(
            chunks.len() <= bound,
            "{} chunks exceeds bound {bound}",
            chunks.len()
        );
    }

    #[test]
    fn test_newlines_are_boundaries() {
        let chunks = chunk_text("line one\nline two\nline three", DEFAULT_CHUNK_SIZE);
        assert_eq!(chunks, vec!["line one. line two. line three"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta. Gamma delta! Epsilon? Zeta.";
        assert_eq!(chunk_text(text, 20), chunk_text(text, 20));
    }
}
