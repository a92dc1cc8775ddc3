//! Sentence-level document chunking
//!
//! Splits a document into passages of roughly `chunk_size` characters.
//! Sentences are never broken: a sentence longer than the limit becomes
//! its own oversized chunk.

use serde::Serialize;

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 250;

/// Sentence boundary: a period followed by a space
const SENTENCE_DELIMITER: &str = ". ";

/// A passage of the source document, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in the chunk sequence (0-based)
    pub index: usize,
    /// Passage text, never empty
    pub text: String,
}

/// Split `text` into chunks of at most `chunk_size` characters.
///
/// Sentences are accumulated greedily. When adding the next sentence would
/// make the buffer reach or exceed `chunk_size`, the buffer is closed and
/// the sentence starts a new one. Lengths are counted in `char`s.
///
/// # Examples
///
/// ```
/// use voice_rag::knowledge::chunk;
///
/// let chunks = chunk("Cats are mammals. Dogs are mammals too. Fish live in water.", 30);
/// let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
/// assert_eq!(texts, ["Cats are mammals.", "Dogs are mammals too.", "Fish live in water."]);
/// ```
#[must_use]
pub fn chunk(text: &str, chunk_size: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();

        if buffer_len > 0 && buffer_len + sentence_len >= chunk_size {
            push_chunk(&mut chunks, &buffer);
            buffer.clear();
            buffer_len = 0;
        }

        if buffer_len > 0 {
            buffer.push(' ');
            buffer_len += 1;
        }
        buffer.push_str(&sentence);
        buffer_len += sentence_len;
    }

    push_chunk(&mut chunks, &buffer);
    chunks
}

/// Split text into trimmed, period-terminated sentences
fn split_sentences(text: &str) -> Vec<String> {
    text.replace(['\r', '\n'], " ")
        .split(SENTENCE_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.ends_with('.') {
                s.to_string()
            } else {
                format!("{s}.")
            }
        })
        .collect()
}

fn push_chunk(chunks: &mut Vec<Chunk>, buffer: &str) {
    let text = buffer.trim();
    if text.is_empty() {
        return;
    }
    chunks.push(Chunk {
        index: chunks.len(),
        text: text.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk("", 100).is_empty());
        assert!(chunk("   \n  ", 100).is_empty());
    }

    #[test]
    fn test_scenario_three_sentences() {
        let chunks = chunk(
            "Cats are mammals. Dogs are mammals too. Fish live in water.",
            30,
        );
        assert_eq!(
            texts(&chunks),
            ["Cats are mammals.", "Dogs are mammals too.", "Fish live in water."]
        );
    }

    #[test]
    fn test_sentences_accumulate_under_limit() {
        let chunks = chunk("One. Two. Three.", 100);
        assert_eq!(texts(&chunks), ["One. Two. Three."]);
    }

    #[test]
    fn test_indices_are_sequential() {
        let chunks = chunk("Alpha beta. Gamma delta. Epsilon zeta. Eta theta.", 15);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let long = "This single sentence is far longer than the configured limit";
        let chunks = chunk(&format!("Short. {long}. Tail."), 10);
        assert_eq!(texts(&chunks), ["Short.", format!("{long}.").as_str(), "Tail."]);
    }

    #[test]
    fn test_newlines_become_spaces() {
        let chunks = chunk("First line.\nSecond line. Third\nline.", 1000);
        assert_eq!(texts(&chunks), ["First line. Second line. Third line."]);
    }

    #[test]
    fn test_no_empty_chunks() {
        let chunks = chunk(". . .  . Real sentence. . ", 5);
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
        assert_eq!(texts(&chunks), ["Real sentence."]);
    }

    #[test]
    fn test_deterministic() {
        let doc = "A b c. D e f. G h i. J k l. M n o.";
        assert_eq!(chunk(doc, 12), chunk(doc, 12));
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        // 10 chars, 19 bytes per sentence
        let doc = "ééééééééé. ééééééééé.";
        assert_eq!(chunk(doc, 25).len(), 1);
        assert_eq!(chunk(doc, 20).len(), 2);
    }
}
