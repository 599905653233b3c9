// Character-budgeted text chunker with word overlap

use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_CHARS: usize = 1000;
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// Splits extracted document text into ordered, overlapping chunks.
///
/// Sizes are counted in characters, not tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunker {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_CHARS, DEFAULT_OVERLAP_CHARS)
    }
}

impl TextChunker {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            overlap_chars: overlap_chars.min(max_chars - 1),
        }
    }

    /// Chunk contents in document order; blank text yields no chunks
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut chunks = Vec::new();

        let mut start = 0;
        while start < words.len() {
            let first_len = words[start].chars().count();
            if first_len > self.max_chars {
                // A single word that cannot fit is cut into fixed windows
                chunks.extend(split_long_word(words[start], self.max_chars));
                start += 1;
                continue;
            }

            let mut end = start + 1;
            let mut len = first_len;
            while end < words.len() {
                let added = words[end].chars().count() + 1;
                if len + added > self.max_chars {
                    break;
                }
                len += added;
                end += 1;
            }

            chunks.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }

            // Step back over trailing words that fit the overlap budget, always advancing
            let mut next = end;
            let mut overlap = 0;
            while next > start + 1 {
                let added = words[next - 1].chars().count() + 1;
                if overlap + added > self.overlap_chars {
                    break;
                }
                overlap += added;
                next -= 1;
            }

            // An overlap that leaves no room for the next word would repeat the same window
            let next_word = words[end].chars().count() + 1;
            if next < end && overlap - 1 + next_word > self.max_chars {
                next = end;
            }
            start = next;
        }

        tracing::debug!(
            "Chunked {} words into {} chunks (max {} chars, overlap {})",
            words.len(),
            chunks.len(),
            self.max_chars,
            self.overlap_chars
        );
        chunks
    }
}

fn split_long_word(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}
