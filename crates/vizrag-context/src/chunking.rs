//! Paragraph chunking with token limits.

use core::mem::take;

/// Default token budget for one chunk.
pub const DEFAULT_MAX_TOKENS: usize = 512;
/// Default number of words repeated between consecutive windows of a split paragraph.
pub const DEFAULT_OVERLAP_WORDS: usize = 40;

/// Estimate tokens from text (rough: ~4 chars per token)
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.len();
    let words = text.split_whitespace().count();
    // Average of character-based and word-based estimates
    let char_estimate = chars / 4;
    let word_estimate = (words * 10) / 13;
    usize::midpoint(char_estimate, word_estimate)
}

/// Chunk size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Upper bound on estimated tokens per chunk.
    pub max_tokens: usize,
    /// Words shared by adjacent windows when a paragraph has to be split.
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            overlap_words: DEFAULT_OVERLAP_WORDS,
        }
    }
}

/// Split text into paragraphs, then pack paragraphs into chunks of at most
/// `max_tokens`. Oversized paragraphs become overlapping word windows.
///
/// The output is a pure function of `content` and `config`.
#[must_use]
pub fn chunk_text(content: &str, config: &ChunkingConfig) -> Vec<String> {
    let max_tokens = config.max_tokens.max(1);
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_tokens = 0;

    for paragraph in paragraphs(content) {
        let tokens = estimate_tokens(&paragraph);

        if tokens > max_tokens {
            flush(&mut buffer, &mut buffer_tokens, &mut chunks);
            chunks.extend(split_with_overlap(&paragraph, max_tokens, config.overlap_words));
            continue;
        }

        if !buffer.is_empty() && buffer_tokens + tokens > max_tokens {
            flush(&mut buffer, &mut buffer_tokens, &mut chunks);
        }

        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str(&paragraph);
        buffer_tokens += tokens;
    }

    flush(&mut buffer, &mut buffer_tokens, &mut chunks);
    chunks
}

/// Normalise line endings and page breaks, then group non-blank lines.
fn paragraphs(content: &str) -> Vec<String> {
    let normalized = content.replace("\r\n", "\n").replace(['\r', '\u{c}'], "\n");
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in normalized.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(take(&mut current).join("\n"));
            }
        } else {
            current.push(trimmed);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

fn flush(buffer: &mut String, buffer_tokens: &mut usize, chunks: &mut Vec<String>) {
    if !buffer.trim().is_empty() {
        chunks.push(take(buffer));
    }
    buffer.clear();
    *buffer_tokens = 0;
}

/// Word windows sized so each window stays under `max_tokens`.
fn split_with_overlap(paragraph: &str, max_tokens: usize, overlap_words: usize) -> Vec<String> {
    let words: Vec<&str> = paragraph.split_whitespace().collect();
    let window = (max_tokens * 3 / 4).max(1);
    let overlap = overlap_words.min(window - 1);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + window).min(words.len());
        windows.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start = end - overlap;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert!(estimate_tokens("Pie charts show proportions of a whole.") > 0);
    }

    #[test]
    fn test_small_paragraphs_share_a_chunk() {
        let content = "Pie charts show proportions.\n\nLine charts show trends.\n";
        let chunks = chunk_text(content, &ChunkingConfig::default());
        assert_eq!(chunks, vec!["Pie charts show proportions.\n\nLine charts show trends.".to_owned()]);
    }

    #[test]
    fn test_paragraphs_split_at_budget() {
        let config = ChunkingConfig {
            max_tokens: 8,
            overlap_words: 0,
        };
        let content = "alpha bravo charlie delta echo\n\nfoxtrot golf hotel india juliet\n";
        let chunks = chunk_text(content, &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "alpha bravo charlie delta echo");
        assert_eq!(chunks[1], "foxtrot golf hotel india juliet");
    }

    #[test]
    fn test_oversized_paragraph_windows_overlap() {
        let config = ChunkingConfig {
            max_tokens: 8,
            overlap_words: 2,
        };
        let paragraph: Vec<String> = (0..20).map(|idx| format!("word{idx}")).collect();
        let chunks = chunk_text(&paragraph.join(" "), &config);

        // window = 6 words, step = 4
        assert_eq!(chunks[0], "word0 word1 word2 word3 word4 word5");
        assert!(chunks[1].starts_with("word4 word5"));
        assert!(chunks.last().is_some_and(|last| last.ends_with("word19")));
    }

    #[test]
    fn test_blank_input_yields_nothing() {
        assert!(chunk_text("  \n\n\t\n\u{c}", &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let content = "Dashboards need focus.\r\n\r\nUse color sparingly.\u{c}BANs draw attention.";
        let config = ChunkingConfig::default();
        assert_eq!(chunk_text(content, &config), chunk_text(content, &config));
    }
}
