//! Line-window text chunker with trailing overlap.
//!
//! Splits a document into [`TextChunk`]s addressed by 1-based, inclusive
//! line ranges. Lines are accumulated into a window until the next line
//! would push the window past `max_chars`; the window is then flushed and
//! the next one is seeded with a trailing slice of roughly `overlap_chars`
//! characters so that context straddling a boundary is searchable from
//! either side.
//!
//! # Algorithm
//!
//! 1. Split on `\n`. Each line costs `chars + 1` (the separator).
//! 2. Before appending a line, if the window is non-empty and
//!    `window + cost > max_chars`, flush the window as a chunk.
//! 3. After a flush, walk backward over the flushed lines summing their
//!    cost until it reaches `overlap_chars`; those lines seed the next window.
//! 4. Flush whatever remains at end of input.
//!
//! A line is never split: a single line longer than `max_chars` becomes a
//! chunk on its own. An empty document produces no chunks.
//!
//! # Example
//!
//! ```rust
//! use memory_harness::chunk::chunk_document;
//! use memory_harness::config::ChunkingConfig;
//!
//! let chunks = chunk_document("# Title\nbody line", &ChunkingConfig::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 2));
//! ```

use crate::config::ChunkingConfig;
use crate::hash::fingerprint;

/// A chunk as produced by the chunker, before it gets an id and owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub start_line: i64,
    pub end_line: i64,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// `(1-based line number, line text)`
type Window<'a> = Vec<(usize, &'a str)>;

/// Split `text` into overlapping line windows.
pub fn chunk_document(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut window: Window<'_> = Vec::new();
    let mut window_chars = 0usize;

    for (i, line) in text.split('\n').enumerate() {
        let cost = line_cost(line);

        if window_chars + cost > config.max_chars && !window.is_empty() {
            chunks.push(make_chunk(&window));
            window = carry_overlap(&window, config.overlap_chars);
            window_chars = window.iter().map(|(_, l)| line_cost(l)).sum();
        }

        window.push((i + 1, line));
        window_chars += cost;
    }

    if !window.is_empty() {
        chunks.push(make_chunk(&window));
    }

    chunks
}

fn line_cost(line: &str) -> usize {
    line.chars().count() + 1
}

/// Trailing lines of a flushed window whose cost first reaches `overlap_chars`.
fn carry_overlap<'a>(window: &[(usize, &'a str)], overlap_chars: usize) -> Window<'a> {
    if overlap_chars == 0 {
        return Vec::new();
    }

    let mut acc = 0usize;
    let mut start = window.len();
    for (idx, (_, line)) in window.iter().enumerate().rev() {
        acc += line_cost(line);
        start = idx;
        if acc >= overlap_chars {
            break;
        }
    }

    window[start..].to_vec()
}

fn make_chunk(window: &[(usize, &str)]) -> TextChunk {
    let text = window
        .iter()
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n");
    let start_line = window.first().map(|(n, _)| *n).unwrap_or(1) as i64;
    let end_line = window.last().map(|(n, _)| *n).unwrap_or(1) as i64;
    let hash = fingerprint(&text);

    TextChunk {
        text,
        start_line,
        end_line,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
        }
    }

    /// 100 lines of exactly 39 chars (cost 40 each).
    fn uniform_doc() -> String {
        (1..=100)
            .map(|i| format!("line {:03} {}", i, "x".repeat(30)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_document("", &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_document("Hello\nworld", &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello\nworld");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[0].hash, fingerprint("Hello\nworld"));
    }

    #[test]
    fn test_window_boundaries_and_overlap() {
        let doc = uniform_doc();
        let chunks = chunk_document(&doc, &config(800, 160));

        // 20 lines fill 800 chars; 4 lines (160 chars) carry over.
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 20));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (17, 36));
        assert_eq!((chunks[2].start_line, chunks[2].end_line), (33, 52));
        assert_eq!(chunks.last().unwrap().end_line, 100);
    }

    #[test]
    fn test_zero_overlap_is_disjoint() {
        let doc = uniform_doc();
        let chunks = chunk_document(&doc, &config(800, 0));
        assert_eq!(chunks.len(), 5);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_line, pair[0].end_line + 1);
        }
    }

    #[test]
    fn test_coverage_and_whole_lines() {
        let doc = (0..137)
            .map(|i| "word ".repeat(i % 23 + 1))
            .collect::<Vec<_>>()
            .join("\n");
        let lines: Vec<&str> = doc.split('\n').collect();
        let chunks = chunk_document(&doc, &config(300, 60));

        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks.last().unwrap().end_line, lines.len() as i64);

        let mut covered_to = 0i64;
        for c in &chunks {
            // Every chunk introduces new lines and leaves no gap behind.
            assert!(c.start_line <= covered_to + 1, "gap before chunk {:?}", c);
            assert!(c.end_line > covered_to, "chunk adds nothing: {:?}", c);
            covered_to = c.end_line;

            // Chunk text is exactly its source lines, never a partial line.
            let expected =
                lines[(c.start_line - 1) as usize..c.end_line as usize].join("\n");
            assert_eq!(c.text, expected);
        }
    }

    #[test]
    fn test_oversized_line_is_not_split() {
        let big = "a".repeat(1000);
        let doc = format!("short\n{}\nshort2", big);
        let chunks = chunk_document(&doc, &ChunkingConfig::default());

        assert!(chunks.iter().any(|c| c.text.contains(&big)));
        for c in &chunks {
            for line in c.text.split('\n') {
                assert!(
                    line == "short" || line == "short2" || line == big,
                    "line was split: {} chars",
                    line.len()
                );
            }
        }
    }

    #[test]
    fn test_single_oversized_line_document() {
        let big = "b".repeat(2000);
        let chunks = chunk_document(&big, &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, big);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 1));
    }

    #[test]
    fn test_multibyte_counts_chars_not_bytes() {
        // 10 lines of 9 box-drawing chars: cost 10 chars each, 30 bytes each.
        let doc = vec!["─────────"; 10].join("\n");
        let chunks = chunk_document(&doc, &config(50, 0));
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 5));
    }

    #[test]
    fn test_deterministic() {
        let doc = uniform_doc();
        let c1 = chunk_document(&doc, &ChunkingConfig::default());
        let c2 = chunk_document(&doc, &ChunkingConfig::default());
        assert_eq!(c1, c2);
    }
}
