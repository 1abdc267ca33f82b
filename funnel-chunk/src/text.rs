//! Delimiter-aware chunking for corpus documents.
//!
//! Documents assembled from multiple sources carry literal marker lines of
//! the form `--- FILE: <name> ---`. [`Chunker`] splits such a document into
//! segments keyed by marker name: text before the first marker is keyed
//! `preamble`, and a document with no markers at all is a single `main`
//! segment. Each segment is then split into size-bounded chunks without
//! ever breaking a line in half.
//!
//! Every chunk carries a key suffix (`::<segment>` for a segment that fits
//! in one chunk, `::<segment>[<i>]` for a segment that had to be split)
//! that callers append to the document path to form a stable chunk key.
//!
//! [`Chunker::sanitize`] is the companion normalization applied to chunk
//! text before it is hashed or embedded: Markdown image references are
//! stripped and whitespace runs collapse to single spaces. Sanitization
//! runs on chunk text after splitting, so it never moves a chunk boundary.
//!
//! ```
//! use funnel_chunk::Chunker;
//!
//! let chunker = Chunker::default();
//! let doc = "intro\n--- FILE: notes.md ---\nbody line";
//! let chunks = chunker.chunk(doc);
//!
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].suffix, "::preamble");
//! assert_eq!(chunks[0].text, "intro");
//! assert_eq!(chunks[1].suffix, "::notes.md");
//! assert_eq!(chunks[1].text, "body line");
//! ```

use regex::Regex;
use serde::Serialize;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_LIMIT: usize = 8000;

/// A single chunk of a source document.
///
/// `text` preserves the segment's lines exactly as they appeared; `suffix`
/// identifies the chunk within its document (`::main`, `::preamble`,
/// `::<marker-name>`, or the indexed forms of those when a segment was
/// split).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// The chunk text, line boundaries intact.
    pub text: String,
    /// Key suffix for this chunk, e.g. `::main` or `::section.md[2]`.
    pub suffix: String,
}

/// Splits document text into keyed, size-bounded chunks.
///
/// The splitting rules, in order:
///
/// 1. If any line of the document is a marker (`--- FILE: <name> ---`),
///    the document is segmented at the markers. Segment text is trimmed
///    and empty segments are dropped. Without markers the whole document
///    is one untrimmed `main` segment.
/// 2. A segment no longer than the limit becomes a single chunk. A longer
///    segment is split at line boundaries: lines accumulate until adding
///    the next one would exceed the limit. A single line longer than the
///    limit becomes one oversized chunk rather than being cut mid-line.
pub struct Chunker {
    marker: Regex,
    image_ref: Regex,
    whitespace: Regex,
    max_chunk_length: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_LIMIT)
    }
}

impl Chunker {
    /// Creates a chunker with the given maximum chunk length in characters.
    pub fn new(max_chunk_length: usize) -> Self {
        Chunker {
            marker: Regex::new(r"^--- FILE: (.+?) ---$").unwrap(),
            image_ref: Regex::new(r"!\[.*?\]\(.*?\)").unwrap(),
            whitespace: Regex::new(r"\s+").unwrap(),
            max_chunk_length,
        }
    }

    /// The configured maximum chunk length.
    pub fn max_chunk_length(&self) -> usize {
        self.max_chunk_length
    }

    /// Splits `raw_text` into chunks with key suffixes.
    ///
    /// Concatenating the chunk texts of one segment with `\n` reproduces
    /// that segment's line sequence exactly. The chunk texts are NOT
    /// sanitized; callers apply [`Chunker::sanitize`] afterwards.
    pub fn chunk(&self, raw_text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (key, text) in self.split_segments(raw_text) {
            self.split_segment(&text, &key, &mut chunks);
        }
        chunks
    }

    /// Normalizes chunk text for hashing and embedding.
    ///
    /// Strips Markdown image references (`![alt](src)`) and collapses all
    /// whitespace runs to single spaces. Returns an empty string for
    /// content that was nothing but images and whitespace; such chunks are
    /// never indexed.
    pub fn sanitize(&self, text: &str) -> String {
        let without_images = self.image_ref.replace_all(text, "");
        self.whitespace
            .replace_all(&without_images, " ")
            .trim()
            .to_string()
    }

    // Splits the document at marker lines. Returns (segment key, segment
    // text) pairs in document order.
    fn split_segments(&self, raw_text: &str) -> Vec<(String, String)> {
        if !raw_text.lines().any(|line| self.marker.is_match(line)) {
            return vec![("main".to_string(), raw_text.to_string())];
        }

        let mut segments = Vec::new();
        let mut current_key = "preamble".to_string();
        let mut current_lines: Vec<&str> = Vec::new();

        let mut flush = |key: &str, lines: &mut Vec<&str>, out: &mut Vec<(String, String)>| {
            let text = lines.join("\n");
            let text = text.trim();
            if !text.is_empty() {
                out.push((key.to_string(), text.to_string()));
            }
            lines.clear();
        };

        for line in raw_text.lines() {
            if let Some(caps) = self.marker.captures(line) {
                flush(&current_key, &mut current_lines, &mut segments);
                current_key = caps[1].to_string();
            } else {
                current_lines.push(line);
            }
        }
        flush(&current_key, &mut current_lines, &mut segments);

        segments
    }

    // Splits one segment into size-bounded chunks, respecting lines.
    // Lengths are counted in characters, not bytes.
    fn split_segment(&self, text: &str, key: &str, out: &mut Vec<Chunk>) {
        if text.chars().count() <= self.max_chunk_length {
            out.push(Chunk {
                text: text.to_string(),
                suffix: format!("::{key}"),
            });
            return;
        }

        let mut pieces: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for line in text.lines() {
            // +1 for the newline that rejoins this line to the previous one
            let cost = line.chars().count() + 1;
            if current_len + cost > self.max_chunk_length && !current.is_empty() {
                pieces.push(current.join("\n"));
                current.clear();
                current_len = 0;
            }
            current.push(line);
            current_len += cost;
        }
        if !current.is_empty() {
            pieces.push(current.join("\n"));
        }

        out.extend(pieces.into_iter().enumerate().map(|(idx, text)| Chunk {
            text,
            suffix: format!("::{key}[{idx}]"),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker_single_main_chunk() {
        let chunker = Chunker::default();
        let text = "just a short document\nwith two lines\n";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].suffix, "::main");
        // The main segment is untrimmed: the text passes through verbatim.
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_marker_segments_and_preamble() {
        let chunker = Chunker::default();
        let text = "preamble text\n\
                    --- FILE: alpha.txt ---\n\
                    alpha body\n\
                    second alpha line\n\
                    --- FILE: beta.md ---\n\
                    beta body\n";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].suffix, "::preamble");
        assert_eq!(chunks[0].text, "preamble text");
        assert_eq!(chunks[1].suffix, "::alpha.txt");
        assert_eq!(chunks[1].text, "alpha body\nsecond alpha line");
        assert_eq!(chunks[2].suffix, "::beta.md");
        assert_eq!(chunks[2].text, "beta body");
        // Marker lines themselves never appear in chunk text.
        assert!(chunks.iter().all(|c| !c.text.contains("--- FILE:")));
    }

    #[test]
    fn test_document_starting_with_marker_has_no_preamble() {
        let chunker = Chunker::default();
        let text = "--- FILE: only.txt ---\ncontent";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].suffix, "::only.txt");
    }

    #[test]
    fn test_consecutive_markers_drop_empty_segment() {
        let chunker = Chunker::default();
        let text = "--- FILE: empty.txt ---\n\
                    --- FILE: full.txt ---\n\
                    something\n";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].suffix, "::full.txt");
        assert_eq!(chunks[0].text, "something");
    }

    #[test]
    fn test_long_segment_splits_at_line_boundaries() {
        let chunker = Chunker::new(40);
        let lines: Vec<String> = (0..12).map(|i| format!("line number {i}")).collect();
        let text = lines.join("\n");
        assert!(text.len() > 40);

        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for (idx, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.suffix, format!("::main[{idx}]"));
            assert!(
                chunk.text.chars().count() <= 40,
                "chunk too long: {:?}",
                chunk.text
            );
        }
        // Rejoining the chunks reproduces the segment's line sequence.
        let rejoined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        // 8 characters but 16 bytes: stays a single unsplit chunk.
        let chunker = Chunker::new(10);
        let text = "é".repeat(8);
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].suffix, "::main");
    }

    #[test]
    fn test_oversized_single_line_stays_whole() {
        let chunker = Chunker::new(10);
        let long_line = "x".repeat(50);
        let text = format!("{long_line}\nshort");
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, long_line);
        assert_eq!(chunks[0].suffix, "::main[0]");
        assert_eq!(chunks[1].text, "short");
    }

    #[test]
    fn test_split_segments_inside_marker_document() {
        let chunker = Chunker::new(40);
        let body: Vec<String> = (0..8).map(|i| format!("body line {i}")).collect();
        let text = format!("--- FILE: big.txt ---\n{}", body.join("\n"));
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        assert!(chunks[0].suffix.starts_with("::big.txt["));
        let rejoined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rejoined, body.join("\n"));
    }

    #[test]
    fn test_sanitize_strips_images_and_collapses_whitespace() {
        let chunker = Chunker::default();
        let text = "See ![diagram](img/arch.png) here.\n\n  Lots\tof   space.";
        assert_eq!(chunker.sanitize(text), "See here. Lots of space.");
    }

    #[test]
    fn test_sanitize_image_only_content_is_empty() {
        let chunker = Chunker::default();
        assert_eq!(chunker.sanitize("![a](b.png)  ![c](d.jpg)\n"), "");
        assert_eq!(chunker.sanitize("   \n\t "), "");
    }

    #[test]
    fn test_sanitize_does_not_affect_chunking() {
        // An image-heavy line still counts at full length for boundaries.
        let chunker = Chunker::new(30);
        let text = "![x](a.png) ![y](b.png) tail\nnext line here";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks[0].text, "![x](a.png) ![y](b.png) tail");
    }

    #[test]
    fn test_empty_document_yields_single_empty_main() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk("");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].suffix, "::main");
        assert!(chunks[0].text.is_empty());
    }
}
