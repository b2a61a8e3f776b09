#[cfg(test)]
mod tests;

use tracing::debug;
use url::Url;

use crate::retrieval::quality;

/// A bounded span of source text with structural metadata, the retrievable
/// unit of the corpus. Created once at ingestion and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub chapter: String,
    pub section: String,
    /// Ordered heading path, depth at most 3.
    pub heading_hierarchy: Vec<String>,
    pub source_url: String,
    pub quality_score: f32,
}

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Size threshold in characters that triggers a chunk boundary
    pub max_chunk_chars: usize,
    /// Number of trailing lines carried over into the next chunk
    pub overlap_lines: usize,
}

impl Default for ChunkerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_chars: 800,
            overlap_lines: 2,
        }
    }
}

const MAX_HEADING_DEPTH: usize = 3;
const CONTINUATION_MARKER: &str = "(continued)";

/// Split cleaned page text into metadata-tagged chunks.
///
/// The text is consumed line by line. Markdown heading markers of level 1-3
/// update the chapter/section/heading hierarchy for all subsequent chunks
/// and force a chunk boundary; otherwise lines accumulate until the size
/// threshold is reached. A post-pass prefixes every chunk except the first
/// with the tail of its predecessor so context survives chunk boundaries.
#[inline]
pub fn chunk_text(text: &str, source_url: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let mut state = HeadingState::from_url(source_url);
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_chars = 0;

    for line in text.lines() {
        if let Some((level, heading)) = parse_heading(line) {
            flush(&mut chunks, &mut buffer, &state, source_url);
            buffer_chars = 0;
            state.apply_heading(level, heading);
            continue;
        }

        buffer.push(line);
        buffer_chars += line.chars().count() + 1;

        if buffer_chars >= config.max_chunk_chars {
            flush(&mut chunks, &mut buffer, &state, source_url);
            buffer_chars = 0;
        }
    }

    flush(&mut chunks, &mut buffer, &state, source_url);

    apply_overlap(&mut chunks, config.overlap_lines);

    for chunk in &mut chunks {
        chunk.quality_score = quality::adjust_score(1.0, &chunk.content);
    }

    debug!(
        "Chunked {} characters from {} into {} chunks",
        text.chars().count(),
        source_url,
        chunks.len()
    );

    chunks
}

/// Current heading context, copied into each emitted chunk.
struct HeadingState {
    chapter: String,
    section: String,
    hierarchy: Vec<String>,
}

impl HeadingState {
    /// Seed the chapter from the last meaningful URL path segment so pages
    /// without headings still carry a usable chapter label.
    fn from_url(source_url: &str) -> Self {
        let chapter = Url::parse(source_url)
            .ok()
            .and_then(|url| {
                url.path_segments().and_then(|segments| {
                    segments
                        .filter(|s| !s.is_empty())
                        .next_back()
                        .map(str::to_string)
                })
            })
            .unwrap_or_else(|| "home".to_string());

        Self {
            chapter,
            section: String::new(),
            hierarchy: Vec::new(),
        }
    }

    fn apply_heading(&mut self, level: usize, heading: &str) {
        let heading = heading.trim().to_string();
        match level {
            1 => {
                self.chapter = heading.clone();
                self.section.clear();
            }
            2 => self.section = heading.clone(),
            _ => {}
        }

        self.hierarchy.truncate(level - 1);
        self.hierarchy.push(heading);
        debug_assert!(self.hierarchy.len() <= MAX_HEADING_DEPTH);
    }
}

/// Parse a markdown heading marker of level 1-3. Deeper headings do not
/// affect the metadata and are treated as body text.
fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > MAX_HEADING_DEPTH {
        return None;
    }

    let rest = trimmed.trim_start_matches('#');
    let heading = rest.strip_prefix(' ')?.trim();
    if heading.is_empty() {
        return None;
    }

    Some((level, heading))
}

fn flush(chunks: &mut Vec<Chunk>, buffer: &mut Vec<&str>, state: &HeadingState, source_url: &str) {
    let content = buffer.join("\n").trim().to_string();
    buffer.clear();

    // Chunk content is never empty
    if content.is_empty() {
        return;
    }

    chunks.push(Chunk {
        content,
        chapter: state.chapter.clone(),
        section: state.section.clone(),
        heading_hierarchy: state.hierarchy.clone(),
        source_url: source_url.to_string(),
        quality_score: 0.0,
    });
}

/// Prefix each chunk after the first with the last `overlap_lines` lines of
/// its predecessor plus a continuation marker. Overlap is taken from the
/// original contents so it never compounds across chunks.
fn apply_overlap(chunks: &mut [Chunk], overlap_lines: usize) {
    if overlap_lines == 0 || chunks.len() < 2 {
        return;
    }

    let originals: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();

    for i in 1..chunks.len() {
        let prev_lines: Vec<&str> = originals[i - 1].lines().collect();
        let tail_start = prev_lines.len().saturating_sub(overlap_lines);
        let tail = prev_lines[tail_start..].join("\n");

        if !tail.trim().is_empty() {
            chunks[i].content = format!("{tail}\n{CONTINUATION_MARKER}\n{}", originals[i]);
        }
    }
}
