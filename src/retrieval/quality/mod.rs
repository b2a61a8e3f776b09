//! Content quality heuristics shared between ingestion and retrieval.
//!
//! The same signals that score a chunk at ingestion time rescore raw
//! similarity hits at query time: very short content is penalized,
//! boilerplate that repeats within one chunk is penalized, and density of
//! domain keywords and generic technical terms is rewarded.


/// Navigation/marketing phrases that tend to repeat across the corpus and
/// carry no answer content.
pub const BOILERPLATE_PHRASES: &[&str] = &[
    "complete learning path",
    "comprehensive journey",
    "ros 2 fundamentals",
    "advanced humanoid robotics",
];

/// Domain-specific keywords whose presence marks a chunk as on-topic.
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "vision-language-action",
    "humanoid control",
    "robotics",
    "physical ai",
    "vla models",
    "embodied ai",
    "robot control",
    "machine learning",
    "deep learning",
    "neural networks",
    "computer vision",
    "natural language",
    "action planning",
    "humanoid robotics",
    "action models",
    "language models",
];

/// Generic technical vocabulary; weaker signal than [`DOMAIN_KEYWORDS`].
pub const TECHNICAL_TERMS: &[&str] = &[
    "algorithm",
    "function",
    "method",
    "process",
    "system",
    "model",
    "framework",
    "architecture",
    "protocol",
    "procedure",
    "technique",
    "approach",
    "theory",
    "principle",
    "concept",
    "definition",
    "equation",
    "formula",
    "implementation",
];

const SHORT_CONTENT_CHARS: usize = 50;
const SHORT_CONTENT_PENALTY: f32 = 0.7;
const BOILERPLATE_PENALTY: f32 = 0.5;
const KEYWORD_BOOST: f32 = 0.2;
const TERM_BOOST: f32 = 0.1;
const KEYWORD_FLOOR: f32 = 0.3;

/// Adjust a base similarity score by content quality signals.
///
/// The result is always clamped to `[0.0, 1.0]`. When at least one domain
/// keyword matches, the score is floored at 0.3 so relevant content survives
/// a weak raw similarity.
#[inline]
pub fn adjust_score(base: f32, content: &str) -> f32 {
    let content_lower = content.to_lowercase();
    let mut score = base;

    if content.trim().chars().count() < SHORT_CONTENT_CHARS {
        score *= SHORT_CONTENT_PENALTY;
    }

    if has_repeated_boilerplate(&content_lower) {
        score *= BOILERPLATE_PENALTY;
    }

    let keyword_matches = keyword_hits(&content_lower);
    if keyword_matches > 0 {
        score = (score * KEYWORD_BOOST.mul_add(keyword_matches as f32, 1.0)).min(1.0);
    }

    let term_matches = technical_term_hits(&content_lower);
    if term_matches > 0 {
        score = (score * TERM_BOOST.mul_add(term_matches as f32, 1.0)).min(1.0);
    }

    if keyword_matches > 0 && score < KEYWORD_FLOOR {
        score = KEYWORD_FLOOR;
    }

    score.clamp(0.0, 1.0)
}

/// Number of distinct domain keywords present in the (lowercased) content.
#[inline]
pub fn keyword_hits(content_lower: &str) -> usize {
    DOMAIN_KEYWORDS
        .iter()
        .filter(|kw| content_lower.contains(*kw))
        .count()
}

/// Number of distinct generic technical terms present in the content.
#[inline]
pub fn technical_term_hits(content_lower: &str) -> usize {
    TECHNICAL_TERMS
        .iter()
        .filter(|term| content_lower.contains(*term))
        .count()
}

/// True when any boilerplate phrase appears more than once within the
/// content, which marks the chunk as repetitive filler.
#[inline]
pub fn has_repeated_boilerplate(content_lower: &str) -> bool {
    BOILERPLATE_PHRASES
        .iter()
        .any(|phrase| count_occurrences(content_lower, phrase) > 1)
}

/// Fraction of tokens that are repeats of an earlier token, in `[0.0, 1.0]`.
#[inline]
pub fn repeated_token_ratio(content_lower: &str) -> f32 {
    let words: Vec<&str> = content_lower.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let unique: std::collections::HashSet<&str> = words.iter().copied().collect();
    1.0 - (unique.len() as f32 / words.len() as f32)
}

/// Dedup key for retrieved content: the first 100 characters, trimmed and
/// lowercased. Character-based so multibyte text cannot split a code point.
#[inline]
pub fn content_prefix_key(content: &str) -> String {
    content.trim().chars().take(100).collect::<String>().to_lowercase()
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.match_indices(needle).count()
}
