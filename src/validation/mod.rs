//! Grounding and citation checks.
//!
//! All checks here are advisory. A failing report is logged with the request
//! correlation id and attached to diagnostics; it never blocks or rewrites a
//! response.


use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generation::remove_duplicate_lines;
use crate::retrieval::RetrievedContext;

/// Fraction of checked sentences that must find lexical support.
const GROUNDING_RATIO_THRESHOLD: f32 = 0.6;

/// Sentences at or below this length are skipped as noise.
const MIN_SENTENCE_CHARS: usize = 10;

/// Maximum excerpt length carried in a citation.
const EXCERPT_CHARS: usize = 200;

/// Default confidence floor for citation quality checks.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

const MIN_COMPLETENESS: f32 = 0.8;
const MIN_QUALITY_FRACTION: f32 = 0.6;

/// Result of the lexical grounding check.
#[derive(Debug, Clone, Serialize)]
pub struct GroundingReport {
    pub supported_sentences: usize,
    pub checked_sentences: usize,
    pub grounding_ratio: f32,
    pub grounded: bool,
}

/// A source reference derived from one retrieved context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub source_url: String,
    pub chapter: String,
    pub section: String,
    pub heading: Option<String>,
    pub similarity_score: f32,
    pub text_excerpt: String,
    pub source_type: String,
    pub confidence_score: f32,
}

/// Structural citation check result.
#[derive(Debug, Clone, Serialize)]
pub struct CitationReport {
    pub valid: bool,
    pub citation_count: usize,
    pub context_count: usize,
    pub urls_match: bool,
    pub details: Vec<String>,
}

/// Aggregate citation quality metrics.
#[derive(Debug, Clone, Serialize)]
pub struct CitationQualityReport {
    pub valid: bool,
    pub total_citations: usize,
    pub citations_above_threshold: usize,
    pub average_confidence: f32,
    pub completeness_score: f32,
    pub quality_issues: Vec<String>,
}

/// Check how much of the answer finds lexical support in the contexts.
///
/// The answer is deduplicated, split on sentence boundaries, and each
/// sentence longer than the noise threshold counts as supported when it
/// appears verbatim in the concatenated context text or any of its first
/// five words does.
#[inline]
pub fn validate_grounding(answer: &str, contexts: &[RetrievedContext]) -> GroundingReport {
    let context_text = contexts
        .iter()
        .map(|ctx| ctx.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let deduplicated = remove_duplicate_lines(answer);

    let mut supported = 0;
    let mut checked = 0;

    for sentence in deduplicated.split(". ") {
        let sentence_clean = sentence.trim().to_lowercase();
        if sentence_clean.chars().count() <= MIN_SENTENCE_CHARS {
            continue;
        }
        checked += 1;

        let supported_by_span = context_text.contains(&sentence_clean);
        let supported_by_words = sentence_clean
            .split_whitespace()
            .take(5)
            .any(|word| context_text.contains(word));

        if supported_by_span || supported_by_words {
            supported += 1;
        }
    }

    let ratio = if checked > 0 {
        supported as f32 / checked as f32
    } else {
        0.0
    };

    let report = GroundingReport {
        supported_sentences: supported,
        checked_sentences: checked,
        grounding_ratio: ratio,
        grounded: checked > 0 && ratio >= GROUNDING_RATIO_THRESHOLD,
    };

    info!(
        "Answer grounding validation: {}/{} sentences supported ({})",
        report.supported_sentences, report.checked_sentences, report.grounded
    );
    report
}

/// Derive one citation per context, in context order.
#[inline]
pub fn extract_citations(contexts: &[RetrievedContext]) -> Vec<Citation> {
    contexts
        .iter()
        .map(|ctx| Citation {
            source_url: ctx.url.clone(),
            chapter: ctx.chapter.clone(),
            section: ctx.section.clone(),
            heading: ctx.heading_hierarchy.last().cloned(),
            similarity_score: ctx.similarity_score,
            text_excerpt: excerpt(&ctx.content),
            source_type: "textbook".to_string(),
            confidence_score: ctx.similarity_score,
        })
        .collect()
}

/// Structural check: every citation carries its source fields, and the
/// citation URL set overlaps the context URL set in one direction or the
/// other.
#[inline]
pub fn validate_citations(
    citations: &[Citation],
    contexts: &[RetrievedContext],
) -> CitationReport {
    let mut report = CitationReport {
        valid: true,
        citation_count: citations.len(),
        context_count: contexts.len(),
        urls_match: true,
        details: Vec::new(),
    };

    if citations.is_empty() {
        report.valid = false;
        report.details.push("No citations provided".to_string());
        return report;
    }

    for (i, citation) in citations.iter().enumerate() {
        let mut missing = Vec::new();
        if citation.source_url.is_empty() {
            missing.push("source_url");
        }
        if citation.chapter.is_empty() {
            missing.push("chapter");
        }
        if citation.section.is_empty() {
            missing.push("section");
        }
        if !missing.is_empty() {
            report.valid = false;
            report
                .details
                .push(format!("Citation {i} missing fields: {missing:?}"));
        }
    }

    if !contexts.is_empty() {
        let citation_urls: std::collections::HashSet<&str> =
            citations.iter().map(|c| c.source_url.as_str()).collect();
        let context_urls: std::collections::HashSet<&str> =
            contexts.iter().map(|c| c.url.as_str()).collect();

        report.urls_match = citation_urls.is_subset(&context_urls)
            || context_urls.is_subset(&citation_urls);
        if !report.urls_match {
            report.valid = false;
            report
                .details
                .push("Citation source URLs do not match context URLs".to_string());
        }
    }

    report
}

/// Quality gate: at least 80% of citations complete and at least 60% above
/// the confidence floor.
#[inline]
pub fn validate_citation_quality(
    citations: &[Citation],
    min_confidence: f32,
) -> CitationQualityReport {
    let mut report = CitationQualityReport {
        valid: false,
        total_citations: citations.len(),
        citations_above_threshold: 0,
        average_confidence: 0.0,
        completeness_score: 0.0,
        quality_issues: Vec::new(),
    };

    if citations.is_empty() {
        report.quality_issues.push("No citations provided".to_string());
        return report;
    }

    let mut total_confidence = 0.0_f32;
    let mut above_threshold = 0;
    let mut complete = 0;

    for citation in citations {
        if !citation.source_url.is_empty()
            && !citation.chapter.is_empty()
            && !citation.section.is_empty()
        {
            complete += 1;
        }

        let confidence = citation.confidence_score.max(citation.similarity_score);
        if confidence >= min_confidence {
            above_threshold += 1;
            total_confidence += confidence;
        } else {
            report.quality_issues.push(format!(
                "Citation from '{}' has low confidence: {confidence}",
                citation.chapter
            ));
        }
    }

    let count = citations.len() as f32;
    report.citations_above_threshold = above_threshold;
    report.average_confidence = total_confidence / count;
    report.completeness_score = complete as f32 / count;
    report.valid = report.completeness_score >= MIN_COMPLETENESS
        && (above_threshold as f32 / count) >= MIN_QUALITY_FRACTION;

    report
}

fn excerpt(content: &str) -> String {
    if content.chars().count() > EXCERPT_CHARS {
        let truncated: String = content.chars().take(EXCERPT_CHARS).collect();
        format!("{truncated}...")
    } else {
        content.to_string()
    }
}
