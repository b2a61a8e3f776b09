//! Prompt assembly for the answer generator.
//!
//! Contexts pass a repetition filter, get formatted into a numbered block,
//! and are combined with optional conversation history, the question, and
//! instruction lines derived from the user's preferences.

#[cfg(test)]
mod tests;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::debug;

use crate::retrieval::quality;
use crate::retrieval::RetrievedContext;

/// Repeated-token ratio above which a context is dropped as filler.
const REPETITION_RATIO_LIMIT: f32 = 0.7;

/// How much detail the answer should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Basic,
    #[default]
    Intermediate,
    Advanced,
}

impl DetailLevel {
    #[inline]
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Basic => "Provide a simple, straightforward answer.",
            Self::Intermediate => "Provide a moderately detailed answer with key points.",
            Self::Advanced => "Provide a comprehensive, technical answer with details.",
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

/// Overall shape of the answer text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Concise,
    #[default]
    Detailed,
    Examples,
}

impl ResponseFormat {
    #[inline]
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Concise => "Keep the response brief and to the point.",
            Self::Detailed => "Provide a thorough explanation with examples where appropriate.",
            Self::Examples => "Include relevant examples from the context.",
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Concise => "concise",
            Self::Detailed => "detailed",
            Self::Examples => "examples",
        }
    }
}

/// Per-request answer shaping options. Unknown fields are rejected at the
/// HTTP boundary; missing fields fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Hash)]
#[serde(default)]
pub struct UserPreferences {
    pub detail_level: DetailLevel,
    pub response_format: ResponseFormat,
}

/// Drop contexts whose content repeats boilerplate phrases or whose token
/// stream is mostly repeats. Returns survivors in input order.
#[inline]
pub fn filter_repetitive_contexts(contexts: &[RetrievedContext]) -> Vec<RetrievedContext> {
    let filtered: Vec<RetrievedContext> = contexts
        .iter()
        .filter(|ctx| {
            let content_lower = ctx.content.to_lowercase();
            let repetitive = quality::has_repeated_boilerplate(&content_lower)
                || quality::repeated_token_ratio(&content_lower) > REPETITION_RATIO_LIMIT;
            if repetitive {
                debug!(
                    "Filtered out repetitive context: {}",
                    ctx.content.chars().take(100).collect::<String>()
                );
            }
            !repetitive
        })
        .cloned()
        .collect();

    debug!(
        "Filtered {} repetitive contexts out of {} total",
        contexts.len() - filtered.len(),
        contexts.len()
    );
    filtered
}

/// Render contexts as a numbered block. A dedup pass on the content prefix
/// key runs again here in case upstream selection let a near-duplicate
/// through.
#[inline]
pub fn format_context(contexts: &[RetrievedContext]) -> String {
    contexts
        .iter()
        .unique_by(|ctx| quality::content_prefix_key(&ctx.content))
        .enumerate()
        .map(|(i, ctx)| {
            format!(
                "Context {n}:\nChapter: {chapter}\nSection: {section}\nContent: {content}\nURL: {url}\nSimilarity Score: {score}\n---\n",
                n = i + 1,
                chapter = ctx.chapter,
                section = ctx.section,
                content = ctx.content,
                url = ctx.url,
                score = ctx.similarity_score,
            )
        })
        .join("\n")
}

/// Render the most recent turns as alternating Q/A lines.
#[inline]
pub fn format_history(history: &[(String, String)]) -> String {
    history
        .iter()
        .enumerate()
        .map(|(i, (question, response))| {
            format!("Q{n}: {question}\nA{n}: {response}", n = i + 1)
        })
        .join("\n")
}

/// Build the grounded user prompt from its pieces. The history block is
/// omitted when empty.
#[inline]
pub fn build_prompt(
    question: &str,
    context: &str,
    conversation_history: &str,
    preferences: UserPreferences,
) -> String {
    let mut prompt = String::new();

    if conversation_history.is_empty() {
        let _ = write!(
            prompt,
            "Based on the following textbook content, please answer the question.\n\n\
             TEXTBOOK CONTENT:\n{context}\n\n\
             QUESTION: {question}\n\n"
        );
    } else {
        let _ = write!(
            prompt,
            "Based on the following textbook content and conversation history, please answer the question.\n\n\
             TEXTBOOK CONTENT:\n{context}\n\n\
             CONVERSATION HISTORY:\n{conversation_history}\n\n\
             QUESTION: {question}\n\n"
        );
    }

    prompt.push_str("INSTRUCTIONS:\n");
    prompt.push_str("- Answer only based on the provided textbook content\n");
    prompt.push_str("- Do not provide information not found in the textbook\n");
    prompt.push_str("- Always cite the source of your information\n");
    if !conversation_history.is_empty() {
        prompt.push_str("- Consider the conversation history when answering follow-up questions\n");
    }
    let _ = writeln!(prompt, "- {}", preferences.detail_level.instruction());
    let _ = writeln!(prompt, "- {}", preferences.response_format.instruction());
    prompt.push_str("- If the textbook content doesn't contain the answer, clearly state that\n");

    prompt
}

/// Prompt used when no usable contexts survive: a disclaimed
/// general-knowledge answer is acceptable, a refusal is not.
#[inline]
pub fn build_fallback_prompt(question: &str) -> String {
    format!(
        "Question: {question}\n\n\
         You are an AI assistant. I couldn't find specific textbook content relevant to this \
         question. Provide a general answer if possible, or explain that you don't have \
         specific textbook information for this query."
    )
}
