//! Answer generation from retrieved context.
//!
//! The generator filters repetitive contexts, builds a grounded prompt (or a
//! disclaimed general-knowledge fallback when nothing usable was retrieved),
//! makes one completion call, and post-processes the answer. Completion
//! failures degrade to canned messages; nothing here returns an error to the
//! caller.


pub mod completion;
pub mod prompt;

use itertools::Itertools;
use tracing::{error, info, warn};

use crate::retrieval::RetrievedContext;
use completion::{ChatMessage, CompletionClient};
use prompt::UserPreferences;

const GROUNDED_SYSTEM_PROMPT: &str = "You are an expert assistant for a Physical AI textbook. \
     Answer questions based ONLY on the provided context from the textbook. \
     Do not hallucinate or provide information outside the provided context. \
     Always provide source citations for the information you provide. \
     Consider the conversation history when answering follow-up questions. \
     IMPORTANT: Do not repeat or include repetitive phrases like 'Complete Learning Path' \
     multiple times in your response.";

const FALLBACK_SYSTEM_PROMPT: &str = "You are an expert assistant for a Physical AI textbook. \
     If you have specific information from the textbook context provided, use that. \
     If no context is provided, you may use your general knowledge to provide a helpful \
     response, but acknowledge that it's not from the specific textbook content.";

const AUTH_FAILURE_MESSAGE: &str = "I'm sorry, but I can't reach the AI service because of an \
     authentication problem. Please check the service configuration and try again.";

const MODEL_FAILURE_MESSAGE: &str = "I'm sorry, but the configured language model is not \
     available right now. Please try again later.";

const GENERIC_FAILURE_MESSAGE: &str = "I'm sorry, but I'm having trouble connecting to the AI \
     service right now. Please try again later.";

const EMPTY_ANSWER_MESSAGE: &str =
    "I'm sorry, but I couldn't generate a response for your question.";

/// The answer text plus the contexts that actually informed it, so citations
/// can be derived 1:1 from what the model saw.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub used_contexts: Vec<RetrievedContext>,
}

/// Generates grounded answers via the completion service.
#[derive(Debug, Clone)]
pub struct AnswerGenerator {
    client: CompletionClient,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// Answer a question from retrieved contexts and conversation history.
    /// Always returns an answer; completion failures become canned messages
    /// and the used-context list stays consistent with what was prompted.
    #[inline]
    pub async fn generate(
        &self,
        question: &str,
        contexts: &[RetrievedContext],
        history: &[(String, String)],
        preferences: UserPreferences,
    ) -> GeneratedAnswer {
        let filtered = prompt::filter_repetitive_contexts(contexts);

        if filtered.is_empty() {
            info!(
                "No relevant contexts found for question: {}",
                truncate_for_log(question, 50)
            );
            let answer = self.generate_fallback(question).await;
            return GeneratedAnswer { answer, used_contexts: Vec::new() };
        }

        let context_block = prompt::format_context(&filtered);
        let history_block = prompt::format_history(history);
        let user_prompt =
            prompt::build_prompt(question, &context_block, &history_block, preferences);

        let mut messages = vec![ChatMessage::system(GROUNDED_SYSTEM_PROMPT)];
        if !history_block.is_empty() {
            messages.push(ChatMessage::system(format!(
                "Previous conversation:\n{history_block}"
            )));
        }
        messages.push(ChatMessage::user(user_prompt));

        let answer = match self.client.complete(&messages).await {
            Ok(text) if text.is_empty() => {
                warn!("Empty response from completion service");
                EMPTY_ANSWER_MESSAGE.to_string()
            }
            Ok(text) => remove_duplicate_lines(&text),
            Err(err) => {
                error!("Error calling completion service: {err:#}");
                classify_generation_error(&format!("{err:#}")).to_string()
            }
        };

        GeneratedAnswer { answer, used_contexts: filtered }
    }

    async fn generate_fallback(&self, question: &str) -> String {
        let messages = vec![
            ChatMessage::system(FALLBACK_SYSTEM_PROMPT),
            ChatMessage::user(prompt::build_fallback_prompt(question)),
        ];

        match self.client.complete(&messages).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => rephrase_message(question),
            Err(err) => {
                error!("Error calling completion service in fallback: {err:#}");
                rephrase_message(question)
            }
        }
    }
}

/// Map a completion failure to user-facing wording by substring match on the
/// error text. Auth problems are checked before model availability.
#[inline]
pub fn classify_generation_error(error_text: &str) -> &'static str {
    let lower = error_text.to_lowercase();

    if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("401") {
        AUTH_FAILURE_MESSAGE
    } else if lower.contains("not found") || lower.contains("404") || lower.contains("model") {
        MODEL_FAILURE_MESSAGE
    } else {
        GENERIC_FAILURE_MESSAGE
    }
}

/// Remove duplicated lines from the answer, keeping first occurrences.
/// Neutralizes model-side repetition loops.
#[inline]
pub fn remove_duplicate_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .unique_by(|line| line.trim().to_string())
        .join("\n")
}

fn rephrase_message(question: &str) -> String {
    format!(
        "I understand you're asking about '{question}'. I don't have specific textbook \
         content for this query, but I'm here to help. Could you try rephrasing your question?"
    )
}

fn truncate_for_log(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
