//! Context-dependent query rewriting
//!
//! Short follow-ups like "December 31, 2026" or "5000" only make sense with
//! the preceding conversation. Before routing, such queries are rewritten
//! into standalone ones using the recent context window. Rewriting is
//! best-effort: any failure falls back to the original query and the turn
//! proceeds.

use crate::context::ContextStore;
use crate::llm::{ChatClient, ChatMessage};
use tracing::{info, warn};

const SHOULD_REWRITE_SYSTEM: &str = "You are an expert in conversational context analysis \
for financial chatbots. Your job is to identify when user queries need additional context \
to be properly understood.";

const REWRITE_SYSTEM: &str = "You are an expert in conversation context management for \
financial chatbots, specializing in creating coherent, complete queries from fragmented \
or context-dependent user inputs.";

/// A query with this many words or fewer is assumed context-dependent when
/// the classification call itself fails.
const SHORT_QUERY_WORDS: usize = 3;

pub struct QueryRewriter {
    client: std::sync::Arc<ChatClient>,
    /// How many recent turns to show the model when deciding and rewriting.
    history_window: usize,
}

impl QueryRewriter {
    pub fn new(client: std::sync::Arc<ChatClient>, history_window: usize) -> Self {
        Self { client, history_window }
    }

    /// Returns the (possibly rewritten) query and whether a rewrite happened.
    pub async fn rewrite(&self, query: &str, context: &ContextStore) -> (String, bool) {
        if context.len() < 2 {
            return (query.to_string(), false);
        }

        if !self.should_rewrite(query, context).await {
            return (query.to_string(), false);
        }

        let history = context.formatted_recent(self.history_window);
        let prompt = format!(
            r#"Previous conversation:
{history}

Current user query: "{query}"

This query appears to be incomplete or context-dependent. Rewrite it as one complete,
standalone query that incorporates the relevant context from the conversation history:
- If an amount appears without context (e.g. "5000"), state what the amount is for.
- If a date appears without context (e.g. "December 31, 2026"), connect it to the goal
  or deadline being discussed.
- If the user is answering a previous question, frame the answer as a full statement.
Include only factual details (goal types, amounts, dates) that were explicitly mentioned.
Reply with the rewritten query only."#
        );

        let messages = vec![ChatMessage::system(REWRITE_SYSTEM), ChatMessage::user(prompt)];

        match self.client.complete_with_retry(messages, 0.0, 300).await {
            Ok(rewritten) => {
                let rewritten = rewritten.trim().trim_matches('"').to_string();
                if rewritten.is_empty() || rewritten.eq_ignore_ascii_case(query) {
                    return (query.to_string(), false);
                }
                info!(original = query, rewritten = %rewritten, "Rewrote context-dependent query");
                (rewritten, true)
            }
            Err(e) => {
                warn!("Query rewrite failed, using original query: {}", e);
                (query.to_string(), false)
            }
        }
    }

    async fn should_rewrite(&self, query: &str, context: &ContextStore) -> bool {
        let history = context.formatted_recent(self.history_window);
        let prompt = format!(
            r#"Previous conversation:
{history}

Current user query: "{query}"

The query may be incomplete if it is very short, uses pronouns without clear referents,
answers a question the assistant asked, or mentions amounts, dates or targets without
saying what they are for.

Does this query need context from the previous conversation to be understood?
Answer with just YES or NO."#
        );

        let messages = vec![
            ChatMessage::system(SHOULD_REWRITE_SYSTEM),
            ChatMessage::user(prompt),
        ];

        match self.client.complete_with_retry(messages, 0.0, 10).await {
            Ok(answer) => answer.to_uppercase().contains("YES"),
            Err(e) => {
                // Err on the side of caution for very short queries.
                warn!("Rewrite classification failed: {}", e);
                query.split_whitespace().count() <= SHORT_QUERY_WORDS
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_query_heuristic_threshold() {
        assert!("December 31, 2026".split_whitespace().count() <= SHORT_QUERY_WORDS);
        assert!(
            "how should I allocate my retirement portfolio"
                .split_whitespace()
                .count()
                > SHORT_QUERY_WORDS
        );
    }
}
