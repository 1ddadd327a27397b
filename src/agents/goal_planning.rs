//! Goal planning agent
//!
//! Turns goal-shaped requests ("save $50,000 for a house in 3 years") into a
//! structured goal mention the ledger can commit, plus a short strategy
//! explanation for the user.

use crate::agents::{context_sections, repair_section, PromptContext, SpecializedAgent};
use crate::interpreter::{FieldKind, FieldSpec, ResponseSchema};
use crate::llm::{ChatClient, ChatMessage};
use crate::models::AgentId;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are an expert financial goal planning advisor who helps \
users set, track, and achieve financial goals. Your advice is personalized, actionable \
and realistic, with specific contribution amounts and timelines.";

pub const GOAL_CATEGORIES: &[&str] = &[
    "retirement",
    "education",
    "house-purchase",
    "emergency-fund",
    "other",
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::required("category", FieldKind::Enum(GOAL_CATEGORIES)),
    FieldSpec::required("target_amount", FieldKind::Number),
    FieldSpec::required("target_date", FieldKind::Date),
    FieldSpec::optional("current_progress_amount", FieldKind::Number),
    FieldSpec::optional("strategy", FieldKind::Text),
];

pub(crate) const SCHEMA: ResponseSchema = ResponseSchema::new(FIELDS);

pub struct GoalPlanningAgent {
    client: Arc<ChatClient>,
}

impl GoalPlanningAgent {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpecializedAgent for GoalPlanningAgent {
    fn id(&self) -> AgentId {
        AgentId::GoalPlanning
    }

    fn schema(&self) -> Option<&ResponseSchema> {
        Some(&SCHEMA)
    }

    async fn invoke(&self, ctx: &PromptContext) -> Result<String> {
        let prompt = format!(
            r#"{context}The user said: "{query}"

Identify the financial goal being discussed and reply with a single JSON object:

{{
  "category": one of "retirement", "education", "house-purchase", "emergency-fund", "other",
  "target_amount": the target amount as a number,
  "target_date": the target date as YYYY-MM-DD (derive it from any stated timeframe),
  "current_progress_amount": amount already saved toward it, if mentioned,
  "strategy": two or three sentences of practical guidance for reaching this goal
}}

If the user already has a matching goal on record, reuse its figures for anything they did
not restate. Return ONLY the JSON object.{repair}"#,
            context = context_sections(ctx),
            query = ctx.query,
            repair = repair_section(ctx),
        );

        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        self.client.complete_with_retry(messages, 0.0, 600).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpret;
    use crate::models::AgentResponse;

    #[test]
    fn test_schema_accepts_canonical_output() {
        let raw = r#"{"category": "house-purchase", "target_amount": 50000,
                      "target_date": "2029-08-01", "strategy": "Save monthly."}"#;
        match interpret(raw, Some(&SCHEMA)) {
            AgentResponse::Structured { fields } => {
                assert_eq!(fields["category"].as_text(), Some("house-purchase"));
                assert_eq!(fields["target_amount"].as_number(), Some(50000.0));
            }
            other => panic!("expected Structured, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_rejects_missing_date_first_by_declaration() {
        let raw = r#"{"target_amount": 50000}"#;
        match interpret(raw, Some(&SCHEMA)) {
            AgentResponse::Invalid { reason, .. } => {
                // `category` is declared before `target_date`, so it is named.
                assert!(reason.contains("category"));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }
}
