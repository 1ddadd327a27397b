//! Asset allocation agent
//!
//! Portfolio construction guidance keyed to the user's risk profile and
//! goal timelines. Returns a structured recommendation with an optional
//! percentage breakdown.

use crate::agents::{context_sections, repair_section, PromptContext, SpecializedAgent};
use crate::interpreter::{FieldKind, FieldSpec, ResponseSchema};
use crate::llm::{ChatClient, ChatMessage};
use crate::models::AgentId;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are an expert financial advisor specializing in asset \
allocation and investment strategy. Your recommendations are evidence-based, tailored to \
risk profiles and timelines, use clear percentage breakdowns, and explain the risk/reward \
trade-offs. Focus on allocation principles, not specific investment products.";

const FIELDS: &[FieldSpec] = &[
    FieldSpec::required("recommendation", FieldKind::Text),
    FieldSpec::optional("stocks_percent", FieldKind::Number),
    FieldSpec::optional("bonds_percent", FieldKind::Number),
    FieldSpec::optional("cash_percent", FieldKind::Number),
];

const SCHEMA: ResponseSchema = ResponseSchema::new(FIELDS);

pub struct AssetAllocationAgent {
    client: Arc<ChatClient>,
}

impl AssetAllocationAgent {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpecializedAgent for AssetAllocationAgent {
    fn id(&self) -> AgentId {
        AgentId::AssetAllocation
    }

    fn schema(&self) -> Option<&ResponseSchema> {
        Some(&SCHEMA)
    }

    async fn invoke(&self, ctx: &PromptContext) -> Result<String> {
        let prompt = format!(
            r#"{context}The user asked: "{query}"

Advise on asset allocation for this user. Consider their risk profile, current portfolio
and any goals on record. Reply with a single JSON object:

{{
  "recommendation": a short paragraph of allocation guidance with its rationale,
  "stocks_percent": recommended equity percentage, if you are giving a breakdown,
  "bonds_percent": recommended bond percentage,
  "cash_percent": recommended cash percentage
}}

Return ONLY the JSON object.{repair}"#,
            context = context_sections(ctx),
            query = ctx.query,
            repair = repair_section(ctx),
        );

        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        self.client.complete_with_retry(messages, 0.1, 700).await
    }
}

/// Render a structured allocation response as user-facing text.
pub fn humanize(fields: &std::collections::BTreeMap<String, crate::models::FieldValue>) -> String {
    let mut out = fields
        .get("recommendation")
        .and_then(|v| v.as_text())
        .unwrap_or("")
        .to_string();

    let breakdown: Vec<String> = [
        ("stocks_percent", "stocks"),
        ("bonds_percent", "bonds"),
        ("cash_percent", "cash"),
    ]
    .iter()
    .filter_map(|(key, label)| {
        fields
            .get(*key)
            .and_then(|v| v.as_number())
            .map(|pct| format!("{} {:.0}%", label, pct))
    })
    .collect();

    if !breakdown.is_empty() {
        out.push_str(&format!("\n\nSuggested mix: {}.", breakdown.join(", ")));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpret;
    use crate::models::AgentResponse;

    #[test]
    fn test_humanize_with_breakdown() {
        let raw = r#"{"recommendation": "Favor equities for the long horizon.",
                      "stocks_percent": 70, "bonds_percent": 25, "cash_percent": 5}"#;
        let AgentResponse::Structured { fields } = interpret(raw, Some(&SCHEMA)) else {
            panic!("expected Structured");
        };

        let text = humanize(&fields);
        assert!(text.contains("Favor equities"));
        assert!(text.contains("stocks 70%"));
        assert!(text.contains("cash 5%"));
    }

    #[test]
    fn test_humanize_without_breakdown() {
        let raw = r#"{"recommendation": "Hold your current mix."}"#;
        let AgentResponse::Structured { fields } = interpret(raw, Some(&SCHEMA)) else {
            panic!("expected Structured");
        };

        let text = humanize(&fields);
        assert_eq!(text, "Hold your current mix.");
    }
}
