//! Transaction analysis agent
//!
//! Generates spending nudges from the customer's transaction, budget and
//! subscription tables. Output is free prose, so no schema is declared.

use crate::agents::{context_sections, repair_section, PromptContext, SpecializedAgent};
use crate::interpreter::ResponseSchema;
use crate::llm::{ChatClient, ChatMessage};
use crate::models::AgentId;
use crate::reference::ReferenceData;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are the transaction analysis assistant of a personal \
finance application. You analyze transaction data, categorize spending patterns, and \
generate short personalized financial nudges aligned with the user's goals. Only output \
the nudges.";

pub struct TransactionAnalysisAgent {
    client: Arc<ChatClient>,
    reference: Arc<ReferenceData>,
    customer_id: String,
}

impl TransactionAnalysisAgent {
    pub fn new(client: Arc<ChatClient>, reference: Arc<ReferenceData>, customer_id: String) -> Self {
        Self { client, reference, customer_id }
    }
}

#[async_trait]
impl SpecializedAgent for TransactionAnalysisAgent {
    fn id(&self) -> AgentId {
        AgentId::TransactionAnalysis
    }

    fn schema(&self) -> Option<&ResponseSchema> {
        None
    }

    async fn invoke(&self, ctx: &PromptContext) -> Result<String> {
        let transactions: Vec<String> = self
            .reference
            .recent_transactions(&self.customer_id, 15)
            .iter()
            .map(|t| {
                format!(
                    "- {} | {} | ${:.2} | {}",
                    t.date_time,
                    t.merchant_name,
                    t.amount,
                    t.merchant_category.as_deref().unwrap_or("uncategorized"),
                )
            })
            .collect();

        let transactions = if transactions.is_empty() {
            "(no transactions on record)".to_string()
        } else {
            transactions.join("\n")
        };

        let prompt = format!(
            r#"{context}The user asked: "{query}"

Recent transactions:
{transactions}

Budgets:
{budgets}

Generate two to four short, personalized nudges about this user's spending: over-budget
categories, subscription burden, savings opportunities, or unusually large transactions.
Tie nudges to the user's goals where relevant. Be specific about amounts.{repair}"#,
            context = context_sections(ctx),
            query = ctx.query,
            transactions = transactions,
            budgets = self.reference.budget_summary(&self.customer_id),
            repair = repair_section(ctx),
        );

        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        self.client.complete_with_retry(messages, 0.3, 600).await
    }
}
