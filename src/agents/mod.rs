//! Specialized agents
//!
//! Each agent wraps one prompt template plus a call to the completion
//! endpoint; stateless beyond the context passed in. The orchestrator
//! depends only on the `invoke` capability, never on an agent's internal
//! prompt structure.

use crate::interpreter::ResponseSchema;
use crate::llm::{ChatClient, ChatMessage};
use crate::models::AgentId;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod asset_allocation;
pub mod education;
pub mod goal_planning;
pub mod transaction_analysis;

pub use asset_allocation::AssetAllocationAgent;
pub use education::EducationAgent;
pub use goal_planning::GoalPlanningAgent;
pub use transaction_analysis::TransactionAnalysisAgent;

/// Everything an agent may draw on when composing its prompt: the turn's
/// query, a bounded slice of recent conversation, the committed goal ledger,
/// the customer's reference profile, and any output already produced by
/// higher-priority agents this turn.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub query: String,
    pub recent_context: String,
    pub ledger_snapshot: String,
    pub user_context: String,
    pub upstream: Option<String>,
    /// Set on the single retry after an `Invalid` interpretation; asks the
    /// model to resubmit in the expected shape.
    pub repair_reason: Option<String>,
}

/// A domain-specialized agent: prompt in, raw completion text out.
#[async_trait]
pub trait SpecializedAgent: Send + Sync {
    fn id(&self) -> AgentId;

    /// Expected output shape, if this agent produces structured output.
    fn schema(&self) -> Option<&ResponseSchema>;

    async fn invoke(&self, ctx: &PromptContext) -> Result<String>;
}

/// Shared prompt scaffolding: context sections every agent includes, in the
/// same order, so transcripts read consistently.
pub(crate) fn context_sections(ctx: &PromptContext) -> String {
    let mut out = String::new();

    if !ctx.user_context.is_empty() {
        out.push_str(&format!("User profile:\n{}\n", ctx.user_context));
    }
    if !ctx.ledger_snapshot.is_empty() {
        out.push_str(&format!("{}\n", ctx.ledger_snapshot));
    }
    if !ctx.recent_context.is_empty() {
        out.push_str(&format!("Recent conversation:\n{}\n", ctx.recent_context));
    }
    if let Some(upstream) = &ctx.upstream {
        out.push_str(&format!(
            "Output already produced by other advisors this turn:\n{}\n\n",
            upstream
        ));
    }

    out
}

pub(crate) fn repair_section(ctx: &PromptContext) -> String {
    match &ctx.repair_reason {
        Some(reason) => format!(
            "\nYour previous reply could not be processed ({}). \
             Resubmit your answer in exactly the requested format.\n",
            reason
        ),
        None => String::new(),
    }
}

const ADVISOR_SYSTEM: &str = "You are a holistic personal financial advisor. You give \
practical, personalized guidance grounded in the user's profile, goals and conversation. \
You are supportive and concrete, and you never invent account data that was not provided.";

/// Generic advisory pass used when no specialized category matches. It sees
/// the goal ledger snapshot, so general advice stays consistent with the
/// goals already on record.
pub struct AdvisorAgent {
    client: Arc<ChatClient>,
}

impl AdvisorAgent {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpecializedAgent for AdvisorAgent {
    fn id(&self) -> AgentId {
        AgentId::Advisor
    }

    fn schema(&self) -> Option<&ResponseSchema> {
        None
    }

    async fn invoke(&self, ctx: &PromptContext) -> Result<String> {
        let prompt = format!(
            "{}Question from the user: {}\n\n\
             Give holistic financial guidance. Where the user's existing goals are relevant, \
             reference them by name and progress.{}",
            context_sections(ctx),
            ctx.query,
            repair_section(ctx),
        );

        let messages = vec![ChatMessage::system(ADVISOR_SYSTEM), ChatMessage::user(prompt)];
        self.client.complete_with_retry(messages, 0.2, 1000).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_sections_order_and_omission() {
        let ctx = PromptContext {
            query: "q".to_string(),
            recent_context: "User: hi\n".to_string(),
            ledger_snapshot: "Current financial goals:\n- GOAL1".to_string(),
            user_context: String::new(),
            upstream: Some("Goal Planning: created GOAL1".to_string()),
            repair_reason: None,
        };

        let sections = context_sections(&ctx);
        assert!(!sections.contains("User profile"));
        let goals_at = sections.find("Current financial goals").unwrap();
        let recent_at = sections.find("Recent conversation").unwrap();
        let upstream_at = sections.find("other advisors this turn").unwrap();
        assert!(goals_at < recent_at && recent_at < upstream_at);
    }

    #[test]
    fn test_repair_section_only_on_retry() {
        let mut ctx = PromptContext::default();
        assert!(repair_section(&ctx).is_empty());

        ctx.repair_reason = Some("missing required field `amount`".to_string());
        let section = repair_section(&ctx);
        assert!(section.contains("missing required field `amount`"));
        assert!(section.contains("Resubmit"));
    }
}
