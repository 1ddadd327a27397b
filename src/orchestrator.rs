//! Financial advisor orchestrator
//!
//! Coordinates each turn: rewrites context-dependent queries, routes to the
//! specialized agents, interprets and repairs their output, updates the goal
//! ledger, appends turns to the context store, and composes the attributed
//! reply. One turn is fully processed before the next begins.

use crate::agents::{
    asset_allocation, AdvisorAgent, AssetAllocationAgent, EducationAgent, GoalPlanningAgent,
    PromptContext, SpecializedAgent, TransactionAnalysisAgent,
};
use crate::context::{ContextStore, QueryRewriter};
use crate::interpreter::interpret;
use crate::ledger::{GoalLedgerManager, TransitionOutcome};
use crate::llm::ChatClient;
use crate::models::{AgentId, AgentResponse, FieldValue, GoalStatus, RoutingDecision, Turn};
use crate::reference::ReferenceData;
use crate::router::Router;
use crate::AdvisorError;
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-session mutable state: the conversation history and the goal ledger.
/// Constructed once per session and passed by reference into every turn.
pub struct Session {
    pub context: ContextStore,
    pub ledger: GoalLedgerManager,
}

impl Session {
    pub fn new(max_history: usize) -> Self {
        Self {
            context: ContextStore::new(max_history),
            ledger: GoalLedgerManager::new(),
        }
    }
}

/// What one agent contributed to the turn.
struct AgentContribution {
    agent: AgentId,
    text: String,
    failed: bool,
}

/// Central coordinator for the specialized agents.
pub struct FinancialAdvisor {
    agents: Vec<Arc<dyn SpecializedAgent>>,
    rewriter: Option<QueryRewriter>,
    reference: Arc<ReferenceData>,
    customer_id: String,
    context_window: usize,
}

impl FinancialAdvisor {
    /// Build the default agent registry backed by the completion endpoint.
    pub fn new(
        client: Arc<ChatClient>,
        reference: Arc<ReferenceData>,
        customer_id: String,
        context_window: usize,
    ) -> Self {
        let agents: Vec<Arc<dyn SpecializedAgent>> = vec![
            Arc::new(GoalPlanningAgent::new(client.clone())),
            Arc::new(AssetAllocationAgent::new(client.clone())),
            Arc::new(TransactionAnalysisAgent::new(
                client.clone(),
                reference.clone(),
                customer_id.clone(),
            )),
            Arc::new(EducationAgent::new(client.clone())),
            Arc::new(AdvisorAgent::new(client.clone())),
        ];

        Self {
            agents,
            rewriter: Some(QueryRewriter::new(client, context_window)),
            reference,
            customer_id,
            context_window,
        }
    }

    /// Registry injection for tests and alternative backends. No query
    /// rewriting happens on this path.
    pub fn with_agents(
        agents: Vec<Arc<dyn SpecializedAgent>>,
        reference: Arc<ReferenceData>,
        customer_id: String,
        context_window: usize,
    ) -> Self {
        Self {
            agents,
            rewriter: None,
            reference,
            customer_id,
            context_window,
        }
    }

    /// Process one user turn to completion. Every per-turn failure is
    /// contained here and converted into user-visible text; only empty input
    /// and context-store capacity propagate as errors.
    pub async fn handle_turn(&self, user_text: &str, session: &mut Session) -> Result<String> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(AdvisorError::EmptyInput);
        }

        info!(customer_id = %self.customer_id, "Processing turn: {}", user_text);

        // Deterministic local handling for explicit status-change requests
        // ("confirm GOAL1"): the ledger applies or rejects the transition and
        // the reply is phrased here, with no remote calls.
        if let Some((goal_id, new_status)) = detect_transition_request(user_text) {
            return self
                .handle_transition_turn(user_text, &goal_id, new_status, session)
                .await;
        }

        let query = match &self.rewriter {
            Some(rewriter) => rewriter.rewrite(user_text, &session.context).await.0,
            None => user_text.to_string(),
        };

        let decision = Router::classify(&query);
        info!(
            agents = ?decision.agents,
            rationale = ?decision.rationale,
            "Routing decision"
        );

        // Prompt context snapshots are taken at turn start; the user turn is
        // appended before any agent turn.
        let recent_context = session.context.formatted_recent(self.context_window);
        let user_context = self.reference.user_context(&self.customer_id);
        session.context.append(Turn::user(user_text))?;

        let contributions = self
            .run_agents(&decision, &query, recent_context, user_context, session)
            .await;

        for contribution in &contributions {
            session
                .context
                .append(Turn::agent(contribution.agent, contribution.text.clone()))?;
        }

        Ok(compose_reply(&contributions))
    }

    /// Invoke the selected agents sequentially in priority order. Later
    /// agents see earlier agents' output; append order equals invocation
    /// order by construction.
    async fn run_agents(
        &self,
        decision: &RoutingDecision,
        query: &str,
        recent_context: String,
        user_context: String,
        session: &mut Session,
    ) -> Vec<AgentContribution> {
        let mut contributions = Vec::with_capacity(decision.agents.len());
        let mut upstream: Option<String> = None;

        for agent_id in &decision.agents {
            let Some(agent) = self.agent(*agent_id) else {
                warn!(agent = ?agent_id, "No agent registered for routed id");
                continue;
            };

            let mut ctx = PromptContext {
                query: query.to_string(),
                recent_context: recent_context.clone(),
                ledger_snapshot: session.ledger.formatted_snapshot(),
                user_context: user_context.clone(),
                upstream: upstream.clone(),
                repair_reason: None,
            };

            let response = self.invoke_with_repair(agent.as_ref(), &mut ctx).await;

            let contribution = match response {
                AgentResponse::Structured { fields } => {
                    let structured = AgentResponse::Structured { fields: fields.clone() };
                    let touched = session
                        .ledger
                        .extract_and_upsert(&structured, &session.context);
                    let text =
                        humanize_structured(*agent_id, &fields, &touched, &session.ledger);
                    AgentContribution { agent: *agent_id, text, failed: false }
                }
                AgentResponse::Unstructured { text } => {
                    AgentContribution { agent: *agent_id, text, failed: false }
                }
                AgentResponse::Invalid { raw_text, reason } => {
                    warn!(agent = ?agent_id, reason = %reason, "Agent contribution failed");
                    if raw_text.trim().is_empty() {
                        AgentContribution {
                            agent: *agent_id,
                            text: format!(
                                "The {} advisor did not respond this turn ({}); \
                                 its input is unavailable.",
                                agent_id.display_name(),
                                reason
                            ),
                            failed: true,
                        }
                    } else {
                        // Degraded: treat the raw completion as plain text.
                        AgentContribution { agent: *agent_id, text: raw_text, failed: false }
                    }
                }
            };

            if !contribution.failed {
                let section = format!("{}: {}", contribution.agent.display_name(), contribution.text);
                upstream = Some(match upstream.take() {
                    Some(existing) => format!("{}\n{}", existing, section),
                    None => section,
                });
            }

            contributions.push(contribution);
        }

        contributions
    }

    /// One interpretation attempt plus the bounded repair pass: an `Invalid`
    /// outcome triggers exactly one amended reprompt, after which the caller
    /// degrades. Remote failures are classified as `Invalid`, never raised.
    async fn invoke_with_repair(
        &self,
        agent: &dyn SpecializedAgent,
        ctx: &mut PromptContext,
    ) -> AgentResponse {
        let first = self.invoke_once(agent, ctx).await;

        let AgentResponse::Invalid { reason, .. } = &first else {
            return first;
        };

        debug!(agent = ?agent.id(), reason = %reason, "Retrying with amended prompt");
        ctx.repair_reason = Some(reason.clone());
        self.invoke_once(agent, ctx).await
    }

    async fn invoke_once(&self, agent: &dyn SpecializedAgent, ctx: &PromptContext) -> AgentResponse {
        match agent.invoke(ctx).await {
            Ok(raw) => interpret(&raw, agent.schema()),
            Err(e) => {
                let reason = match &e {
                    AdvisorError::RemoteTimeout(_) => "timeout".to_string(),
                    other => other.to_string(),
                };
                AgentResponse::Invalid { raw_text: String::new(), reason }
            }
        }
    }

    async fn handle_transition_turn(
        &self,
        user_text: &str,
        goal_id: &str,
        new_status: GoalStatus,
        session: &mut Session,
    ) -> Result<String> {
        let text = match session.ledger.transition(goal_id, new_status) {
            TransitionOutcome::Applied => {
                format!("{} is now {}.", goal_id, new_status)
            }
            TransitionOutcome::Rejected(reason) => {
                let current = session
                    .ledger
                    .snapshot()
                    .get(goal_id)
                    .map(|r| format!(" {} is currently {}.", goal_id, r.status))
                    .unwrap_or_default();
                format!(
                    "I can't move {} to {}: {}.{}",
                    goal_id, new_status, reason, current
                )
            }
        };

        session.context.append(Turn::user(user_text))?;
        session
            .context
            .append(Turn::agent(AgentId::GoalPlanning, text.clone()))?;

        Ok(format!("## Goal Planning\n{}", text))
    }

    fn agent(&self, id: AgentId) -> Option<&Arc<dyn SpecializedAgent>> {
        self.agents.iter().find(|a| a.id() == id)
    }
}

/// Attributed concatenation in priority order; the merge rule is
/// deterministic, not a synthesis pass.
fn compose_reply(contributions: &[AgentContribution]) -> String {
    contributions
        .iter()
        .map(|c| format!("## {}\n{}", c.agent.display_name(), c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a structured response as user-facing text, using the freshly
/// committed ledger record when the response created or updated a goal.
fn humanize_structured(
    agent_id: AgentId,
    fields: &BTreeMap<String, FieldValue>,
    touched: &[String],
    ledger: &GoalLedgerManager,
) -> String {
    if agent_id == AgentId::AssetAllocation {
        return asset_allocation::humanize(fields);
    }

    if let Some(goal_id) = touched.first() {
        if let Some(record) = ledger.snapshot().get(goal_id) {
            let mut out = format!(
                "Goal {} recorded: {} goal of ${:.2} by {} ({}, ~${:.2}/month, status: {}).",
                record.goal_id,
                record.category,
                record.target_amount,
                record.target_date.format("%m/%d/%Y"),
                record.timeline,
                record.monthly_contribution,
                record.status,
            );
            if let Some(strategy) = fields.get("strategy").and_then(|v| v.as_text()) {
                out.push_str(&format!("\n\n{}", strategy));
            }
            return out;
        }
    }

    // Structured output that touched no goal: render the fields directly.
    fields
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                FieldValue::Number(n) => format!("{}", n),
                FieldValue::Date(d) => d.format("%m/%d/%Y").to_string(),
                FieldValue::Text(s) => s.clone(),
            };
            format!("{}: {}", key, rendered)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Spot explicit status-change requests that name a goal id, e.g.
/// "confirm GOAL1" or "abandon GOAL2".
fn detect_transition_request(text: &str) -> Option<(String, GoalStatus)> {
    let goal_id = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .find(|w| {
            w.to_uppercase().starts_with("GOAL")
                && w.len() > 4
                && w[4..].chars().all(|c| c.is_ascii_digit())
        })?
        .to_uppercase();

    let lowered = text.to_lowercase();
    let status = if lowered.contains("confirm") {
        GoalStatus::Confirmed
    } else if lowered.contains("start") || lowered.contains("begin") {
        GoalStatus::InProgress
    } else if lowered.contains("complete") || lowered.contains("finish") || lowered.contains("done")
    {
        GoalStatus::Completed
    } else if lowered.contains("abandon") || lowered.contains("cancel") || lowered.contains("drop")
    {
        GoalStatus::Abandoned
    } else {
        return None;
    };

    Some((goal_id, status))
}
