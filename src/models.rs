//! Core data models for the personal finance advisor

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

//
// ================= Enums =================
//

/// Who produced a Turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
}

/// The specialized agents the orchestrator can dispatch to.
///
/// Discriminant order is the fixed routing priority: when several categories
/// match one utterance, agents are invoked in this order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    GoalPlanning,
    AssetAllocation,
    TransactionAnalysis,
    Education,
    /// Generic advisory pass used when no specialized category matches.
    Advisor,
}

impl AgentId {
    pub const ROUTABLE: &'static [AgentId] = &[
        AgentId::GoalPlanning,
        AgentId::AssetAllocation,
        AgentId::TransactionAnalysis,
        AgentId::Education,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::GoalPlanning => "goal_planning",
            AgentId::AssetAllocation => "asset_allocation",
            AgentId::TransactionAnalysis => "transaction_analysis",
            AgentId::Education => "education",
            AgentId::Advisor => "advisor",
        }
    }

    /// Human-readable name used for attribution headers in replies.
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentId::GoalPlanning => "Goal Planning",
            AgentId::AssetAllocation => "Asset Allocation",
            AgentId::TransactionAnalysis => "Transaction Analysis",
            AgentId::Education => "Education",
            AgentId::Advisor => "Financial Advisor",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Financial goal categories recognized by the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GoalCategory {
    Retirement,
    Education,
    HousePurchase,
    EmergencyFund,
    Other,
}

impl GoalCategory {
    /// Parse a category from free-form agent output. Tolerant of spacing,
    /// casing, and the common synonyms the models produce.
    pub fn parse_lenient(raw: &str) -> GoalCategory {
        let normalized: String = raw
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();

        match normalized.trim() {
            "retirement" | "retire" => GoalCategory::Retirement,
            "education" | "college" | "tuition" => GoalCategory::Education,
            "house-purchase" | "house" | "home" | "home-purchase" | "property" => {
                GoalCategory::HousePurchase
            }
            "emergency-fund" | "emergency" | "rainy-day" => GoalCategory::EmergencyFund,
            _ => GoalCategory::Other,
        }
    }
}

impl fmt::Display for GoalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GoalCategory::Retirement => "retirement",
            GoalCategory::Education => "education",
            GoalCategory::HousePurchase => "house-purchase",
            GoalCategory::EmergencyFund => "emergency-fund",
            GoalCategory::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle of a goal record. Transitions move strictly forward:
/// proposed → confirmed → in-progress → completed, with abandoned reachable
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GoalStatus {
    Proposed,
    Confirmed,
    InProgress,
    Completed,
    Abandoned,
}

impl GoalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GoalStatus::Completed | GoalStatus::Abandoned)
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GoalStatus::Proposed => "proposed",
            GoalStatus::Confirmed => "confirmed",
            GoalStatus::InProgress => "in-progress",
            GoalStatus::Completed => "completed",
            GoalStatus::Abandoned => "abandoned",
        };
        write!(f, "{}", s)
    }
}

/// Horizon class derived from the target date, mirroring the profile data's
/// Short-term / Medium-term / Long-term buckets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GoalTimeline {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl fmt::Display for GoalTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GoalTimeline::ShortTerm => "Short-term",
            GoalTimeline::MediumTerm => "Medium-term",
            GoalTimeline::LongTerm => "Long-term",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Turn =================
//

/// One exchange in the conversation history. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Strictly increasing within a session; assigned by the context store.
    pub sequence: u64,
    pub role: TurnRole,
    /// Which specialized agent produced this turn, for agent turns.
    pub agent_id: Option<AgentId>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            role: TurnRole::User,
            agent_id: None,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(agent_id: AgentId, text: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            role: TurnRole::Agent,
            agent_id: Some(agent_id),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

//
// ================= Goal Record =================
//

/// One financial goal derived from the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRecord {
    /// Readable session-scoped id (`GOAL1`, `GOAL2`, ...).
    pub goal_id: String,
    pub category: GoalCategory,
    pub target_amount: f64,
    pub target_date: NaiveDate,
    pub current_progress_amount: f64,
    pub status: GoalStatus,
    pub timeline: GoalTimeline,
    /// Remaining amount spread over the months until the target date.
    pub monthly_contribution: f64,
    pub progress_percent: f64,
    pub created_at: DateTime<Utc>,
    pub last_touched: DateTime<Utc>,
}

//
// ================= Routing =================
//

/// Why the router picked the agents it did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingRationale {
    KeywordMatch,
    ExplicitGoalCategory,
    FallbackToAdvisor,
}

/// Which agents handle the current turn, in invocation order.
/// Computed fresh each turn; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub agents: Vec<AgentId>,
    pub rationale: RoutingRationale,
}

//
// ================= Agent Response =================
//

/// A single typed value extracted from a completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Outcome of schema-aware interpretation of one raw completion.
/// Created per call, consumed once by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResponse {
    Structured { fields: BTreeMap<String, FieldValue> },
    Unstructured { text: String },
    Invalid { raw_text: String, reason: String },
}

impl AgentResponse {
    pub fn is_invalid(&self) -> bool {
        matches!(self, AgentResponse::Invalid { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_lenient_parse() {
        assert_eq!(
            GoalCategory::parse_lenient("House Purchase"),
            GoalCategory::HousePurchase
        );
        assert_eq!(
            GoalCategory::parse_lenient("emergency_fund"),
            GoalCategory::EmergencyFund
        );
        assert_eq!(GoalCategory::parse_lenient("RETIREMENT"), GoalCategory::Retirement);
        assert_eq!(GoalCategory::parse_lenient("vacation"), GoalCategory::Other);
    }

    #[test]
    fn test_agent_priority_ordering() {
        let mut agents = vec![
            AgentId::Education,
            AgentId::GoalPlanning,
            AgentId::TransactionAnalysis,
            AgentId::AssetAllocation,
        ];
        agents.sort();
        assert_eq!(
            agents,
            vec![
                AgentId::GoalPlanning,
                AgentId::AssetAllocation,
                AgentId::TransactionAnalysis,
                AgentId::Education,
            ]
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(GoalStatus::Completed.is_terminal());
        assert!(GoalStatus::Abandoned.is_terminal());
        assert!(!GoalStatus::InProgress.is_terminal());
    }
}
