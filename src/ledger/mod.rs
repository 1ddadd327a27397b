//! Goal ledger
//!
//! Derives, updates and validates structured financial-goal records from
//! conversation content and agent output. All mutations flow through the
//! manager; the orchestrator only ever reads snapshots.

use crate::context::ContextStore;
use crate::models::{
    AgentResponse, GoalCategory, GoalRecord, GoalStatus, GoalTimeline, TurnRole,
};
use chrono::{Datelike, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Mapping from goal id to record. Ordered so snapshots render stably.
pub type GoalLedger = BTreeMap<String, GoalRecord>;

/// Two goal mentions within this many days of each other (same category)
/// refer to the same goal.
const MATCH_TOLERANCE_DAYS: i64 = 30;

/// Reason codes for rejected status transitions, phrased to the user by the
/// orchestrator rather than raised as faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection {
    UnknownGoal,
    AlreadyTerminal,
    SkipsStage,
    CannotRegress,
}

impl fmt::Display for TransitionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionRejection::UnknownGoal => "no goal with that id exists",
            TransitionRejection::AlreadyTerminal => {
                "the goal has already been completed or abandoned"
            }
            TransitionRejection::SkipsStage => {
                "goals advance one stage at a time (proposed, confirmed, in-progress, completed)"
            }
            TransitionRejection::CannotRegress => "goals cannot move back to an earlier status",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    Rejected(TransitionRejection),
}

/// Owner of the session's goal ledger.
pub struct GoalLedgerManager {
    ledger: GoalLedger,
    next_goal_number: u64,
}

impl GoalLedgerManager {
    pub fn new() -> Self {
        Self {
            ledger: GoalLedger::new(),
            next_goal_number: 1,
        }
    }

    /// Read-only view of committed state, used for prompt assembly.
    pub fn snapshot(&self) -> &GoalLedger {
        &self.ledger
    }

    /// Scan a structured agent response for goal-shaped fields and create or
    /// update matching records. Returns the ids touched. Malformed fields
    /// are dropped with a logged reason; nothing here fails the turn.
    pub fn extract_and_upsert(
        &mut self,
        response: &AgentResponse,
        context: &ContextStore,
    ) -> Vec<String> {
        let AgentResponse::Structured { fields } = response else {
            return Vec::new();
        };

        let target_amount = fields
            .get("target_amount")
            .or_else(|| fields.get("amount"))
            .and_then(|v| v.as_number());
        let target_date = fields
            .get("target_date")
            .or_else(|| fields.get("date"))
            .and_then(|v| v.as_date());
        let progress = fields
            .get("current_progress_amount")
            .or_else(|| fields.get("current_savings"))
            .and_then(|v| v.as_number())
            .unwrap_or(0.0);

        // The category may come typed from the response, or be inferred from
        // the conversation when the model left it out.
        let category = fields
            .get("category")
            .and_then(|v| v.as_text())
            .map(GoalCategory::parse_lenient)
            .or_else(|| infer_category_from_context(context));

        let (Some(category), Some(target_amount), Some(target_date)) =
            (category, target_amount, target_date)
        else {
            debug!("Response carried no complete goal mention, ledger unchanged");
            return Vec::new();
        };

        if target_amount <= 0.0 {
            warn!(target_amount, "Dropping goal mention with non-positive target amount");
            return Vec::new();
        }
        if progress < 0.0 {
            warn!(progress, "Dropping goal mention with negative progress amount");
            return Vec::new();
        }

        let goal_id = match self.find_match(category, target_date) {
            Some(existing) => existing,
            None => {
                let id = format!("GOAL{}", self.next_goal_number);
                self.next_goal_number += 1;
                id
            }
        };

        let now = Utc::now();
        let today = now.date_naive();

        match self.ledger.get_mut(&goal_id) {
            Some(record) => {
                record.target_amount = target_amount;
                record.target_date = target_date;
                record.current_progress_amount = progress.max(record.current_progress_amount);
                record.last_touched = now;
                recompute_derived(record, today);
                info!(goal_id = %goal_id, category = %category, "Updated goal record");
            }
            None => {
                let mut record = GoalRecord {
                    goal_id: goal_id.clone(),
                    category,
                    target_amount,
                    target_date,
                    current_progress_amount: progress,
                    status: GoalStatus::Proposed,
                    timeline: GoalTimeline::MediumTerm,
                    monthly_contribution: 0.0,
                    progress_percent: 0.0,
                    created_at: now,
                    last_touched: now,
                };
                recompute_derived(&mut record, today);
                info!(goal_id = %goal_id, category = %category, target_amount, "Created goal record");
                self.ledger.insert(goal_id.clone(), record);
            }
        }

        vec![goal_id]
    }

    /// Apply a status transition, enforcing the forward-only lifecycle.
    /// Out-of-order requests are rejected with a reason code and leave the
    /// record unchanged.
    pub fn transition(&mut self, goal_id: &str, new_status: GoalStatus) -> TransitionOutcome {
        let Some(record) = self.ledger.get_mut(goal_id) else {
            return TransitionOutcome::Rejected(TransitionRejection::UnknownGoal);
        };

        let allowed = match (record.status, new_status) {
            (current, _) if current.is_terminal() => {
                return TransitionOutcome::Rejected(TransitionRejection::AlreadyTerminal);
            }
            (_, GoalStatus::Abandoned) => true,
            (GoalStatus::Proposed, GoalStatus::Confirmed) => true,
            (GoalStatus::Confirmed, GoalStatus::InProgress) => true,
            (GoalStatus::InProgress, GoalStatus::Completed) => true,
            (GoalStatus::Proposed, GoalStatus::InProgress | GoalStatus::Completed)
            | (GoalStatus::Confirmed, GoalStatus::Completed) => {
                return TransitionOutcome::Rejected(TransitionRejection::SkipsStage);
            }
            _ => {
                return TransitionOutcome::Rejected(TransitionRejection::CannotRegress);
            }
        };

        if allowed {
            info!(goal_id, from = %record.status, to = %new_status, "Goal status transition");
            record.status = new_status;
            record.last_touched = Utc::now();
        }

        TransitionOutcome::Applied
    }

    /// Render the ledger for inclusion in agent prompts.
    pub fn formatted_snapshot(&self) -> String {
        if self.ledger.is_empty() {
            return "No financial goals on record.".to_string();
        }

        let mut out = String::from("Current financial goals:\n");
        for record in self.ledger.values() {
            out.push_str(&format!(
                "- {} ({}): target ${:.2} by {}, ${:.2} saved ({:.1}% complete, {}, ~${:.2}/month)\n",
                record.goal_id,
                record.category,
                record.target_amount,
                record.target_date.format("%m/%d/%Y"),
                record.current_progress_amount,
                record.progress_percent,
                record.status,
                record.monthly_contribution,
            ));
        }
        out
    }

    /// Fuzzy match: same category with target dates within the tolerance
    /// band refer to one goal. Ties go to the most recently touched record.
    fn find_match(&self, category: GoalCategory, target_date: NaiveDate) -> Option<String> {
        self.ledger
            .values()
            .filter(|r| r.category == category)
            .filter(|r| (r.target_date - target_date).num_days().abs() <= MATCH_TOLERANCE_DAYS)
            .max_by_key(|r| r.last_touched)
            .map(|r| r.goal_id.clone())
    }
}

impl Default for GoalLedgerManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Recompute timeline class, monthly contribution and progress percentage
/// from the primary fields.
fn recompute_derived(record: &mut GoalRecord, today: NaiveDate) {
    let months = months_between(today, record.target_date);

    record.timeline = if months <= 12 {
        GoalTimeline::ShortTerm
    } else if months <= 60 {
        GoalTimeline::MediumTerm
    } else {
        GoalTimeline::LongTerm
    };

    let remaining = (record.target_amount - record.current_progress_amount).max(0.0);
    record.monthly_contribution = if months > 0 {
        remaining / months as f64
    } else {
        remaining
    };

    record.progress_percent = if record.target_amount > 0.0 {
        (record.current_progress_amount / record.target_amount * 100.0).min(100.0)
    } else {
        0.0
    };
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

/// Newest-first scan of user turns for an explicit category mention.
fn infer_category_from_context(context: &ContextStore) -> Option<GoalCategory> {
    let recent: Vec<_> = context.recent(10).collect();
    for turn in recent.into_iter().rev() {
        if turn.role != TurnRole::User {
            continue;
        }
        let lowered = turn.text.to_lowercase();
        if lowered.contains("retire") {
            return Some(GoalCategory::Retirement);
        }
        if lowered.contains("house") || lowered.contains("home") {
            return Some(GoalCategory::HousePurchase);
        }
        if lowered.contains("college") || lowered.contains("education") || lowered.contains("tuition")
        {
            return Some(GoalCategory::Education);
        }
        if lowered.contains("emergency") {
            return Some(GoalCategory::EmergencyFund);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, Turn};
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn structured(category: &str, amount: f64, date: NaiveDate) -> AgentResponse {
        let mut fields = BTreeMap::new();
        fields.insert("category".to_string(), FieldValue::Text(category.to_string()));
        fields.insert("target_amount".to_string(), FieldValue::Number(amount));
        fields.insert("target_date".to_string(), FieldValue::Date(date));
        AgentResponse::Structured { fields }
    }

    fn in_days(days: i64) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(days)
    }

    #[test]
    fn test_upsert_creates_proposed_goal() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);

        let touched = manager.extract_and_upsert(
            &structured("house-purchase", 50_000.0, in_days(3 * 365)),
            &context,
        );

        assert_eq!(touched, vec!["GOAL1".to_string()]);
        let record = &manager.snapshot()["GOAL1"];
        assert_eq!(record.status, GoalStatus::Proposed);
        assert_eq!(record.category, GoalCategory::HousePurchase);
        assert_eq!(record.target_amount, 50_000.0);
        assert_eq!(record.timeline, GoalTimeline::MediumTerm);
        assert!(record.monthly_contribution > 0.0);
    }

    #[test]
    fn test_fuzzy_match_updates_existing_goal() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);
        let date = in_days(400);

        manager.extract_and_upsert(&structured("retirement", 100_000.0, date), &context);
        // Same category, date inside the tolerance band: same goal.
        let touched = manager.extract_and_upsert(
            &structured("retirement", 120_000.0, date + Duration::days(15)),
            &context,
        );

        assert_eq!(touched, vec!["GOAL1".to_string()]);
        assert_eq!(manager.snapshot().len(), 1);
        assert_eq!(manager.snapshot()["GOAL1"].target_amount, 120_000.0);
    }

    #[test]
    fn test_distant_date_creates_second_goal() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);

        manager.extract_and_upsert(&structured("retirement", 100_000.0, in_days(400)), &context);
        manager.extract_and_upsert(&structured("retirement", 50_000.0, in_days(900)), &context);

        assert_eq!(manager.snapshot().len(), 2);
    }

    #[test]
    fn test_invalid_amounts_are_dropped() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);

        let touched =
            manager.extract_and_upsert(&structured("retirement", -5.0, in_days(100)), &context);

        assert!(touched.is_empty());
        assert!(manager.snapshot().is_empty());
    }

    #[test]
    fn test_unstructured_responses_never_touch_the_ledger() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);

        let touched = manager.extract_and_upsert(
            &AgentResponse::Unstructured { text: "save more".to_string() },
            &context,
        );

        assert!(touched.is_empty());
    }

    #[test]
    fn test_category_inferred_from_conversation() {
        let mut manager = GoalLedgerManager::new();
        let mut context = ContextStore::new(10);
        context
            .append(Turn::user("I want to buy a house in a few years"))
            .unwrap();

        let mut fields = BTreeMap::new();
        fields.insert("target_amount".to_string(), FieldValue::Number(80_000.0));
        fields.insert("target_date".to_string(), FieldValue::Date(in_days(1000)));
        let response = AgentResponse::Structured { fields };

        let touched = manager.extract_and_upsert(&response, &context);
        assert_eq!(touched.len(), 1);
        assert_eq!(
            manager.snapshot()[&touched[0]].category,
            GoalCategory::HousePurchase
        );
    }

    #[test]
    fn test_transition_happy_path() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);
        manager.extract_and_upsert(&structured("education", 20_000.0, in_days(500)), &context);

        for status in [
            GoalStatus::Confirmed,
            GoalStatus::InProgress,
            GoalStatus::Completed,
        ] {
            assert_eq!(
                manager.transition("GOAL1", status),
                TransitionOutcome::Applied
            );
        }
        assert_eq!(manager.snapshot()["GOAL1"].status, GoalStatus::Completed);
    }

    #[test]
    fn test_transition_cannot_skip_confirmation() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);
        manager.extract_and_upsert(&structured("education", 20_000.0, in_days(500)), &context);

        assert_eq!(
            manager.transition("GOAL1", GoalStatus::InProgress),
            TransitionOutcome::Rejected(TransitionRejection::SkipsStage)
        );
        // Rejection leaves the record unchanged.
        assert_eq!(manager.snapshot()["GOAL1"].status, GoalStatus::Proposed);
    }

    #[test]
    fn test_transition_cannot_reverse() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);
        manager.extract_and_upsert(&structured("education", 20_000.0, in_days(500)), &context);
        manager.transition("GOAL1", GoalStatus::Confirmed);

        assert_eq!(
            manager.transition("GOAL1", GoalStatus::Proposed),
            TransitionOutcome::Rejected(TransitionRejection::CannotRegress)
        );
        assert_eq!(manager.snapshot()["GOAL1"].status, GoalStatus::Confirmed);
    }

    #[test]
    fn test_abandon_from_any_live_state_and_terminal_is_final() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);
        manager.extract_and_upsert(&structured("education", 20_000.0, in_days(500)), &context);

        assert_eq!(
            manager.transition("GOAL1", GoalStatus::Abandoned),
            TransitionOutcome::Applied
        );
        assert_eq!(
            manager.transition("GOAL1", GoalStatus::Confirmed),
            TransitionOutcome::Rejected(TransitionRejection::AlreadyTerminal)
        );
    }

    #[test]
    fn test_unknown_goal_rejection() {
        let mut manager = GoalLedgerManager::new();
        assert_eq!(
            manager.transition("GOAL99", GoalStatus::Confirmed),
            TransitionOutcome::Rejected(TransitionRejection::UnknownGoal)
        );
    }

    #[test]
    fn test_short_timeline_classification() {
        let mut manager = GoalLedgerManager::new();
        let context = ContextStore::new(10);
        manager.extract_and_upsert(&structured("emergency-fund", 5_000.0, in_days(180)), &context);

        let record = &manager.snapshot()["GOAL1"];
        assert_eq!(record.timeline, GoalTimeline::ShortTerm);
    }
}
