//! Turn routing
//!
//! Classifies each user utterance against fixed keyword sets to decide which
//! specialized agents handle it. When several categories match, agents run
//! in a total priority order (goal planning > asset allocation > transaction
//! analysis > education); when none match, the turn falls back to the
//! generic advisory pass. Same utterance in, same decision out.

use crate::models::{AgentId, RoutingDecision, RoutingRationale};

/// Static keyword lists — zero allocation
const GOAL_KEYWORDS: &[&str] = &[
    "goal", "save", "saving", "target", "retire", "retirement",
    "college", "tuition", "house", "home", "car", "vacation", "wedding",
    "emergency", "down payment",
];

const ALLOCATION_KEYWORDS: &[&str] = &[
    "invest", "investing", "investment", "portfolio", "stock", "bond",
    "asset", "allocation", "allocate", "etf", "mutual fund", "diversif",
    "rebalance", "risk profile",
];

const TRANSACTION_KEYWORDS: &[&str] = &[
    "spend", "spending", "transaction", "purchase", "bought", "budget",
    "expense", "bill", "subscription", "paid", "merchant", "charge",
];

const EDUCATION_KEYWORDS: &[&str] = &[
    "what is", "what are", "how does", "how do", "explain", "define",
    "difference between", "understand", "concept", "mean",
];

/// Phrases that name a goal intent outright. These route straight to goal
/// planning alone, mirroring the dedicated goal-intent check the advisor
/// runs before general classification.
const EXPLICIT_GOAL_PHRASES: &[&str] = &[
    "save for", "saving for", "create a goal", "set up a goal", "new goal",
    "start a goal", "savings goal", "emergency fund", "college fund",
    "retirement fund", "travel fund", "update my goal", "delete my goal",
    "my goals",
];

/// Deterministic keyword router.
pub struct Router;

impl Router {
    /// Classify one utterance. Computed fresh each turn; never persisted.
    pub fn classify(utterance: &str) -> RoutingDecision {
        let lowered = utterance.to_lowercase();

        // "save $50,000 for a house" names a goal as plainly as "save for a
        // house" does; catch the amount-in-the-middle form too.
        let save_for_something = lowered.contains("save")
            && (lowered.contains(" for a ") || lowered.contains(" for my "));

        if save_for_something || EXPLICIT_GOAL_PHRASES.iter().any(|p| lowered.contains(p)) {
            return RoutingDecision {
                agents: vec![AgentId::GoalPlanning],
                rationale: RoutingRationale::ExplicitGoalCategory,
            };
        }

        let contains_any = |keywords: &[&str]| keywords.iter().any(|kw| lowered.contains(kw));

        let mut agents = Vec::new();
        if contains_any(GOAL_KEYWORDS) {
            agents.push(AgentId::GoalPlanning);
        }
        if contains_any(ALLOCATION_KEYWORDS) {
            agents.push(AgentId::AssetAllocation);
        }
        if contains_any(TRANSACTION_KEYWORDS) {
            agents.push(AgentId::TransactionAnalysis);
        }
        if contains_any(EDUCATION_KEYWORDS) {
            agents.push(AgentId::Education);
        }

        if agents.is_empty() {
            return RoutingDecision {
                agents: vec![AgentId::Advisor],
                rationale: RoutingRationale::FallbackToAdvisor,
            };
        }

        // Push order above already matches AgentId's priority order; the sort
        // keeps the invariant explicit rather than positional.
        agents.sort();

        RoutingDecision {
            agents,
            rationale: RoutingRationale::KeywordMatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_goal_routes_alone() {
        let decision = Router::classify("I want to save $50,000 for a house in 3 years");
        assert_eq!(decision.agents, vec![AgentId::GoalPlanning]);
        assert_eq!(decision.rationale, RoutingRationale::ExplicitGoalCategory);
    }

    #[test]
    fn test_multi_category_respects_priority_order() {
        let decision =
            Router::classify("Given my retirement goal, how should I invest my portfolio?");
        assert_eq!(
            decision.agents,
            vec![AgentId::GoalPlanning, AgentId::AssetAllocation]
        );
        assert_eq!(decision.rationale, RoutingRationale::KeywordMatch);
    }

    #[test]
    fn test_education_queries() {
        let decision = Router::classify("explain compound interest");
        assert_eq!(decision.agents, vec![AgentId::Education]);
    }

    #[test]
    fn test_transaction_queries() {
        let decision = Router::classify("how much did I spend on subscriptions last month?");
        assert_eq!(
            decision.agents,
            vec![AgentId::TransactionAnalysis]
        );
    }

    #[test]
    fn test_fallback_to_advisor() {
        let decision = Router::classify("hello there");
        assert_eq!(decision.agents, vec![AgentId::Advisor]);
        assert_eq!(decision.rationale, RoutingRationale::FallbackToAdvisor);
    }

    #[test]
    fn test_routing_is_deterministic() {
        let utterances = [
            "I want to save $50,000 for a house in 3 years",
            "what is an ETF and should I budget for it?",
            "rebalance my portfolio",
            "good morning",
        ];

        for utterance in utterances {
            let first = Router::classify(utterance);
            let second = Router::classify(utterance);
            assert_eq!(first, second, "nondeterministic routing for: {}", utterance);
        }
    }
}
