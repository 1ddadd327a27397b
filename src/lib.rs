//! Personal Finance Advisor
//!
//! A conversational financial advisor that:
//! - Routes each user turn to domain-specialized LLM agents
//! - Maintains conversational context and a goal ledger across turns
//! - Validates and repairs structured model output before trusting it
//! - Degrades gracefully when the completion endpoint misbehaves
//!
//! TURN LOOP:
//! INPUT → REWRITE → ROUTE → INVOKE AGENTS → INTERPRET → LEDGER → REPLY

pub mod agents;
pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod interpreter;
pub mod ledger;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod reference;
pub mod router;

pub use config::Config;
pub use error::{AdvisorError, Result};

// Re-export common types
pub use models::*;
pub use orchestrator::{FinancialAdvisor, Session};
pub use router::Router;
