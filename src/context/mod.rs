//! Conversation context
//!
//! Ordered turn history for a session plus rewriting of context-dependent
//! follow-up queries into standalone ones.

pub mod rewriter;
pub mod store;

pub use rewriter::QueryRewriter;
pub use store::ContextStore;
