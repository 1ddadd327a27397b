//! Startup configuration
//!
//! All endpoint credentials are read once from the environment. Missing or
//! invalid values are fatal here; everything after startup assumes the
//! configuration is valid.

use crate::error::AdvisorError;
use crate::Result;
use std::env;

/// Default number of recent turns included when assembling agent prompts.
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;
/// Context store starts pruning once history grows past this many turns.
pub const DEFAULT_MAX_HISTORY: usize = 50;
/// Per-call timeout for the completion and embedding endpoints.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Chat-completions endpoint URL.
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    /// Embedding model served from the same endpoint family.
    pub embedding_model: String,
    /// Directory holding the synthetic CSV fixtures.
    pub data_path: String,
    pub context_window: usize,
    pub max_history: usize,
    pub request_timeout_secs: u64,
}

impl Config {
    /// Read configuration from the environment. `.env` files are honored via
    /// `dotenv` in the binaries before this is called.
    pub fn from_env() -> Result<Self> {
        let llm_api_url = require("ADVISOR_LLM_API_URL")?;
        let llm_api_key = require("ADVISOR_LLM_API_KEY")?;
        let llm_model = require("ADVISOR_LLM_MODEL")?;

        let embedding_model = env::var("ADVISOR_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let data_path = env::var("ADVISOR_DATA_PATH").unwrap_or_else(|_| "./data".to_string());

        let context_window = parse_var("ADVISOR_CONTEXT_WINDOW", DEFAULT_CONTEXT_WINDOW)?;
        let max_history = parse_var("ADVISOR_MAX_HISTORY", DEFAULT_MAX_HISTORY)?;
        let request_timeout_secs =
            parse_var("ADVISOR_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        if max_history == 0 {
            return Err(AdvisorError::ConfigurationError(
                "ADVISOR_MAX_HISTORY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            llm_api_url,
            llm_api_key,
            llm_model,
            embedding_model,
            data_path,
            context_window,
            max_history,
            request_timeout_secs,
        })
    }
}

fn require(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AdvisorError::ConfigurationError(format!(
            "Missing required environment variable {}. \
             Ensure ADVISOR_LLM_API_URL, ADVISOR_LLM_API_KEY and ADVISOR_LLM_MODEL are set.",
            name
        ))),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| {
            AdvisorError::ConfigurationError(format!("Invalid value for {}: {}", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_are_fatal() {
        env::remove_var("ADVISOR_LLM_API_URL");
        env::remove_var("ADVISOR_LLM_API_KEY");
        env::remove_var("ADVISOR_LLM_MODEL");

        let result = Config::from_env();
        assert!(result.is_err());
        let message = result.unwrap_err().to_string();
        assert!(message.contains("ADVISOR_LLM"));
    }
}
