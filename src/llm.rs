//! Completion and embedding endpoint clients
//!
//! Uses a long-lived reqwest::Client for connection pooling. Every call
//! carries a bounded timeout; transient failures surface as classified
//! errors so callers can retry once and then degrade.

use crate::error::AdvisorError;
use crate::Config;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

/// One role-tagged message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Reusable completion-endpoint client (connection-pooled).
pub struct ChatClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    timeout_secs: u64,
}

impl ChatClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                AdvisorError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_url: config.llm_api_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            embedding_model: config.embedding_model.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Single completion attempt. Network failures, non-2xx statuses and
    /// empty completions all map to classified errors, never panics.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("Completion request timed out");
                    AdvisorError::RemoteTimeout(self.timeout_secs)
                } else {
                    error!("Completion request failed: {}", e);
                    AdvisorError::CompletionError(format!("request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Completion endpoint returned {}: {}", status, body);
            return Err(AdvisorError::CompletionError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            AdvisorError::CompletionError(format!("unreadable response body: {}", e))
        })?;

        let text = completion
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AdvisorError::CompletionError(
                "empty completion".to_string(),
            ));
        }

        Ok(text)
    }

    /// Completion with the bounded retry policy: one retry on a transient
    /// failure, then the error is returned for the caller to degrade on.
    pub async fn complete_with_retry(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        match self.complete(messages.clone(), temperature, max_tokens).await {
            Ok(text) => Ok(text),
            Err(e) if e.is_transient() => {
                info!("Retrying completion after transient failure: {}", e);
                self.complete(messages, temperature, max_tokens).await
            }
            Err(e) => Err(e),
        }
    }

    /// Embed a single text. Treated as a pure function with the same failure
    /// classification as completions.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: input.to_string(),
        };

        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdvisorError::RemoteTimeout(self.timeout_secs)
                } else {
                    AdvisorError::EmbeddingError(format!("request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AdvisorError::EmbeddingError(format!("status {}", status)));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AdvisorError::EmbeddingError(format!("unreadable response body: {}", e))
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AdvisorError::EmbeddingError("empty embedding response".to_string()))
    }

    /// The embeddings route lives next to the chat-completions route on
    /// OpenAI-compatible endpoints.
    fn embeddings_url(&self) -> String {
        match self.api_url.strip_suffix("/chat/completions") {
            Some(base) => format!("{}/embeddings", base),
            None => format!("{}/embeddings", self.api_url),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = CompletionRequest {
            model: "advisor-model".to_string(),
            messages: vec![
                ChatMessage::system("You are a financial advisor"),
                ChatMessage::user("What is an index fund?"),
            ],
            temperature: 0.0,
            max_tokens: 512,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("index fund"));
        assert!(json.contains("\"role\":\"system\""));
    }

    #[test]
    fn test_embeddings_url_derivation() {
        let urls = [
            (
                "https://api.example.com/v1/chat/completions",
                "https://api.example.com/v1/embeddings",
            ),
            (
                "https://api.example.com/v1",
                "https://api.example.com/v1/embeddings",
            ),
        ];

        for (api_url, expected) in urls {
            let client = ChatClient {
                client: Client::new(),
                api_url: api_url.to_string(),
                api_key: "k".to_string(),
                model: "m".to_string(),
                embedding_model: "e".to_string(),
                timeout_secs: 30,
            };
            assert_eq!(client.embeddings_url(), expected);
        }
    }
}
