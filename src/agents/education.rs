//! Education agent
//!
//! Free-form explanations of financial concepts, grounded where possible in
//! a small reference library. The best-matching library entry is chosen by
//! embedding similarity, with a keyword fallback when the embedding endpoint
//! is unavailable. No schema: output is always unstructured prose.

use crate::agents::{context_sections, repair_section, PromptContext, SpecializedAgent};
use crate::interpreter::ResponseSchema;
use crate::llm::{ChatClient, ChatMessage};
use crate::models::AgentId;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are an expert financial educator who explains complex \
financial concepts in simple, accessible language with concrete examples. You are factual \
and educational; you do not make specific investment recommendations or market predictions.";

struct ReferenceTopic {
    title: &'static str,
    summary: &'static str,
    keywords: &'static [&'static str],
}

const TOPIC_LIBRARY: &[ReferenceTopic] = &[
    ReferenceTopic {
        title: "compound interest",
        summary: "Interest earned on both the principal and previously earned interest. \
                  Growth accelerates over time, which is why starting early matters more \
                  than contribution size for long horizons.",
        keywords: &["compound", "interest", "growth"],
    },
    ReferenceTopic {
        title: "asset allocation",
        summary: "How a portfolio is split across stocks, bonds, cash and other classes. \
                  The split drives most of a portfolio's risk and return; it is usually \
                  matched to risk tolerance and time horizon.",
        keywords: &["allocation", "portfolio", "diversif", "stocks", "bonds"],
    },
    ReferenceTopic {
        title: "emergency fund",
        summary: "Liquid savings covering three to six months of expenses, held in cash \
                  or equivalents. It prevents forced selling of investments or taking on \
                  debt when income is interrupted.",
        keywords: &["emergency", "rainy day", "liquid"],
    },
    ReferenceTopic {
        title: "index funds and ETFs",
        summary: "Pooled funds that track a market index at low cost. They provide broad \
                  diversification in a single holding and typically outperform most \
                  actively managed funds after fees.",
        keywords: &["index", "etf", "fund", "passive"],
    },
    ReferenceTopic {
        title: "dollar-cost averaging",
        summary: "Investing a fixed amount on a regular schedule regardless of price. It \
                  smooths the purchase price over time and removes the temptation to time \
                  the market.",
        keywords: &["dollar-cost", "dca", "regular investing", "timing"],
    },
    ReferenceTopic {
        title: "retirement accounts",
        summary: "Tax-advantaged vehicles for long-term savings. Contributions may be \
                  pre-tax or post-tax; the tax treatment and withdrawal rules differ, but \
                  both reward long holding periods.",
        keywords: &["retirement", "401k", "ira", "pension"],
    },
];

pub struct EducationAgent {
    client: Arc<ChatClient>,
    topic_embeddings: OnceCell<Vec<Vec<f32>>>,
}

impl EducationAgent {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client, topic_embeddings: OnceCell::new() }
    }

    /// Rank library entries against the query by embedding similarity;
    /// fall back to keyword matching when the endpoint fails.
    async fn select_topic(&self, query: &str) -> Option<&'static ReferenceTopic> {
        match self.select_by_embedding(query).await {
            Ok(topic) => topic,
            Err(e) => {
                warn!("Embedding retrieval failed, using keyword match: {}", e);
                select_by_keywords(query)
            }
        }
    }

    async fn select_by_embedding(&self, query: &str) -> Result<Option<&'static ReferenceTopic>> {
        let topic_embeddings = self
            .topic_embeddings
            .get_or_try_init(|| async {
                let mut embeddings = Vec::with_capacity(TOPIC_LIBRARY.len());
                for topic in TOPIC_LIBRARY {
                    embeddings.push(self.client.embed(topic.summary).await?);
                }
                Ok::<_, crate::error::AdvisorError>(embeddings)
            })
            .await?;

        let query_embedding = self.client.embed(query).await?;

        let best = topic_embeddings
            .iter()
            .enumerate()
            .map(|(i, emb)| (i, cosine_similarity(&query_embedding, emb)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        Ok(best
            .filter(|(_, score)| *score > 0.3)
            .map(|(i, _)| &TOPIC_LIBRARY[i]))
    }
}

#[async_trait]
impl SpecializedAgent for EducationAgent {
    fn id(&self) -> AgentId {
        AgentId::Education
    }

    fn schema(&self) -> Option<&ResponseSchema> {
        None
    }

    async fn invoke(&self, ctx: &PromptContext) -> Result<String> {
        let grounding = match self.select_topic(&ctx.query).await {
            Some(topic) => format!(
                "Reference material on {}:\n{}\n\n",
                topic.title, topic.summary
            ),
            None => String::new(),
        };

        let prompt = format!(
            r#"{context}{grounding}The user asked: "{query}"

Explain the financial concept they are asking about in clear, accessible language:
1. A plain-language definition
2. A concrete example with numbers
3. Why it matters for personal finance decisions
Keep it under 250 words.{repair}"#,
            context = context_sections(ctx),
            grounding = grounding,
            query = ctx.query,
            repair = repair_section(ctx),
        );

        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        self.client.complete_with_retry(messages, 0.2, 800).await
    }
}

fn select_by_keywords(query: &str) -> Option<&'static ReferenceTopic> {
    let lowered = query.to_lowercase();
    TOPIC_LIBRARY
        .iter()
        .find(|topic| topic.keywords.iter().any(|kw| lowered.contains(kw)))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_fallback_selection() {
        let topic = select_by_keywords("what is an ETF?").unwrap();
        assert_eq!(topic.title, "index funds and ETFs");

        assert!(select_by_keywords("tell me a joke").is_none());
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[]), 0.0);
    }
}
