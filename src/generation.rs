//! Answer generation from a query and retrieved context
//!
//! The session only sees the [`Generator`] trait. [`KeywordGenerator`] is a
//! deterministic stand-in; [`OllamaGenerator`] calls a local LLM.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

/// Answer used when no keyword rule matches
pub const DEFAULT_FALLBACK: &str =
    "I couldn't find enough information about that in my knowledge base to give an accurate answer.";

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama model
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:1b";

/// Produces an answer for `query` grounded in `context`
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer
    ///
    /// `context` is ordered nearest-first.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails
    async fn generate(&self, query: &str, context: &[String]) -> Result<String>;
}

/// A canned answer triggered by any of its keywords
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordRule {
    /// Keywords searched for in the joined context (case-insensitive)
    pub keywords: Vec<String>,
    /// Answer returned when a keyword is present
    pub answer: String,
}

impl KeywordRule {
    /// Create a rule
    #[must_use]
    pub fn new(keywords: &[&str], answer: &str) -> Self {
        Self {
            keywords: keywords.iter().map(ToString::to_string).collect(),
            answer: answer.to_string(),
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| haystack.contains(&k.to_lowercase()))
    }
}

/// Deterministic keyword-matching generator
///
/// Rules are checked in order against the concatenated context; the first
/// rule with a matching keyword wins. Without a match the fallback answer
/// is returned.
#[derive(Debug, Clone)]
pub struct KeywordGenerator {
    rules: Vec<KeywordRule>,
    fallback: String,
}

impl KeywordGenerator {
    /// Create a generator from explicit rules
    #[must_use]
    pub const fn new(rules: Vec<KeywordRule>, fallback: String) -> Self {
        Self { rules, fallback }
    }

    /// Rules answering questions about the bundled photosynthesis corpus
    #[must_use]
    pub fn photosynthesis() -> Self {
        Self::new(
            vec![
                KeywordRule::new(
                    &["glucose", "oxygen"],
                    "According to my knowledge, photosynthesis mainly produces glucose, \
                     which the plant uses as energy, and oxygen, which is released into \
                     the atmosphere.",
                ),
                KeywordRule::new(
                    &["chloroplasts", "chlorophyll"],
                    "Photosynthesis happens inside structures called chloroplasts, which \
                     contain chlorophyll, the pigment that captures sunlight.",
                ),
            ],
            DEFAULT_FALLBACK.to_string(),
        )
    }

    /// Answer synchronously
    #[must_use]
    pub fn answer(&self, context: &[String]) -> &str {
        let joined = context.join("\n- ").to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&joined))
            .map_or(self.fallback.as_str(), |rule| rule.answer.as_str())
    }
}

impl Default for KeywordGenerator {
    fn default() -> Self {
        Self::photosynthesis()
    }
}

#[async_trait]
impl Generator for KeywordGenerator {
    async fn generate(&self, query: &str, context: &[String]) -> Result<String> {
        let answer = self.answer(context);
        tracing::debug!(query, context = context.len(), "keyword generator answered");
        Ok(answer.to_string())
    }
}

/// Generator backed by a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    /// Create a generator for `model` served at `base_url`
    #[must_use]
    pub fn new(base_url: &str, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, query: &str, context: &[String]) -> Result<String> {
        #[derive(serde::Serialize)]
        struct GenerateRequest<'a> {
            model: &'a str,
            prompt: String,
            stream: bool,
        }

        #[derive(Deserialize)]
        struct GenerateResponse {
            response: String,
        }

        let request = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(query, context),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("Ollama error {status}: {body}")));
        }

        let result: GenerateResponse = response.json().await?;
        let answer = result.response.trim().to_string();
        if answer.is_empty() {
            return Err(Error::Generation("Ollama returned an empty answer".to_string()));
        }

        tracing::debug!(model = %self.model, answer_len = answer.len(), "ollama answered");
        Ok(answer)
    }
}

/// Build a grounded prompt from the query and ranked context
#[must_use]
pub fn build_prompt(query: &str, context: &[String]) -> String {
    let context = if context.is_empty() {
        "(no relevant context)".to_string()
    } else {
        context
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Answer the question using only the context below. \
         If the context does not contain the answer, say so. \
         Keep the answer short enough to be spoken aloud.\n\n\
         Context:\n{context}\n\nQuestion: {query}\n\nAnswer:"
    )
}
