use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;

/// One piece of a multi-part model reply. Parts without text (tool calls,
/// images, ...) carry `None` and are skipped when the reply is flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFragment {
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// What a provider hands back: a plain string or a list of fragments.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    Text(String),
    Fragments(Vec<ContentFragment>),
}

impl LlmResponse {
    /// Normalizes both shapes to a single trimmed string.
    pub fn text(&self) -> String {
        match self {
            LlmResponse::Text(text) => text.trim().to_string(),
            LlmResponse::Fragments(parts) => parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<String>()
                .trim()
                .to_string(),
        }
    }
}

impl From<String> for LlmResponse {
    fn from(value: String) -> Self {
        LlmResponse::Text(value)
    }
}

/// A single-call text completion capability.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider key this client was acquired under, used for logs and errors.
    fn provider(&self) -> &str;

    async fn invoke(&self, prompt: &str) -> Result<LlmResponse>;
}

/// Resolves provider keys to ready-to-use clients.
pub trait LlmRegistry: Send + Sync {
    /// Looks up `key` case-insensitively. Unknown keys fail with
    /// [`Error::UnsupportedProvider`](crate::core::error::Error::UnsupportedProvider).
    fn acquire(&self, key: &str) -> Result<Arc<dyn LlmClient>>;

    /// Whether `key` names a configured provider.
    fn supports(&self, key: &str) -> bool;

    /// The fixed provider discovery falls back to. Must not fail.
    fn discovery_fallback(&self) -> Arc<dyn LlmClient>;

    /// Acquisition used by discovery: any failure is replaced by the fallback.
    fn acquire_discovery(&self, key: &str) -> Arc<dyn LlmClient> {
        match self.acquire(key) {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(
                    provider = key,
                    error = %err,
                    "discovery provider unavailable, using fallback"
                );
                self.discovery_fallback()
            }
        }
    }
}

/// A fetched web page.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Network preflight used by company verification.
#[async_trait]
pub trait SiteProbe: Send + Sync {
    /// Whether `hostname` resolves to at least one address.
    async fn resolves(&self, hostname: &str) -> bool;

    /// GETs `url`. Transport failures are errors; HTTP error statuses are not.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Abstraction for rendering prompt templates.
pub trait PromptRenderer: Send + Sync {
    /// Render a template source with the given data.
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_response_is_trimmed() {
        let response = LlmResponse::Text("  [\"a\"]\n".into());
        assert_eq!(response.text(), "[\"a\"]");
    }

    #[test]
    fn fragments_are_concatenated_skipping_textless_parts() {
        let response = LlmResponse::Fragments(vec![
            ContentFragment::text("[\"Phones\", "),
            ContentFragment { text: None },
            ContentFragment::text("\"Tablets\"]"),
        ]);
        assert_eq!(response.text(), "[\"Phones\", \"Tablets\"]");
    }
}
