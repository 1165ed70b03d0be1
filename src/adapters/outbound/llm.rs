use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rig::{
    client::CompletionClient,
    completion::Prompt,
    providers::{gemini, openai},
};

use crate::core::error::Error as CoreError;
use crate::core::ports::{LlmClient, LlmResponse};

/// Chat backends reached through `rig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigBackend {
    Openai,
    Gemini,
}

impl RigBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            RigBackend::Openai => "openai",
            RigBackend::Gemini => "gemini",
        }
    }
}

/// Sampling knobs forwarded to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

/// Concrete [`LlmClient`] backed by one of `rig`'s chat providers.
#[derive(Clone)]
pub struct RigLlmClient {
    inner: Arc<RigLlmClientInner>,
}

struct RigLlmClientInner {
    provider: String,
    backend: RigBackend,
    model: String,
    api_key: String,
    options: GenerationOptions,
    http_client: reqwest::Client,
}

impl RigLlmClient {
    pub fn new(
        provider: impl Into<String>,
        backend: RigBackend,
        api_key: impl Into<String>,
        model: impl Into<String>,
        options: GenerationOptions,
        http_client: reqwest::Client,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(anyhow!("API key may not be empty"));
        }

        let model = model.into();
        if model.trim().is_empty() {
            return Err(anyhow!("Model identifier may not be empty"));
        }

        Ok(Self {
            inner: Arc::new(RigLlmClientInner {
                provider: provider.into(),
                backend,
                model,
                api_key,
                options,
                http_client,
            }),
        })
    }

    pub fn model(&self) -> &str {
        &self.inner.model
    }
}

impl std::fmt::Debug for RigLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigLlmClient")
            .field("provider", &self.inner.provider)
            .field("backend", &self.inner.backend)
            .field("model", &self.inner.model)
            .finish()
    }
}

#[async_trait]
impl LlmClient for RigLlmClient {
    fn provider(&self) -> &str {
        &self.inner.provider
    }

    async fn invoke(&self, prompt: &str) -> crate::core::Result<LlmResponse> {
        tracing::debug!(
            provider = %self.inner.provider,
            model = %self.inner.model,
            prompt_chars = prompt.len(),
            "invoking chat model"
        );
        self.prompt_once(prompt)
            .await
            .map(LlmResponse::Text)
            .map_err(|err| CoreError::llm(&self.inner.provider, err.to_string()))
    }
}

impl RigLlmClient {
    async fn prompt_once(&self, prompt: &str) -> Result<String> {
        let inner = &self.inner;
        match inner.backend {
            RigBackend::Openai => {
                let client: openai::Client<reqwest::Client> =
                    openai::Client::<reqwest::Client>::builder()
                        .api_key(&inner.api_key)
                        .http_client(inner.http_client.clone())
                        .build()
                        .map_err(|err| anyhow!("Failed to create OpenAI client: {err}"))?;

                let mut agent_builder = client.agent(&inner.model);
                if let Some(temp) = inner.options.temperature {
                    agent_builder = agent_builder.temperature(temp);
                }
                if let Some(max) = inner.options.max_tokens {
                    agent_builder = agent_builder.max_tokens(max);
                }
                agent_builder
                    .build()
                    .prompt(prompt)
                    .await
                    .map_err(|err| anyhow!("OpenAI prompt error: {err}"))
            }
            RigBackend::Gemini => {
                let client: gemini::Client<reqwest::Client> =
                    gemini::Client::<reqwest::Client>::builder()
                        .api_key(&inner.api_key)
                        .http_client(inner.http_client.clone())
                        .build()
                        .map_err(|err| anyhow!("Failed to create Gemini client: {err}"))?;

                let mut agent_builder = client.agent(&inner.model);
                if let Some(temp) = inner.options.temperature {
                    agent_builder = agent_builder.temperature(temp);
                }
                if let Some(max) = inner.options.max_tokens {
                    agent_builder = agent_builder.max_tokens(max);
                }
                agent_builder
                    .build()
                    .prompt(prompt)
                    .await
                    .map_err(|err| anyhow!("Gemini prompt error: {err}"))
            }
        }
    }
}

/// Stand-in returned when a provider cannot be constructed but a client must
/// still be handed out. Every call fails with the construction error.
#[derive(Debug, Clone)]
pub struct UnavailableClient {
    provider: String,
    reason: String,
}

impl UnavailableClient {
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LlmClient for UnavailableClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn invoke(&self, _prompt: &str) -> crate::core::Result<LlmResponse> {
        Err(CoreError::Config(format!(
            "provider '{}' is unavailable: {}",
            self.provider, self.reason
        )))
    }
}

/// Builder every outbound HTTP client starts from.
pub fn http_client_builder() -> reqwest::ClientBuilder {
    // `reqwest::Client::default()` can consult OS-level proxy settings, which is
    // known to panic in some sandboxes. Opt back in with GEOINTEL_ENABLE_SYSTEM_PROXY=1.
    let builder = reqwest::Client::builder();
    if std::env::var_os("GEOINTEL_ENABLE_SYSTEM_PROXY").is_none() {
        builder.no_proxy()
    } else {
        builder
    }
}

/// HTTP client shared by the LLM adapters.
pub fn build_http_client() -> Result<reqwest::Client> {
    http_client_builder()
        .build()
        .map_err(|err| anyhow!("Failed to build HTTP client: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        let err = RigLlmClient::new(
            "openai",
            RigBackend::Openai,
            "   ",
            "gpt-4o-mini",
            GenerationOptions::default(),
            reqwest::Client::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn rejects_empty_model() {
        let err = RigLlmClient::new(
            "gemini",
            RigBackend::Gemini,
            "key",
            "  ",
            GenerationOptions::default(),
            reqwest::Client::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Model"));
    }

    #[tokio::test]
    async fn unavailable_client_reports_its_reason() {
        let client = UnavailableClient::new("gemini", "GEMINI_API_KEY is not set");
        let err = client.invoke("hello").await.unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert_eq!(client.provider(), "gemini");
    }
}
