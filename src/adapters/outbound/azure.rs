//! Azure OpenAI chat completions over plain REST.
//!
//! No SDK: the request body is built by hand and the reply is picked apart
//! field by field. `choices[0].message.content` is either a string or a list
//! of content parts, which maps onto the two [`LlmResponse`] shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::{Error as CoreError, Result};
use crate::core::ports::{ContentFragment, LlmClient, LlmResponse};

use super::llm::GenerationOptions;

/// Longest slice of an error body echoed back in error messages.
const ERROR_BODY_PREVIEW: usize = 300;

#[derive(Debug, Clone)]
pub struct AzureRestClient {
    provider: String,
    url: String,
    api_key: String,
    options: GenerationOptions,
    client: reqwest::Client,
}

impl AzureRestClient {
    pub fn new(
        provider: impl Into<String>,
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: impl Into<String>,
        options: GenerationOptions,
        client: reqwest::Client,
    ) -> Result<Self> {
        let provider = provider.into();
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(CoreError::Config(format!(
                "provider '{provider}' needs an endpoint"
            )));
        }
        if deployment.trim().is_empty() {
            return Err(CoreError::Config(format!(
                "provider '{provider}' needs a deployment name"
            )));
        }
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CoreError::Config(format!(
                "provider '{provider}' needs an API key"
            )));
        }

        Ok(Self {
            url: format!(
                "{endpoint}/openai/deployments/{}/chat/completions?api-version={}",
                deployment.trim(),
                api_version.trim()
            ),
            provider,
            api_key,
            options,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    messages: [ApiMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Value,
}

#[async_trait]
impl LlmClient for AzureRestClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn invoke(&self, prompt: &str) -> Result<LlmResponse> {
        let body = ChatApiRequest {
            messages: [ApiMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        };

        tracing::debug!(
            provider = %self.provider,
            prompt_chars = prompt.len(),
            "invoking azure chat completion"
        );
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| CoreError::llm(&self.provider, format!("request failed: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| CoreError::llm(&self.provider, format!("reading body failed: {err}")))?;

        if !status.is_success() {
            let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(CoreError::llm(
                &self.provider,
                format!("HTTP {}: {preview}", status.as_u16()),
            ));
        }

        let parsed: ChatApiResponse = serde_json::from_str(&text).map_err(|err| {
            CoreError::llm(&self.provider, format!("invalid response JSON: {err}"))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .unwrap_or(Value::Null);

        content_to_response(content)
            .ok_or_else(|| CoreError::llm(&self.provider, "response carried no message content"))
    }
}

fn content_to_response(content: Value) -> Option<LlmResponse> {
    match content {
        Value::String(text) => Some(LlmResponse::Text(text)),
        Value::Array(parts) => Some(LlmResponse::Fragments(
            parts
                .into_iter()
                .map(|part| match part {
                    Value::String(text) => ContentFragment::text(text),
                    Value::Object(map) => ContentFragment {
                        text: map.get("text").and_then(Value::as_str).map(str::to_string),
                    },
                    _ => ContentFragment { text: None },
                })
                .collect(),
        )),
        _ => None,
    }
}
