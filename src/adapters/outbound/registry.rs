use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    config::{ProviderConfig, ProviderKind},
    core::{
        domain::normalize_model_key,
        error::{Error as CoreError, Result},
        ports::{LlmClient, LlmRegistry},
    },
};

use super::{
    azure::AzureRestClient,
    llm::{GenerationOptions, RigBackend, RigLlmClient, UnavailableClient},
};

const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";
const FALLBACK_PROVIDER: &str = "gemini";
const FALLBACK_TEMPERATURE: f64 = 0.2;
const FALLBACK_MAX_TOKENS: u64 = 1024;

pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builds clients for configured providers on demand. Credentials are read
/// through `env` at acquisition time, so a missing key only fails the call
/// that needs it.
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderConfig>,
    http_client: reqwest::Client,
    env: EnvLookup,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new(providers: BTreeMap<String, ProviderConfig>, http_client: reqwest::Client) -> Self {
        Self::with_env(
            providers,
            http_client,
            Arc::new(|name: &str| std::env::var(name).ok()),
        )
    }

    pub fn with_env(
        providers: BTreeMap<String, ProviderConfig>,
        http_client: reqwest::Client,
        env: EnvLookup,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|(key, config)| (normalize_model_key(&key), config))
            .collect();
        Self {
            providers,
            http_client,
            env,
        }
    }

    pub fn provider_keys(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    fn require_env(&self, provider: &str, var: &str) -> Result<String> {
        (self.env)(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                CoreError::Config(format!("provider '{provider}' requires {var} to be set"))
            })
    }

    fn build(&self, key: &str, config: &ProviderConfig) -> Result<Arc<dyn LlmClient>> {
        let options = GenerationOptions {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };
        let api_key = self.require_env(key, config.api_key_env())?;
        match config.kind {
            ProviderKind::Openai | ProviderKind::Gemini => {
                let backend = if config.kind == ProviderKind::Openai {
                    RigBackend::Openai
                } else {
                    RigBackend::Gemini
                };
                let client = RigLlmClient::new(
                    key,
                    backend,
                    api_key,
                    config.model(),
                    options,
                    self.http_client.clone(),
                )
                .map_err(|err| CoreError::Config(format!("provider '{key}': {err}")))?;
                Ok(Arc::new(client))
            }
            ProviderKind::AzureRest => {
                let endpoint = self.require_env(key, config.endpoint_env())?;
                let deployment = self.require_env(key, config.deployment_env())?;
                let api_version = config
                    .api_version
                    .clone()
                    .or_else(|| (self.env)("OPENAI_API_VERSION"))
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());
                let client = AzureRestClient::new(
                    key,
                    &endpoint,
                    &deployment,
                    &api_version,
                    api_key,
                    options,
                    self.http_client.clone(),
                )?;
                Ok(Arc::new(client))
            }
        }
    }
}

impl LlmRegistry for ProviderRegistry {
    fn acquire(&self, key: &str) -> Result<Arc<dyn LlmClient>> {
        let key = normalize_model_key(key);
        let config = self
            .providers
            .get(&key)
            .ok_or_else(|| CoreError::UnsupportedProvider(key.clone()))?;
        self.build(&key, config)
    }

    fn supports(&self, key: &str) -> bool {
        self.providers.contains_key(&normalize_model_key(key))
    }

    fn discovery_fallback(&self) -> Arc<dyn LlmClient> {
        let config = ProviderConfig {
            temperature: Some(FALLBACK_TEMPERATURE),
            max_tokens: Some(FALLBACK_MAX_TOKENS),
            ..ProviderConfig::new(ProviderKind::Gemini)
        };
        match self.build(FALLBACK_PROVIDER, &config) {
            Ok(client) => client,
            Err(err) => Arc::new(UnavailableClient::new(FALLBACK_PROVIDER, err.to_string())),
        }
    }
}
