use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, ensure};
use serde::Deserialize;

use crate::{
    application::templates::PromptTemplates,
    core::{
        config::{ExecutionFailurePolicy, PipelineSettings},
        domain::normalize_model_key,
    },
};

/// Top-level configuration. Every section is optional; missing sections use
/// the built-in defaults.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeoConfig {
    pub providers: BTreeMap<String, ProviderConfig>,
    pub discovery: DiscoveryConfig,
    pub analysis: AnalysisConfig,
    pub content: ContentConfig,
    pub limits: LimitsConfig,
    pub templates: TemplatesConfig,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            discovery: DiscoveryConfig::default(),
            analysis: AnalysisConfig::default(),
            content: ContentConfig::default(),
            limits: LimitsConfig::default(),
            templates: TemplatesConfig::default(),
        }
    }
}

impl GeoConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let raw = fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file at {}", path_ref.display()))?;
        let mut config = Self::from_yaml_str(&raw)
            .with_context(|| format!("Invalid configuration in {}", path_ref.display()))?;
        let base_dir = path_ref.parent().unwrap_or_else(|| Path::new("."));
        config
            .templates
            .hydrate(base_dir)
            .with_context(|| format!("Failed to hydrate templates for {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml).context("Unable to parse config YAML")?;
        config.providers = config
            .providers
            .into_iter()
            .map(|(key, provider)| (normalize_model_key(&key), provider))
            .collect();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.providers.is_empty(),
            "Configuration must define at least one provider"
        );
        for (name, provider) in &self.providers {
            provider
                .validate()
                .with_context(|| format!("Provider '{name}' failed validation"))?;
        }
        for (role, key) in [
            ("discovery.provider", &self.discovery.provider),
            ("analysis.evaluator", &self.analysis.evaluator),
            ("content.provider", &self.content.provider),
        ] {
            ensure!(
                self.providers.contains_key(&normalize_model_key(key)),
                "{role} references unknown provider '{key}'"
            );
        }
        self.limits.validate()
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            discovery_provider: normalize_model_key(&self.discovery.provider),
            evaluator: normalize_model_key(&self.analysis.evaluator),
            content_provider: normalize_model_key(&self.content.provider),
            execution_failure: self.analysis.execution_failure,
            page_chars: self.limits.page_chars,
            corpus_chars: self.limits.corpus_chars,
            fetch_timeout: Duration::from_secs(self.limits.fetch_timeout_secs),
        }
    }

    pub fn prompt_templates(&self) -> PromptTemplates {
        self.templates.apply(PromptTemplates::default())
    }
}

impl FromStr for GeoConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml_str(s)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Openai,
    Gemini,
    AzureRest,
}

impl ProviderKind {
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Openai => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-flash-latest",
            ProviderKind::AzureRest => "",
        }
    }

    pub fn default_api_key_env(self) -> &'static str {
        match self {
            ProviderKind::Openai => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::AzureRest => "AZURE_OPENAI_API_KEY",
        }
    }
}

/// How to reach one provider. Secrets are never stored here, only the names
/// of the environment variables holding them.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub endpoint_env: Option<String>,
    #[serde(default)]
    pub deployment_env: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: None,
            api_key_env: None,
            endpoint_env: None,
            deployment_env: None,
            api_version: None,
            temperature: Some(0.2),
            max_tokens: None,
        }
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_api_key_env())
    }

    pub fn endpoint_env(&self) -> &str {
        self.endpoint_env
            .as_deref()
            .unwrap_or("AZURE_OPENAI_ENDPOINT")
    }

    pub fn deployment_env(&self) -> &str {
        self.deployment_env
            .as_deref()
            .unwrap_or("AZURE_DEPLOYMENT_NAME")
    }

    fn validate(&self) -> Result<()> {
        if let Some(temp) = self.temperature {
            ensure!(
                (0.0..=2.0).contains(&temp),
                "temperature must be within 0.0..=2.0 (got {temp})"
            );
        }
        if let Some(max) = self.max_tokens {
            ensure!(max > 0, "max_tokens must be > 0");
        }
        if let Some(model) = &self.model {
            ensure!(!model.trim().is_empty(), "model must not be blank");
        }
        Ok(())
    }
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let openai = ProviderConfig {
        max_tokens: Some(1500),
        ..ProviderConfig::new(ProviderKind::Openai)
    };
    let gemini = ProviderConfig::new(ProviderKind::Gemini);
    let azure = ProviderConfig {
        max_tokens: Some(1500),
        ..ProviderConfig::new(ProviderKind::AzureRest)
    };
    BTreeMap::from([
        ("openai".to_string(), openai),
        ("gemini".to_string(), gemini),
        ("azure".to_string(), azure),
    ])
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub provider: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub evaluator: String,
    pub execution_failure: ExecutionFailurePolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            evaluator: "gemini".into(),
            execution_failure: ExecutionFailurePolicy::Abort,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContentConfig {
    pub provider: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub page_chars: usize,
    pub corpus_chars: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let settings = PipelineSettings::default();
        Self {
            page_chars: settings.page_chars,
            corpus_chars: settings.corpus_chars,
            fetch_timeout_secs: settings.fetch_timeout.as_secs(),
        }
    }
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        ensure!(self.page_chars > 0, "limits.page_chars must be > 0");
        ensure!(self.corpus_chars > 0, "limits.corpus_chars must be > 0");
        ensure!(
            self.fetch_timeout_secs > 0,
            "limits.fetch_timeout_secs must be > 0"
        );
        Ok(())
    }
}

/// Optional replacements for the built-in prompt templates. Each value is
/// either an inline template or a path relative to the config file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TemplatesConfig {
    pub products: Option<String>,
    pub personas: Option<String>,
    pub topics: Option<String>,
    pub verify_company: Option<String>,
    pub prompts: Option<String>,
    pub evaluate_model: Option<String>,
    pub evaluate_combined: Option<String>,
    pub score_brand: Option<String>,
    pub score_personas: Option<String>,
    pub score_topics: Option<String>,
    pub content: Option<String>,
}

impl TemplatesConfig {
    fn slots(&mut self) -> [&mut Option<String>; 11] {
        [
            &mut self.products,
            &mut self.personas,
            &mut self.topics,
            &mut self.verify_company,
            &mut self.prompts,
            &mut self.evaluate_model,
            &mut self.evaluate_combined,
            &mut self.score_brand,
            &mut self.score_personas,
            &mut self.score_topics,
            &mut self.content,
        ]
    }

    fn hydrate(&mut self, base_dir: &Path) -> Result<()> {
        for slot in self.slots() {
            if let Some(raw) = slot.as_mut() {
                *raw = resolve_prompt_template(raw, base_dir)?;
            }
        }
        Ok(())
    }

    fn apply(&self, mut templates: PromptTemplates) -> PromptTemplates {
        let pick = |over: &Option<String>, current: &mut String| {
            if let Some(source) = over.as_ref().filter(|s| !s.trim().is_empty()) {
                *current = source.clone();
            }
        };
        pick(&self.products, &mut templates.products);
        pick(&self.personas, &mut templates.personas);
        pick(&self.topics, &mut templates.topics);
        pick(&self.verify_company, &mut templates.verify_company);
        pick(&self.prompts, &mut templates.prompts);
        pick(&self.evaluate_model, &mut templates.evaluate_model);
        pick(&self.evaluate_combined, &mut templates.evaluate_combined);
        pick(&self.score_brand, &mut templates.score_brand);
        pick(&self.score_personas, &mut templates.score_personas);
        pick(&self.score_topics, &mut templates.score_topics);
        pick(&self.content, &mut templates.content);
        templates
    }
}

fn resolve_prompt_template(raw: &str, base_dir: &Path) -> Result<String> {
    if raw.contains('\n') {
        return Ok(raw.to_string());
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let candidate = Path::new(trimmed);
    let joined: PathBuf = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };

    if joined.is_file() {
        return fs::read_to_string(&joined)
            .with_context(|| format!("Failed to read prompt template {}", joined.display()));
    }

    if looks_like_template_path(trimmed) {
        return Err(anyhow!(
            "Prompt template '{}' was not found relative to {}",
            trimmed,
            base_dir.display()
        ));
    }

    Ok(raw.to_string())
}

fn looks_like_template_path(value: &str) -> bool {
    value.contains('/') || value.contains('\\') || value.ends_with(".hbs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_cover_three_backends() {
        let config = GeoConfig::default();
        config.validate().expect("defaults are valid");
        assert_eq!(config.providers["openai"].kind, ProviderKind::Openai);
        assert_eq!(config.providers["gemini"].kind, ProviderKind::Gemini);
        assert_eq!(config.providers["azure"].kind, ProviderKind::AzureRest);
        let settings = config.pipeline_settings();
        assert_eq!(settings.evaluator, "gemini");
        assert_eq!(settings.page_chars, 6000);
        assert_eq!(settings.corpus_chars, 2500);
    }

    #[test]
    fn loads_config_from_str() {
        let yaml = r#"
        providers:
          OpenAI:
            kind: azure_rest
            api_version: "2024-06-01"
            max_tokens: 1500
          gemini:
            kind: gemini
            model: gemini-2.0-flash
        discovery:
          provider: gemini
        analysis:
          evaluator: openai
          execution_failure: isolate
        content:
          provider: openai
        limits:
          corpus_chars: 1000
        "#;

        let config = GeoConfig::from_yaml_str(yaml).expect("valid config");
        let openai = config.providers.get("openai").expect("key normalized");
        assert_eq!(openai.kind, ProviderKind::AzureRest);
        assert_eq!(openai.api_key_env(), "AZURE_OPENAI_API_KEY");
        assert_eq!(config.providers["gemini"].model(), "gemini-2.0-flash");
        let settings = config.pipeline_settings();
        assert_eq!(settings.execution_failure, ExecutionFailurePolicy::Isolate);
        assert_eq!(settings.corpus_chars, 1000);
        assert_eq!(settings.page_chars, 6000);
    }

    #[test]
    fn rejects_unknown_evaluator() {
        let yaml = r#"
        providers:
          gemini:
            kind: gemini
        discovery:
          provider: gemini
        content:
          provider: gemini
        analysis:
          evaluator: claude
        "#;
        let err = GeoConfig::from_yaml_str(yaml).unwrap_err();
        let messages: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
        assert!(
            messages.iter().any(|msg| msg.contains("claude")),
            "error chain missing provider name: {messages:?}"
        );
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let yaml = r#"
        providers:
          gemini:
            kind: gemini
            temperature: 3.5
        discovery:
          provider: gemini
        analysis:
          evaluator: gemini
        content:
          provider: gemini
        "#;
        let err = GeoConfig::from_yaml_str(yaml).unwrap_err();
        let messages: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
        assert!(messages.iter().any(|msg| msg.contains("temperature")));
    }

    #[test]
    fn from_path_hydrates_templates() {
        let temp = tempdir().unwrap();
        let templates = temp.path().join("templates");
        fs::create_dir(&templates).unwrap();
        fs::write(templates.join("products.hbs"), "List products of {{company}}").unwrap();

        let config_path = temp.path().join("geointel.yaml");
        fs::write(
            &config_path,
            r#"
templates:
  products: "templates/products.hbs"
  topics: "Inline topics for {{company}}"
"#,
        )
        .unwrap();

        let config = GeoConfig::from_path(&config_path).expect("config loads");
        let templates = config.prompt_templates();
        assert_eq!(templates.products, "List products of {{company}}");
        assert_eq!(templates.topics, "Inline topics for {{company}}");
        assert_eq!(templates.personas, PromptTemplates::default().personas);
    }

    #[test]
    fn missing_template_file_is_an_error() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("geointel.yaml");
        fs::write(&config_path, "templates:\n  products: \"templates/missing.hbs\"\n").unwrap();
        let err = GeoConfig::from_path(&config_path).unwrap_err();
        let messages: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
        assert!(messages.iter().any(|msg| msg.contains("missing.hbs")));
    }
}
