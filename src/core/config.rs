use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the report pipeline does when a model fails while answering prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionFailurePolicy {
    /// The whole report request fails.
    #[default]
    Abort,
    /// The failing model keeps the answers collected so far.
    Isolate,
}

/// Runtime representation of the pipeline settings after configuration parsing.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub discovery_provider: String,
    pub evaluator: String,
    pub content_provider: String,
    pub execution_failure: ExecutionFailurePolicy,
    /// Characters of a fetched homepage passed to company verification.
    pub page_chars: usize,
    /// Characters of supporting text passed to the scorers.
    pub corpus_chars: usize,
    pub fetch_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            discovery_provider: "gemini".into(),
            evaluator: "gemini".into(),
            content_provider: "openai".into(),
            execution_failure: ExecutionFailurePolicy::Abort,
            page_chars: 6000,
            corpus_chars: 2500,
            fetch_timeout: Duration::from_secs(8),
        }
    }
}
