//! Inbound ports (use-case ports) define the application service interface that
//! driving adapters (CLI, HTTP server) consume.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{
    domain::{
        AnalysisRequest, BrandScore, BrandScoreRequest, CompanyVerification,
        CompanyVerifyRequest, ContentPiece, ContentRequest, ModelSelection, PersonaRequest,
        PersonaScoreRequest, ProductRequest, PromptBatch, Report, ReportRequest, ScoreMap,
        TopicRequest, TopicScoreRequest,
    },
    error::Result,
};

/// Every operation the intelligence pipeline exposes.
#[async_trait]
pub trait IntelService: Send + Sync {
    /// Check that a URL belongs to a real operating company.
    async fn verify_company(&self, request: CompanyVerifyRequest) -> Result<CompanyVerification>;

    /// Discover product categories. Empty on malformed model output.
    async fn products(&self, request: ProductRequest) -> Result<Vec<Value>>;

    /// Discover analyst personas. Empty on malformed model output.
    async fn personas(&self, request: PersonaRequest) -> Result<Vec<Value>>;

    /// Discover dashboard-style topics. Empty on malformed model output.
    async fn topics(&self, request: TopicRequest) -> Result<Vec<Value>>;

    /// Generate analytical prompts, one batch per requested model.
    async fn prompts(&self, request: AnalysisRequest) -> Result<PromptBatch>;

    /// Run prompts against every model and synthesize the scored report.
    async fn report(&self, request: ReportRequest) -> Result<Report>;

    async fn score_brand(&self, request: BrandScoreRequest) -> Result<BrandScore>;

    async fn score_personas(&self, request: PersonaScoreRequest) -> Result<ScoreMap>;

    async fn score_topics(&self, request: TopicScoreRequest) -> Result<ScoreMap>;

    async fn generate_content(&self, request: ContentRequest) -> Result<ContentPiece>;

    /// Current evaluator selection.
    fn selection(&self) -> ModelSelection;

    /// Replace the evaluator used by later requests.
    fn select_model(&self, key: &str) -> Result<ModelSelection>;
}
