//! Application service implementing the `IntelService` port.
//! Driving adapters (CLI, HTTP server) only ever talk to this.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    application::{
        content, discovery, prompts, report::ReportPipeline, scoring, templates::PromptTemplates,
    },
    core::{
        config::PipelineSettings,
        domain::{
            AnalysisRequest, BrandScore, BrandScoreRequest, CompanyVerification,
            CompanyVerifyRequest, ContentPiece, ContentRequest, ModelSelection, PersonaRequest,
            PersonaScoreRequest, ProductRequest, PromptBatch, Report, ReportRequest, ScoreMap,
            TopicRequest, TopicScoreRequest, normalize_model_key,
        },
        error::{Error as CoreError, Result as CoreResult},
        ports::{IntelService, LlmClient, LlmRegistry, PromptRenderer, SiteProbe},
    },
};

pub struct AppService {
    registry: Arc<dyn LlmRegistry>,
    probe: Arc<dyn SiteProbe>,
    renderer: Arc<dyn PromptRenderer>,
    templates: Arc<PromptTemplates>,
    settings: PipelineSettings,
    selection: RwLock<ModelSelection>,
    pipeline: ReportPipeline,
}

impl AppService {
    pub fn new(
        registry: Arc<dyn LlmRegistry>,
        probe: Arc<dyn SiteProbe>,
        renderer: Arc<dyn PromptRenderer>,
        templates: PromptTemplates,
        settings: PipelineSettings,
    ) -> Self {
        let templates = Arc::new(templates);
        let pipeline = ReportPipeline::new(
            registry.clone(),
            renderer.clone(),
            templates.clone(),
            settings.execution_failure,
        );
        let selection = RwLock::new(ModelSelection {
            evaluator: normalize_model_key(&settings.evaluator),
        });
        Self {
            registry,
            probe,
            renderer,
            templates,
            settings,
            selection,
            pipeline,
        }
    }

    /// Evaluator in effect right now. Each request reads it once up front.
    fn evaluator_key(&self) -> String {
        self.selection().evaluator
    }

    fn evaluator(&self) -> CoreResult<Arc<dyn LlmClient>> {
        self.registry.acquire(&self.evaluator_key())
    }

    fn discovery_llm(&self) -> Arc<dyn LlmClient> {
        self.registry
            .acquire_discovery(&self.settings.discovery_provider)
    }
}

#[async_trait]
impl IntelService for AppService {
    async fn verify_company(
        &self,
        request: CompanyVerifyRequest,
    ) -> CoreResult<CompanyVerification> {
        let llm = self.discovery_llm();
        discovery::verify_company(
            llm.as_ref(),
            self.probe.as_ref(),
            self.renderer.as_ref(),
            &self.templates.verify_company,
            self.settings.page_chars,
            &request.url,
        )
        .await
    }

    async fn products(&self, request: ProductRequest) -> CoreResult<Vec<Value>> {
        let llm = self.discovery_llm();
        discovery::discover_products(
            llm.as_ref(),
            self.renderer.as_ref(),
            &self.templates.products,
            &request.company,
        )
        .await
    }

    async fn personas(&self, request: PersonaRequest) -> CoreResult<Vec<Value>> {
        let llm = self.discovery_llm();
        discovery::discover_personas(
            llm.as_ref(),
            self.renderer.as_ref(),
            &self.templates.personas,
            &request.company,
            &request.product,
        )
        .await
    }

    async fn topics(&self, request: TopicRequest) -> CoreResult<Vec<Value>> {
        let llm = self.discovery_llm();
        discovery::discover_topics(
            llm.as_ref(),
            self.renderer.as_ref(),
            &self.templates.topics,
            &request.company,
            &request.product,
            &request.persona,
        )
        .await
    }

    async fn prompts(&self, request: AnalysisRequest) -> CoreResult<PromptBatch> {
        prompts::run_analysis(
            self.registry.as_ref(),
            self.renderer.as_ref(),
            &self.templates.prompts,
            &request,
        )
        .await
    }

    async fn report(&self, request: ReportRequest) -> CoreResult<Report> {
        let evaluator = self.evaluator_key();
        self.pipeline.run(&request, &evaluator).await
    }

    async fn score_brand(&self, request: BrandScoreRequest) -> CoreResult<BrandScore> {
        let llm = self.evaluator()?;
        scoring::score_brand(
            llm.as_ref(),
            self.renderer.as_ref(),
            &self.templates.score_brand,
            self.settings.corpus_chars,
            &request.company,
            &request.category,
            &request.corpus,
        )
        .await
    }

    async fn score_personas(&self, request: PersonaScoreRequest) -> CoreResult<ScoreMap> {
        let llm = self.evaluator()?;
        scoring::score_personas(
            llm.as_ref(),
            self.renderer.as_ref(),
            &self.templates.score_personas,
            self.settings.corpus_chars,
            &request.personas,
            &request.corpus,
        )
        .await
    }

    async fn score_topics(&self, request: TopicScoreRequest) -> CoreResult<ScoreMap> {
        let llm = self.evaluator()?;
        scoring::score_topics(
            llm.as_ref(),
            self.renderer.as_ref(),
            &self.templates.score_topics,
            self.settings.corpus_chars,
            &request.topics,
            &request.corpus,
        )
        .await
    }

    async fn generate_content(&self, request: ContentRequest) -> CoreResult<ContentPiece> {
        let llm = self.registry.acquire(&self.settings.content_provider)?;
        content::generate_content(
            llm.as_ref(),
            self.renderer.as_ref(),
            &self.templates.content,
            &request.topic,
        )
        .await
    }

    fn selection(&self) -> ModelSelection {
        // Writes are a single assignment; a poisoned lock still holds a whole value.
        self.selection
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn select_model(&self, key: &str) -> CoreResult<ModelSelection> {
        let key = normalize_model_key(key);
        if key.is_empty() {
            return Err(CoreError::InvalidRequest("model must not be empty".into()));
        }
        if !self.registry.supports(&key) {
            return Err(CoreError::UnsupportedProvider(key));
        }
        let mut guard = self
            .selection
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.evaluator = key;
        tracing::info!(evaluator = %guard.evaluator, "active evaluator changed");
        Ok(guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{FakeLlm, FakeProbe, FakeRegistry, renderer};
    use crate::core::domain::PromptItem;

    fn service(registry: FakeRegistry) -> AppService {
        AppService::new(
            Arc::new(registry),
            Arc::new(FakeProbe::page(200, "<h1>Acme</h1>")),
            renderer(),
            PromptTemplates::default(),
            PipelineSettings::default(),
        )
    }

    #[tokio::test]
    async fn discovery_falls_back_when_provider_is_missing() {
        let fallback = FakeLlm::replying("fallback", r#"["Phones"]"#);
        let registry = FakeRegistry::new(vec![]).with_fallback(fallback.clone());
        let products = service(registry)
            .products(ProductRequest {
                company: "Acme".into(),
            })
            .await
            .unwrap();
        assert_eq!(products, vec![Value::from("Phones")]);
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn select_model_validates_and_switches_the_scorer() {
        let gemini = FakeLlm::replying("gemini", r#"{"Founder": 10}"#);
        let openai = FakeLlm::replying("openai", r#"{"Founder": 90}"#);
        let service = service(FakeRegistry::new(vec![gemini.clone(), openai.clone()]));
        assert_eq!(service.selection().evaluator, "gemini");

        let err = service.select_model("claude").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedProvider(_)));
        assert_eq!(service.selection().evaluator, "gemini");

        let selection = service.select_model(" OpenAI ").unwrap();
        assert_eq!(selection.evaluator, "openai");

        let scores = service
            .score_personas(PersonaScoreRequest {
                personas: vec!["Founder".into()],
                corpus: "text".into(),
            })
            .await
            .unwrap();
        assert_eq!(scores.get("Founder"), Some(90.0));
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test]
    async fn report_uses_the_selected_evaluator() {
        let gemini = FakeLlm::replying("gemini", "gemini answer");
        let openai = FakeLlm::replying(
            "openai",
            r#"{"brand_visibility": {"Acme": 70}, "model_visibility": {"gemini": 80}}"#,
        );
        let service = service(FakeRegistry::new(vec![gemini.clone(), openai.clone()]));
        service.select_model("openai").unwrap();

        let report = service
            .report(ReportRequest {
                brand: "Acme".into(),
                product: String::new(),
                personas: vec![],
                topics: vec![],
                prompts: vec![PromptItem::Broadcast("q".into())],
                models: vec!["gemini".into()],
            })
            .await
            .unwrap();
        assert_eq!(gemini.call_count(), 1);
        assert_eq!(openai.call_count(), 2);
        assert!(report.combined.model_visibility.is_some());
        assert!(report.per_model["gemini"].model_visibility.is_none());
    }

    #[tokio::test]
    async fn content_uses_the_content_provider() {
        let openai = FakeLlm::replying("openai", "Article");
        let service = service(FakeRegistry::new(vec![openai.clone()]));
        let piece = service
            .generate_content(ContentRequest {
                topic: "Pricing".into(),
            })
            .await
            .unwrap();
        assert_eq!(piece.content, "Article");
        assert_eq!(openai.call_count(), 1);
    }
}
