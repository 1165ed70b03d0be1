//! HTTP inbound adapter exposing the intelligence pipeline as a JSON API.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context as AnyhowContext, Result};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    domain::{
        AnalysisRequest, BrandScore, BrandScoreRequest, CompanyVerification, CompanyVerifyRequest,
        ContentPiece, ContentRequest, ModelSelection, PersonaRequest, PersonaScoreRequest,
        ProductRequest, PromptBatch, Report, ReportRequest, ScoreMap, SelectModelRequest,
        TopicRequest, TopicScoreRequest,
    },
    error::Error as CoreError,
    ports::IntelService,
};

/// Server adapter that exposes an `IntelService` via HTTP.
pub struct ServerAdapter {
    service: Arc<dyn IntelService>,
}

impl ServerAdapter {
    pub fn new(service: Arc<dyn IntelService>) -> Self {
        Self { service }
    }

    /// Run the HTTP server on the given address.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind API listener on {addr}"))?;
        self.run_with_listener(listener).await
    }

    /// Run the HTTP server with an existing listener (useful for tests).
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<()> {
        let router = build_router(self.service);
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "geointel serve listening");
        } else {
            info!("geointel serve listening");
        }
        axum::serve(listener, router.into_make_service())
            .await
            .context("serve endpoint failed")
    }
}

type ServiceState = Arc<dyn IntelService>;

pub fn build_router(service: ServiceState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/verify-company", post(verify_company_handler))
        .route("/products", post(products_handler))
        .route("/personas", post(personas_handler))
        .route("/topics", post(topics_handler))
        .route("/prompts", post(prompts_handler))
        .route("/report", post(report_handler))
        .route("/score/brand", post(score_brand_handler))
        .route("/score/personas", post(score_personas_handler))
        .route("/score/topics", post(score_topics_handler))
        .route("/content-generation", post(content_handler))
        .route(
            "/select-model",
            get(current_model_handler).post(select_model_handler),
        )
        .with_state(service)
}

/// Error body returned by every endpoint: `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::UnsupportedProvider(_) => StatusCode::BAD_REQUEST,
            CoreError::LlmProvider { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;
type Body<T> = std::result::Result<Json<T>, JsonRejection>;

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn verify_company_handler(
    State(service): State<ServiceState>,
    body: Body<CompanyVerifyRequest>,
) -> ApiResult<CompanyVerification> {
    let Json(request) = body?;
    Ok(Json(service.verify_company(request).await?))
}

async fn products_handler(
    State(service): State<ServiceState>,
    body: Body<ProductRequest>,
) -> ApiResult<Vec<Value>> {
    let Json(request) = body?;
    Ok(Json(service.products(request).await?))
}

async fn personas_handler(
    State(service): State<ServiceState>,
    body: Body<PersonaRequest>,
) -> ApiResult<Vec<Value>> {
    let Json(request) = body?;
    Ok(Json(service.personas(request).await?))
}

async fn topics_handler(
    State(service): State<ServiceState>,
    body: Body<TopicRequest>,
) -> ApiResult<Vec<Value>> {
    let Json(request) = body?;
    Ok(Json(service.topics(request).await?))
}

async fn prompts_handler(
    State(service): State<ServiceState>,
    body: Body<AnalysisRequest>,
) -> ApiResult<PromptBatch> {
    let Json(request) = body?;
    Ok(Json(service.prompts(request).await?))
}

async fn report_handler(
    State(service): State<ServiceState>,
    body: Body<ReportRequest>,
) -> ApiResult<Report> {
    let Json(request) = body?;
    Ok(Json(service.report(request).await?))
}

async fn score_brand_handler(
    State(service): State<ServiceState>,
    body: Body<BrandScoreRequest>,
) -> ApiResult<BrandScore> {
    let Json(request) = body?;
    Ok(Json(service.score_brand(request).await?))
}

async fn score_personas_handler(
    State(service): State<ServiceState>,
    body: Body<PersonaScoreRequest>,
) -> ApiResult<ScoreMap> {
    let Json(request) = body?;
    Ok(Json(service.score_personas(request).await?))
}

async fn score_topics_handler(
    State(service): State<ServiceState>,
    body: Body<TopicScoreRequest>,
) -> ApiResult<ScoreMap> {
    let Json(request) = body?;
    Ok(Json(service.score_topics(request).await?))
}

async fn content_handler(
    State(service): State<ServiceState>,
    body: Body<ContentRequest>,
) -> ApiResult<ContentPiece> {
    let Json(request) = body?;
    Ok(Json(service.generate_content(request).await?))
}

async fn current_model_handler(State(service): State<ServiceState>) -> Json<ModelSelection> {
    Json(service.selection())
}

async fn select_model_handler(
    State(service): State<ServiceState>,
    body: Body<SelectModelRequest>,
) -> ApiResult<ModelSelection> {
    let Json(request) = body?;
    Ok(Json(service.select_model(&request.model)?))
}
