// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Application state, request authentication, route handlers, and router
//! construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::models::crawl::{
    CrawlRequest, CrawlRule, CrawlStats, CrawlStatus, DomainSpec, ErrorCategory, ErrorResponse,
    PublicResponse, RulePolicy, RuleType,
};
use crate::models::health::HealthResponse;
use crate::services::auth_middleware::{AuthError, AuthPolicy, StaticApiKey};
use crate::services::credentials::{self, Secrets};
use crate::services::executor::{CrawlerBackend, ExecutionError};
use crate::services::sanitizer::sanitize;
use crate::services::translator::{translate, TranslatorLimits, ValidationError};
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

/// Application version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `ORCHESTRATOR_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("ORCHESTRATOR_VERSION");

/// Name reported by `GET /health`.
pub const SERVICE_NAME: &str = "crawl-orchestrator";

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Shared application state injected into every route handler via `State<AppState>`.
/// Everything in it is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub secrets: Arc<Secrets>,
    pub auth: Arc<dyn AuthPolicy>,
    pub backend: Arc<dyn CrawlerBackend>,
    pub limits: TranslatorLimits,
}

impl AppState {
    /// State with the default shared-key policy built from `secrets`.
    pub fn new(
        secrets: Secrets,
        backend: Arc<dyn CrawlerBackend>,
        limits: TranslatorLimits,
    ) -> Self {
        let auth = Arc::new(StaticApiKey::new(&secrets.expected_api_key));
        Self {
            secrets: Arc::new(secrets),
            auth,
            backend,
            limits,
        }
    }

    /// Replace the authentication policy.
    pub fn with_auth_policy(mut self, auth: Arc<dyn AuthPolicy>) -> Self {
        self.auth = auth;
        self
    }
}

// ---------------------------------------------------------------------------
// Request authentication
// ---------------------------------------------------------------------------

/// Axum extractor that admits the request only if the configured `AuthPolicy`
/// accepts its headers. Runs before the body is read, so an unauthenticated
/// request never reaches translation or the crawler.
pub struct Authenticated;

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state.auth.authorize(&parts.headers).map_err(|e| {
            warn!(error = %e, "Rejected crawl request");
            e
        })?;
        Ok(Authenticated)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures of `POST /crawl` that end the request before a crawl result exists.
#[derive(Debug, Error)]
pub enum CrawlApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl IntoResponse for CrawlApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CrawlApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            // Launch details can include local paths; keep them in the logs
            CrawlApiError::Execution(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Crawler could not be launched".to_string(),
            ),
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health - Liveness probe. Touches no secrets and spawns nothing.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is alive", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: VERSION.to_string(),
    })
}

/// POST /crawl - Run one crawl and wait for its outcome.
#[utoipa::path(
    post,
    path = "/crawl",
    request_body = CrawlRequest,
    params(("X-API-Key" = String, Header, description = "Caller API key")),
    responses(
        (status = 200, description = "Crawl finished (success, error or timeout)", body = PublicResponse),
        (status = 400, description = "Request failed validation", body = ErrorResponse),
        (status = 401, description = "API key missing", body = ErrorResponse),
        (status = 403, description = "API key invalid", body = ErrorResponse),
        (status = 500, description = "Crawler could not be launched", body = ErrorResponse)
    )
)]
pub async fn crawl_handler(
    State(state): State<AppState>,
    _auth: Authenticated,
    payload: Result<Json<CrawlRequest>, JsonRejection>,
) -> Result<Json<PublicResponse>, CrawlApiError> {
    let Json(request) =
        payload.map_err(|rejection| ValidationError::MalformedBody(rejection.body_text()))?;

    let crawl_id = Uuid::now_v7();
    let span = info_span!("crawl", %crawl_id, output_index = %request.output_index);

    run_crawl(&state, &request)
        .instrument(span)
        .await
        .map(Json)
}

/// Validate, resolve credentials, execute, parse and sanitize one crawl.
pub async fn run_crawl(
    state: &AppState,
    request: &CrawlRequest,
) -> Result<PublicResponse, CrawlApiError> {
    let config = translate(request, &state.limits).map_err(|e| {
        info!(error = %e, "Crawl request failed validation");
        e
    })?;
    info!(
        domains = config.domains.len(),
        max_duration_seconds = config.max_duration_seconds,
        "Crawl request validated"
    );

    let timeout = Duration::from_secs(config.max_duration_seconds);
    let raw = {
        let resolved = credentials::resolve(&config, &state.secrets);
        state
            .backend
            .execute(&resolved, timeout)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to run crawler");
                e
            })?
    };

    let result = state.backend.parse(&raw, request);
    info!(
        status = %result.status,
        return_code = result.return_code,
        pages_visited = result.stats.pages_visited.as_deref().unwrap_or("unknown"),
        "Crawl finished"
    );

    Ok(sanitize(result, &raw, &state.secrets))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(health_handler, crawl_handler),
    components(schemas(
        HealthResponse,
        CrawlRequest,
        DomainSpec,
        CrawlRule,
        RulePolicy,
        RuleType,
        PublicResponse,
        CrawlStatus,
        CrawlStats,
        ErrorCategory,
        ErrorResponse
    )),
    tags((name = "crawl", description = "Crawl orchestration"))
)]
pub struct ApiDoc;

/// Build the Axum application router, including the OpenAPI document and
/// Swagger UI.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/crawl", post(crawl_handler))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
