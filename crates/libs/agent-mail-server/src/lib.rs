//! Thin HTTP adapter in front of the coordination layer's JSON-RPC surface.
//!
//! This crate does not implement a REST API of its own: the writer/reader
//! verbs live behind `agent-mail-mcp`'s JSON-RPC dispatch at `/mcp`. What
//! lives here is the ambient transport concern the teacher already built -
//! auth, rate limiting, health/readiness, metrics, and the OpenAPI document
//! for the one conventional REST surface this service exposes (health and
//! readiness).

pub mod auth;
pub mod mcp;
pub mod openapi;
pub mod ratelimit;

use agent_mail_common::config::AppConfig;
pub use agent_mail_core::ModelManager;
use axum::{Json, Router, extract::State, middleware, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use auth::{AuthConfig, AuthMode, JwksClient};
use ratelimit::RateLimitConfig;

/// Shared axum application state: one `ModelManager` per process, plus the
/// auth/rate-limit configuration resolved once at startup.
#[derive(Clone)]
pub struct AppState {
    pub mm: ModelManager,
    pub metrics_handle: PrometheusHandle,
    pub start_time: Instant,
    pub auth_config: AuthConfig,
    pub jwks_client: Option<JwksClient>,
    pub ratelimit_config: RateLimitConfig,
}

/// Installs the process-wide Prometheus recorder and returns a handle that
/// renders the current snapshot on demand. Safe to call more than once in
/// tests; later installs are ignored.
pub fn setup_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .unwrap_or_else(|_| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .build_recorder()
                .handle()
        })
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

/// Liveness probe: always `ok` once the process has a listener bound.
#[utoipa::path(get, path = "/health", responses((status = 200, body = HealthResponse)))]
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
struct ReadyResponse {
    status: &'static str,
    database: &'static str,
}

/// Readiness probe: confirms the index database still answers queries.
#[utoipa::path(get, path = "/ready", responses((status = 200, body = ReadyResponse), (status = 503, body = ReadyResponse)))]
pub async fn ready_handler(State(state): State<AppState>) -> Json<ReadyResponse> {
    match agent_mail_core::model::project::ProjectBmc::list_all(&agent_mail_core::Ctx::root_ctx(), &state.mm).await {
        Ok(_) => Json(ReadyResponse {
            status: "ok",
            database: "reachable",
        }),
        Err(_) => Json(ReadyResponse {
            status: "degraded",
            database: "unreachable",
        }),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// Builds the full application: health/readiness, Prometheus metrics,
/// Swagger UI, and the `/mcp` JSON-RPC endpoint, wrapped in auth and rate
/// limiting middleware in the same order the teacher layers them.
pub async fn build_app(config: Arc<AppConfig>) -> anyhow::Result<Router> {
    let mm = ModelManager::new(config).await?;
    let auth_config = AuthConfig::from_env();
    let jwks_client = match (&auth_config.mode, &auth_config.jwks_url) {
        (AuthMode::Jwt, Some(url)) => Some(JwksClient::new(url.clone())),
        _ => None,
    };

    let state = AppState {
        mm: mm.clone(),
        metrics_handle: setup_metrics(),
        start_time: Instant::now(),
        auth_config,
        jwks_client,
        ratelimit_config: RateLimitConfig::new(),
    };

    let ratelimit_state = state.ratelimit_config.clone();

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .merge(mcp::mcp_routes(mm))
        .layer(middleware::from_fn_with_state(
            ratelimit_state,
            ratelimit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::capabilities_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    Ok(app)
}
