//! HTTP server for the decision service.
//!
//! # Responsibilities
//! - Create Axum Router with the evaluation and auth-event handlers
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Mount the admin API when enabled
//! - Serve with graceful shutdown
//!
//! Hosts call `POST /v1/evaluate` with a normalized request context and
//! render the returned verdict; auth outcomes are reported to
//! `POST /v1/events/auth` so counters and profiles accrue.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::admin;
use crate::config::{ConfigHandle, EngineConfig};
use crate::lifecycle;
use crate::pipeline::{Evaluation, RequestContext, ThreatEngine};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ThreatEngine>,
    pub config: ConfigHandle,
}

/// UUID v4 request IDs for log correlation.
#[derive(Clone, Copy)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// HTTP server for the threat engine.
pub struct EngineServer {
    router: Router,
    config: EngineConfig,
}

impl EngineServer {
    /// Create a new server around an assembled engine.
    pub fn new(config: ConfigHandle, engine: Arc<ThreatEngine>) -> Self {
        let snapshot = EngineConfig::clone(&config.load());
        let state = AppState { engine, config };
        let router = Self::build_router(&snapshot, state);
        Self {
            router,
            config: snapshot,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &EngineConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/v1/evaluate", post(evaluate))
            .route("/v1/events/auth", post(auth_event))
            .route("/health", get(health))
            .with_state(state.clone());

        if config.admin.enabled {
            router = router.merge(admin::setup_admin_router(state));
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Decision service starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(lifecycle::signal_received())
            .await?;

        tracing::info!("Decision service stopped");
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

async fn evaluate(
    State(state): State<AppState>,
    Json(ctx): Json<RequestContext>,
) -> Json<Evaluation> {
    Json(state.engine.evaluate(&ctx))
}

/// Auth outcome reported by the host after its own login logic ran.
#[derive(Debug, Deserialize)]
pub struct AuthEventReport {
    pub source_ip: IpAddr,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub success: bool,
}

async fn auth_event(
    State(state): State<AppState>,
    Json(report): Json<AuthEventReport>,
) -> StatusCode {
    if report.success {
        match report.account_id.as_deref() {
            Some(account) => {
                state.engine.record_auth_success(
                    report.source_ip,
                    account,
                    report.user_agent.as_deref(),
                );
            }
            None => return StatusCode::UNPROCESSABLE_ENTITY,
        }
    } else {
        state
            .engine
            .record_auth_failure(report.source_ip, report.account_id.as_deref());
    }
    StatusCode::ACCEPTED
}

async fn health() -> &'static str {
    "ok"
}
