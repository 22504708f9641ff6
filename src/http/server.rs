//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the demo handlers
//! - Wire up middleware (timeout, correlation, tracing)
//! - Bind server to listener
//! - Relay requests upstream through the traced clients

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower::{Layer, ServiceExt};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{TraceConfig, ValidationError};
use crate::http::context::CorrelationContext;
use crate::http::middleware::CorrelationLayer;
use crate::logging::{get_logger_with, Logger, LoggerOptions};
use crate::outbound::{
    DefaultHeaders, HttpStrategy, OutboundHooks, PropagationLayer, PropagationService, SharedHook,
    TracedClient,
};
use crate::{log_error, log_info, log_warn};

const MAX_RELAY_BODY: usize = 1024 * 1024;
const USER_AGENT: &str = concat!("request-trace/", env!("CARGO_PKG_VERSION"));

type TowerClient = PropagationService<Client<HttpConnector, Body>>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub logger: Arc<Logger>,
    pub client: TracedClient,
    pub tower_client: TowerClient,
    pub upstream: Option<String>,
}

/// HTTP server for the trace service.
pub struct HttpServer {
    router: Router,
    config: TraceConfig,
    hooks: OutboundHooks,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: TraceConfig) -> Result<Self, ValidationError> {
        let logger = get_logger_with("request_trace", LoggerOptions::from(&config.logging));
        Self::with_logger(config, logger)
    }

    /// Create a server that logs through `logger`.
    pub fn with_logger(config: TraceConfig, logger: Arc<Logger>) -> Result<Self, ValidationError> {
        let hooks = OutboundHooks::new();
        let user_agent: SharedHook = Arc::new(DefaultHeaders::user_agent(USER_AGENT));
        for strategy in HttpStrategy::ALL {
            hooks.set_original(strategy, user_agent.clone());
        }

        let client = TracedClient::with_hooks(reqwest::Client::new(), hooks.clone());
        let tower_client = PropagationLayer::new(hooks.clone()).layer(
            Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        );

        let state = AppState {
            logger,
            client,
            tower_client,
            upstream: config
                .upstream
                .url
                .clone()
                .filter(|u| !u.is_empty())
                .map(|u| u.trim_end_matches('/').to_string()),
        };

        let layer = CorrelationLayer::from_config(&config.middleware)
            .hooks(hooks.clone())
            .build()?;
        let router = Self::build_router(&config, state, layer);
        Ok(Self {
            router,
            config,
            hooks,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &TraceConfig, state: AppState, layer: CorrelationLayer) -> Router {
        Router::new()
            .route("/", get(echo_handler))
            .route("/relay", get(relay_handler))
            .route("/relay/tower", get(tower_relay_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(layer)
            .layer(TraceLayer::new_for_http())
    }

    /// A handle to the router, for serving it elsewhere or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Hooks shared by this server's middleware and outbound clients.
    pub fn hooks(&self) -> &OutboundHooks {
        &self.hooks
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }
}

/// Echo the correlation ids assigned to this request.
async fn echo_handler(State(state): State<AppState>, uri: Uri) -> impl IntoResponse {
    log_info!(state.logger, "Echo {path}", path = %uri.path());

    match CorrelationContext::current() {
        Some(ctx) => Json(json!({
            "x-request-id": ctx.request_id,
            "x-correlation-id": ctx.correlation_id,
            "x-causation-id": ctx.causation_id,
        }))
        .into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Call the upstream through the reqwest decorator.
async fn relay_handler(State(state): State<AppState>) -> Response {
    let Some(upstream) = state.upstream.as_deref() else {
        log_warn!(state.logger, "Relay requested without an upstream");
        return (StatusCode::SERVICE_UNAVAILABLE, "No upstream configured").into_response();
    };

    let url = format!("{}/", upstream);
    let result = async {
        let response = state.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok::<_, reqwest::Error>((status, body))
    }
    .await;

    relay_response(&state.logger, &url, result)
}

/// Call the upstream through the tower propagation layer.
async fn tower_relay_handler(State(state): State<AppState>) -> Response {
    let Some(upstream) = state.upstream.as_deref() else {
        log_warn!(state.logger, "Relay requested without an upstream");
        return (StatusCode::SERVICE_UNAVAILABLE, "No upstream configured").into_response();
    };

    let url = format!("{}/", upstream);
    let request = match Request::get(url.as_str()).body(Body::empty()) {
        Ok(request) => request,
        Err(e) => return relay_response(&state.logger, &url, Err(e.to_string())),
    };

    let result = async {
        let response = state
            .tower_client
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_RELAY_BODY)
            .await
            .map_err(|e| e.to_string())?;
        Ok::<_, String>((status, String::from_utf8_lossy(&bytes).into_owned()))
    }
    .await;

    relay_response(&state.logger, &url, result)
}

fn relay_response<E: std::fmt::Display>(
    logger: &Logger,
    url: &str,
    result: Result<(u16, String), E>,
) -> Response {
    match result {
        Ok((status, body)) => {
            log_info!(logger, "Relayed to {url}", url = url, status = status);
            Json(json!({ "status": status, "body": body })).into_response()
        }
        Err(e) => {
            log_error!(logger, "Relay to {url} failed", url = url, error = %e);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
