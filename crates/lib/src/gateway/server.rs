//! Webhook HTTP server: chat platform in, Dialogflow session turn, display messages out.

use crate::config::{self, Config};
use crate::error::BridgeError;
use crate::gateway::protocol::{ErrorBody, InboundMessage, OutboundPayload};
use crate::normalize::normalize;
use crate::session::{IntentBackend, SessionGateway};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use futures_util::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Shown to the user whenever a turn fails after validation.
pub const FALLBACK_TEXT: &str = "Sorry—having trouble right now. Please try again.";

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-secret";

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct GatewayState {
    pub backend: Arc<dyn IntentBackend>,
    /// When Some, requests must carry a matching `X-Secret` header.
    pub secret: Option<String>,
    /// Port reported by the health endpoint.
    pub port: u16,
}

impl GatewayState {
    pub fn new(backend: Arc<dyn IntentBackend>, secret: Option<String>) -> Self {
        Self {
            backend,
            secret,
            port: 0,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        match self {
            BridgeError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Json(OutboundPayload::text(msg))).into_response()
            }
            BridgeError::Auth => {
                (StatusCode::UNAUTHORIZED, Json(ErrorBody::new("Unauthorized"))).into_response()
            }
            BridgeError::Configuration(_) | BridgeError::Backend(_) => {
                log::error!("turn failed: {}", self);
                fallback_response()
            }
        }
    }
}

fn fallback_response() -> Response {
    (StatusCode::OK, Json(OutboundPayload::text(FALLBACK_TEXT))).into_response()
}

fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(ErrorBody::new("Use POST")),
    )
        .into_response()
}

/// Run one validated turn: query the backend, then normalize its result.
pub async fn run_turn(
    backend: &dyn IntentBackend,
    msg: &InboundMessage,
) -> Result<OutboundPayload, BridgeError> {
    let result = backend
        .query(&msg.user_id, &msg.text, msg.language_code.as_deref())
        .await?;
    Ok(normalize(&result).into())
}

fn check_secret(expected: Option<&str>, headers: &HeaderMap) -> Result<(), BridgeError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided == expected {
        Ok(())
    } else {
        Err(BridgeError::Auth)
    }
}

async fn handle_turn(
    state: &GatewayState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<OutboundPayload, BridgeError> {
    check_secret(state.secret.as_deref(), headers)?;
    let msg = InboundMessage::from_body(body)?;
    run_turn(state.backend.as_ref(), &msg).await
}

/// Webhook route. Every error and panic of a turn is turned into a response here.
async fn chatfuel_webhook(
    State(state): State<GatewayState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return method_not_allowed();
    }
    match AssertUnwindSafe(handle_turn(&state, &headers, &body))
        .catch_unwind()
        .await
    {
        Ok(Ok(payload)) => (StatusCode::OK, Json(payload)).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(_) => {
            log::error!("turn panicked; answering with fallback");
            fallback_response()
        }
    }
}

/// GET / returns a simple health JSON.
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
        "backend": "dialogflow",
        "configured": state.backend.is_configured(),
    }))
}

/// Router with the health endpoint at `/` and the webhook at `path`.
pub fn build_router(state: GatewayState, path: &str) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route(path, any(chatfuel_webhook))
        .with_state(state)
}

fn validate_path(path: &str) -> Result<&str> {
    let p = path.trim();
    if !p.starts_with('/') || p == "/" {
        anyhow::bail!("gateway.path must start with '/' and not be the root (got {:?})", path);
    }
    Ok(p)
}

/// Resolve settings, build the session gateway and serve until SIGINT/SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    let path = validate_path(&config.gateway.path)?.to_string();
    let settings = config::resolve_dialogflow_settings(&config);
    if settings.project_id.is_none() {
        log::warn!("DF_PROJECT_ID not set; every turn will answer with the fallback message");
    }
    if settings.credentials_json.is_none() {
        log::warn!(
            "no service-account credentials configured; every turn will answer with the fallback message"
        );
    }
    let secret = config::resolve_gateway_secret(&config);
    let bind = config.gateway.bind.trim();
    if secret.is_none() && !config::is_loopback_bind(bind) {
        log::warn!("binding to {} without a shared secret (set BOT_SECRET)", bind);
    }

    let backend: Arc<dyn IntentBackend> = Arc::new(SessionGateway::new(settings));
    let mut state = GatewayState::new(backend, secret);
    state.port = config.gateway.port;
    let app = build_router(state, &path);

    let bind_addr = format!("{}:{}", bind, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {} (webhook {})", bind_addr, path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}
