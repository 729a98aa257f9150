use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::config::WebhookConfig;
use crate::light::LightGate;

const BIND_RETRY_BASE: Duration = Duration::from_millis(250);
const BIND_RETRY_MAX: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct WebhookState {
    gate: LightGate,
    token: Option<Arc<str>>,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    tv: Option<String>,
    token: Option<String>,
}

/// `GET /state` and `GET /tv/state` with `tv=on|off` and an optional `token`.
/// Other methods on those paths get 404, like unknown paths.
pub fn router(gate: LightGate, token: Option<String>) -> Router {
    let state = WebhookState {
        gate,
        token: token.map(Arc::from),
    };
    Router::new()
        .route("/state", get(set_tv_state).fallback(not_found))
        .route("/tv/state", get(set_tv_state).fallback(not_found))
        .fallback(not_found)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the status webhook until `cancel` fires.
///
/// Binding is retried with backoff so a freshly relaunched process can wait
/// for its predecessor to release the port.
pub fn spawn(cfg: &WebhookConfig, gate: LightGate, cancel: CancellationToken) -> JoinHandle<()> {
    let bind_addr = cfg.socket_addr();
    let attempts = cfg.bind_attempts;
    let app = router(gate, cfg.token.clone());

    tokio::spawn(async move {
        let Some(listener) = bind_with_retry(bind_addr, attempts, &cancel).await else {
            return;
        };
        tracing::info!(%bind_addr, "status webhook listening");
        let shutdown = cancel.clone();
        if let Err(err) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await
        {
            tracing::error!(error = %err, "status webhook failed");
        }
    })
}

async fn bind_with_retry(
    bind_addr: SocketAddr,
    attempts: u32,
    cancel: &CancellationToken,
) -> Option<TcpListener> {
    let mut delay = BIND_RETRY_BASE;
    for attempt in 1..=attempts {
        match TcpListener::bind(bind_addr).await {
            Ok(listener) => return Some(listener),
            Err(err) if attempt < attempts => {
                tracing::warn!(error = %err, %bind_addr, attempt, "webhook port busy; retrying");
            }
            Err(err) => {
                tracing::error!(error = %err, %bind_addr, "failed to bind status webhook; tv state stays fixed");
                return None;
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(BIND_RETRY_MAX);
    }
    None
}

async fn set_tv_state(
    State(state): State<WebhookState>,
    Query(query): Query<StatusQuery>,
) -> (StatusCode, String) {
    if let Some(expected) = state.token.as_deref() {
        if query.token.as_deref() != Some(expected) {
            tracing::warn!("status webhook rejected: bad token");
            return (StatusCode::FORBIDDEN, "forbidden".into());
        }
    }
    let on = match query.tv.as_deref().map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("on") => true,
        Some(v) if v.eq_ignore_ascii_case("off") => false,
        _ => return (StatusCode::BAD_REQUEST, "expected tv=on or tv=off".into()),
    };
    if state.gate.set(on) != on {
        tracing::info!(tv = if on { "on" } else { "off" }, "tv state changed");
    }
    (StatusCode::OK, format!("ok:{}", if on { "True" } else { "False" }))
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}
