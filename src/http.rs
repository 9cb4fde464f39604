//! Web transport.
//!
//! Serves `GET /metrics` for Prometheus and routes every other request path
//! (`/module/Class/function?k=v`) through [`Dispatcher::dispatch_web`].
//! Runs on its own tokio task until the shutdown token fires.

use crate::config::WebConfig;
use crate::dispatch::{Dispatcher, Outcome};
use crate::error::DispatchError;
use axum::extract::{ConnectInfo, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn command_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    uri: Uri,
) -> Response {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    let outcome = dispatcher.dispatch_web(target, Some(peer)).await;
    into_response(outcome)
}

/// Map a command outcome to an HTTP reply.
fn into_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Succeeded(value) => Json(value.to_json()).into_response(),
        Outcome::Spawned => StatusCode::ACCEPTED.into_response(),
        Outcome::HelpReturned(doc) => Json(json!({ "help": doc })).into_response(),
        Outcome::Rejected(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid-request", "desc": e.to_string() })),
        )
            .into_response(),
        Outcome::Denied(e) => {
            (StatusCode::FORBIDDEN, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Outcome::NotFound(DispatchError::UnknownModule { .. }) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown-mod" }))).into_response()
        }
        Outcome::NotFound(e) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Outcome::Failed(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .fallback(command_handler)
        .with_state(dispatcher)
}

/// Bind the web listener.
pub async fn bind(config: &WebConfig) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(config.address).await?;
    info!(address = %listener.local_addr()?, "Web listener bound");
    Ok(listener)
}

/// Serve until `shutdown` fires.
pub async fn run_http_server(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
) {
    let app = router(dispatcher).into_make_service_with_connect_info::<SocketAddr>();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
    if let Err(e) = served {
        error!(error = %e, "HTTP server error");
    }
    info!("Web listener stopped");
}
