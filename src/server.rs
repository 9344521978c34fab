use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Result;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::metrics::Metrics;
use crate::protocol::{Interaction, InteractionKind, InteractionResponse};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Arc<Metrics>,
}

pub fn router(state: AppState, interactions_path: &str) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats_handler))
        .route(interactions_path, post(interactions_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config, dispatcher: Arc<Dispatcher>, metrics: Arc<Metrics>) -> Result<()> {
    let state = AppState { dispatcher, metrics };
    let app = router(state, &config.server.interactions_path);

    let addr: SocketAddr = config.server.bind_addr.parse()?;
    info!("Interactions endpoint listening on {}{}", addr, config.server.interactions_path);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "active_listings": state.dispatcher.active_sessions(),
        "tracked_users": state.dispatcher.tracked_users(),
        "counters": state.metrics.snapshot(),
    }))
}

/// PING and autocomplete are answered in the response body. Everything
/// else is acknowledged with 202 and handled on its own task.
async fn interactions_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(i) => i,
        Err(e) => {
            warn!("Invalid interaction payload: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid interaction payload").into_response();
        }
    };

    match interaction.kind {
        InteractionKind::Ping => Json(InteractionResponse::pong()).into_response(),
        InteractionKind::Autocomplete => {
            Json(state.dispatcher.autocomplete(&interaction)).into_response()
        }
        _ => {
            let dispatcher = state.dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.dispatch(interaction).await;
            });
            StatusCode::ACCEPTED.into_response()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
