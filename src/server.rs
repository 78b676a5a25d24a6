//! HTTP trigger and status server.
//!
//! A small JSON API around the [`RunCoordinator`]. There is no
//! authentication; bind it to a private interface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/run` | Run the pipeline now; `409` with `{"status":"busy"}` if one is in flight |
//! | `GET`  | `/status` | Busy flag, last run outcome, next scheduled run |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /run` responds once the run has finished:
//!
//! ```json
//! { "status": "ok", "lastRun": "2024-05-01T12:00:03Z",
//!   "report": { "newBridges": {...}, "duplicateBridges": {...}, "malformedBridges": [...] } }
//! ```

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::pipeline::Harvester;
use crate::runner::{RunCoordinator, TriggerOutcome};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub harvester: Arc<Harvester>,
    pub coordinator: Arc<RunCoordinator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/run", post(handle_run))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Binds `bind_addr` and serves until the process is terminated.
pub async fn run_server(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    serve(listener, state).await
}

/// Serves on an already-bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============ POST /run ============

async fn handle_run(State(state): State<AppState>) -> (StatusCode, Json<TriggerOutcome>) {
    let outcome = state.coordinator.trigger(&state.harvester).await;
    let status = match outcome {
        TriggerOutcome::Busy => StatusCode::CONFLICT,
        TriggerOutcome::Completed { .. } => StatusCode::OK,
        TriggerOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(outcome))
}

// ============ GET /status ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    running: bool,
    next_run: Option<DateTime<Utc>>,
    last: Option<TriggerOutcome>,
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.coordinator.is_running(),
        next_run: state.coordinator.next_run().await,
        last: state.coordinator.last_outcome().await,
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
