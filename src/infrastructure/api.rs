//! Status API (Cold Path)
//!
//! Exposes tracked pairs and router counters over HTTP.
//! Reads the lane table and metrics via shared state; never touches lanes.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::Level;

use crate::hot_path::{HistoryFilter, LaneTable};
use crate::infrastructure::metrics::{MetricsCollector, MetricsSnapshot};
use crate::RouterError;

/// Router status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    pub tracked_pairs: Vec<String>,
    pub history_pair: Option<String>,
    pub high_water_mark: Option<u64>,
    pub metrics: MetricsSnapshot,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub lanes: LaneTable,
    pub history: Option<HistoryFilter>,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    pub fn status(&self) -> StatusDto {
        StatusDto {
            tracked_pairs: self.lanes.pairs().iter().map(ToString::to_string).collect(),
            history_pair: self.history.as_ref().map(|h| h.pair().to_string()),
            high_water_mark: self.history.as_ref().map(HistoryFilter::high_water_mark),
            metrics: self.metrics.snapshot(),
        }
    }
}

/// Build the API routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/metrics", get(get_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(state: AppState, port: u16) -> Result<(), RouterError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    crate::log_api!(Level::INFO, "API Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, routes(state)).await?;

    Ok(())
}

/// Handler for /api/status
async fn get_status(State(state): State<AppState>) -> Json<StatusDto> {
    Json(state.status())
}

/// Handler for /api/metrics
async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
