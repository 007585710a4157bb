//! HTTP request handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use cpumon_core::Snapshot;

use crate::state::{AppState, SharedCollector, lock};

// ============================================================
// Errors
// ============================================================

/// Error response rendered as `{"error": "..."}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: &self.message,
        });
        (self.status, body).into_response()
    }
}

fn find(state: &AppState, name: &str) -> Result<SharedCollector, ApiError> {
    state
        .collector(name)
        .ok_or_else(|| ApiError::not_found(format!("unknown collector '{}'", name)))
}

/// Runs `f` against a locked collector off the async runtime.
async fn with_collector<T, F>(collector: SharedCollector, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn cpumon_core::MetricsCollector) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = lock(&collector);
        f(&mut **guard)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "collector task panicked");
        ApiError::internal("collector task failed")
    })
}

// ============================================================
// Health / platform
// ============================================================

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PlatformInfo {
    pub(crate) platform: String,
    /// Collector types the platform offers.
    pub(crate) collectors: Vec<String>,
    /// Collector types running in this server.
    pub(crate) enabled: Vec<String>,
}

pub(crate) async fn handle_platform(State(state): State<AppState>) -> Json<PlatformInfo> {
    Json(PlatformInfo {
        platform: state.0.platform_id.clone(),
        collectors: state.0.available.clone(),
        enabled: state.0.collectors.keys().cloned().collect(),
    })
}

// ============================================================
// Objects
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ObjectList {
    pub(crate) objects: Vec<String>,
}

/// Units each enabled collector reports on, e.g. `{"cpu": {"objects": ["cpu0", ...]}}`.
pub(crate) async fn handle_objects(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, ObjectList>>, ApiError> {
    let mut result = BTreeMap::new();
    for (name, collector) in &state.0.collectors {
        let objects = with_collector(collector.clone(), |c| c.enumerate_units()).await?;
        result.insert(name.clone(), ObjectList { objects });
    }
    Ok(Json(result))
}

// ============================================================
// Collectors
// ============================================================

/// Takes a fresh measurement.
pub(crate) async fn handle_snapshot(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Snapshot>, ApiError> {
    let collector = find(&state, &name)?;
    let snapshot = with_collector(collector, |c| c.collect()).await?;
    Ok(Json(snapshot))
}

/// Newest snapshot in the history, without sampling.
pub(crate) async fn handle_latest(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Snapshot>, ApiError> {
    let collector = find(&state, &name)?;
    with_collector(collector, |c| c.latest())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("collector '{}' has no snapshots yet", name)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    /// Most recent N snapshots; all when omitted.
    limit: Option<usize>,
}

/// Rolling history, oldest first.
pub(crate) async fn handle_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Snapshot>>, ApiError> {
    let collector = find(&state, &name)?;
    let history = with_collector(collector, move |c| c.history(query.limit)).await?;
    Ok(Json(history))
}
