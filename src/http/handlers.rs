use super::state::AppState;
use crate::archive::{date_key, WalkEntry, WalkLogMap};
use crate::error::TrackingError;
use crate::platform::{ChannelLocationProvider, Fix, PermissionStatus};
use crate::tracking::{FixOutcome, SessionPhase, WalkSession, WalkSummary};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct FixRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters
    pub accuracy: Option<f64>,
}

impl FixRequest {
    fn to_fix(&self) -> Fix {
        Fix::at(self.latitude, self.longitude, self.accuracy)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartWalkResponse {
    pub walk_id: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FixResponse {
    pub accepted: bool,
    /// seeded | accepted | rejected_accuracy | rejected_jitter
    pub outcome: String,
    pub distance_km: f64,
    pub points: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopWalkRequest {
    /// Note stored with the archived walk
    pub memo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StopWalkResponse {
    pub walk_id: String,
    pub date: String,
    pub summary: WalkSummary,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

fn not_found(walk_id: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("Walk {} not found", walk_id))
}

fn tracking_error_response(e: &TrackingError) -> Response {
    let status = match e {
        TrackingError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        TrackingError::InvalidPhase { .. } | TrackingError::NotOwner => StatusCode::CONFLICT,
        TrackingError::Provider(_) | TrackingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

fn outcome_name(outcome: &FixOutcome) -> &'static str {
    match outcome {
        FixOutcome::Seeded => "seeded",
        FixOutcome::Accepted { .. } => "accepted",
        FixOutcome::RejectedAccuracy { .. } => "rejected_accuracy",
        FixOutcome::RejectedJitter { .. } => "rejected_jitter",
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /walks/start
/// Start a new walk seeded from the client's current position
pub async fn start_walk(State(state): State<AppState>, Json(req): Json<FixRequest>) -> Response {
    // The client only calls this after obtaining location permission itself
    let location = Arc::new(ChannelLocationProvider::new(
        PermissionStatus::Granted,
        PermissionStatus::Denied,
    ));
    location.set_position(req.to_fix()).await;

    let session = WalkSession::new(location, state.tracking.clone());
    let walk_id = session.id().to_string();

    info!("Starting walk: {}", walk_id);

    if let Err(e) = session.start().await {
        error!("Failed to start walk {}: {}", walk_id, e);
        return tracking_error_response(&e);
    }

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(walk_id.clone(), Arc::new(session));
    }

    (
        StatusCode::OK,
        Json(StartWalkResponse {
            walk_id,
            status: "tracking".to_string(),
        }),
    )
        .into_response()
}

/// POST /walks/:walk_id/fixes
/// Submit one position fix to a walk
pub async fn submit_fix(
    State(state): State<AppState>,
    Path(walk_id): Path<String>,
    Json(req): Json<FixRequest>,
) -> Response {
    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&walk_id).cloned()
    };
    let Some(session) = session else {
        return not_found(&walk_id);
    };

    match session.submit_fix(req.to_fix()).await {
        Ok(outcome) => {
            let status = session.status().await;
            (
                StatusCode::OK,
                Json(FixResponse {
                    accepted: outcome.is_accepted(),
                    outcome: outcome_name(&outcome).to_string(),
                    distance_km: status.distance_km,
                    points: status.points,
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Fix rejected for walk {}: {}", walk_id, e);
            tracking_error_response(&e)
        }
    }
}

/// POST /walks/:walk_id/stop
/// Stop a walk and file its summary in the walk log
pub async fn stop_walk(
    State(state): State<AppState>,
    Path(walk_id): Path<String>,
    body: Option<Json<StopWalkRequest>>,
) -> Response {
    info!("Stopping walk: {}", walk_id);

    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&walk_id).cloned()
    };
    let Some(session) = session else {
        error!("Walk {} not found", walk_id);
        return not_found(&walk_id);
    };

    // The session stays registered until it can no longer be stopped, so a
    // failed stop can be retried
    let result = session.stop().await;
    let finished = matches!(
        session.phase().await,
        SessionPhase::Completed | SessionPhase::PermissionDenied
    );
    if finished {
        state.sessions.write().await.remove(&walk_id);
    }

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!("Failed to stop walk {}: {}", walk_id, e);
            return tracking_error_response(&e);
        }
    };

    let req = body.map(|Json(req)| req).unwrap_or_default();
    let ended_at = Utc::now();
    let date = date_key(ended_at);
    let entry = WalkEntry::from_summary(&summary, req.memo.as_deref(), ended_at);

    if let Err(e) = state.archive.add(&date, entry).await {
        // The summary is still returned; only the archive copy is missing
        error!("Failed to archive walk {}: {:#}", walk_id, e);
    }

    (
        StatusCode::OK,
        Json(StopWalkResponse {
            walk_id,
            date,
            summary,
        }),
    )
        .into_response()
}

/// GET /walks/:walk_id/status
/// Get status of a walk session
pub async fn get_walk_status(State(state): State<AppState>, Path(walk_id): Path<String>) -> Response {
    let sessions = state.sessions.read().await;

    match sessions.get(&walk_id) {
        Some(session) => (StatusCode::OK, Json(session.status().await)).into_response(),
        None => not_found(&walk_id),
    }
}

/// GET /walks/log
/// All archived walks grouped by day
pub async fn get_walk_log(State(state): State<AppState>) -> Json<WalkLogMap> {
    Json(state.archive.load().await)
}

/// DELETE /walks/log/:date/:entry_id
/// Remove one archived walk
pub async fn delete_walk_log_entry(
    State(state): State<AppState>,
    Path((date, entry_id)): Path<(String, String)>,
) -> Response {
    match state.archive.remove(&date, &entry_id).await {
        Ok(logs) => (StatusCode::OK, Json(logs)).into_response(),
        Err(e) => {
            error!("Failed to remove walk log entry {}: {:#}", entry_id, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to remove walk log entry: {}", e),
            )
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
