// Integration tests for the HTTP API
//
// Requests go straight into the router via tower's `oneshot`, no socket.

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use walk_tracker::{
    create_router, AppState, ChannelLocationProvider, Fix, MemoryStore, TrackingConfig, WalkArchive,
    WalkSession,
};

fn app() -> (Router, Arc<WalkArchive>) {
    let archive = Arc::new(WalkArchive::new(Arc::new(MemoryStore::new())));
    let router = create_router(AppState::new(archive.clone(), TrackingConfig::default()));
    (router, archive)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    Ok((status, value))
}

async fn start(app: &Router) -> Result<String> {
    let (status, body) = send(
        app,
        "POST",
        "/walks/start",
        Some(json!({"latitude": 37.5, "longitude": 127.0, "accuracy": 5.0})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "tracking");
    Ok(body["walk_id"].as_str().expect("walk id").to_string())
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let (app, _) = app();
    let (status, body) = send(&app, "GET", "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
    Ok(())
}

#[tokio::test]
async fn test_walk_lifecycle_over_http() -> Result<()> {
    let (app, archive) = app();
    let walk_id = start(&app).await?;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/walks/{}/fixes", walk_id),
        Some(json!({"latitude": 37.5005, "longitude": 127.0, "accuracy": 5.0})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);
    assert_eq!(body["outcome"], "accepted");
    assert_eq!(body["points"], 2);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/walks/{}/fixes", walk_id),
        Some(json!({"latitude": 37.6, "longitude": 127.0, "accuracy": 120.0})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], false);
    assert_eq!(body["outcome"], "rejected_accuracy");
    assert_eq!(body["points"], 2);

    let (status, body) = send(&app, "GET", &format!("/walks/{}/status", walk_id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "tracking");
    assert_eq!(body["points"], 2);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/walks/{}/stop", walk_id),
        Some(json!({"memo": "  park loop "})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["walk_id"], walk_id.as_str());
    assert_eq!(body["summary"]["path"].as_array().map(Vec::len), Some(2));
    let distance = body["summary"]["distance"].as_f64().expect("distance");
    assert!((distance - 0.0556).abs() < 0.001, "distance was {}", distance);

    let date = body["date"].as_str().expect("date").to_string();
    let logs = archive.load().await;
    let entries = &logs[&date];
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].memo.as_deref(), Some("park loop"));

    // The walk is gone once stopped
    let (status, _) = send(&app, "GET", &format!("/walks/{}/status", walk_id), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_stop_without_body_archives_walk() -> Result<()> {
    let (app, _) = app();
    let walk_id = start(&app).await?;

    let (status, body) = send(&app, "POST", &format!("/walks/{}/stop", walk_id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["distance"], 0.0);

    let (status, logs) = send(&app, "GET", "/walks/log", None).await?;
    assert_eq!(status, StatusCode::OK);
    let date = body["date"].as_str().expect("date");
    assert_eq!(logs[date].as_array().map(Vec::len), Some(1));
    assert!(logs[date][0].get("memo").is_none());
    Ok(())
}

#[tokio::test]
async fn test_unknown_walk_is_not_found() -> Result<()> {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        "POST",
        "/walks/walk-missing/fixes",
        Some(json!({"latitude": 37.5, "longitude": 127.0})),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap_or_default().contains("walk-missing"));

    let (status, _) = send(&app, "POST", "/walks/walk-missing/stop", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_failed_stop_keeps_walk_for_retry() -> Result<()> {
    let archive = Arc::new(WalkArchive::new(Arc::new(MemoryStore::new())));
    let state = AppState::new(archive, TrackingConfig::default());
    let app = create_router(state.clone());

    let location = Arc::new(ChannelLocationProvider::granted());
    location.set_position(Fix::at(37.5, 127.0, Some(5.0))).await;
    let session = Arc::new(WalkSession::with_id(
        "walk-away".to_string(),
        location,
        TrackingConfig::default(),
    ));
    session.start().await?;
    let handed = session.hand_off().await?;
    state
        .sessions
        .write()
        .await
        .insert("walk-away".to_string(), session.clone());

    // Backgrounded walks cannot be stopped from here
    let (status, _) = send(&app, "POST", "/walks/walk-away/stop", None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "GET", "/walks/walk-away/status", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "backgrounded");

    session.resume(handed).await?;
    let (status, _) = send(&app, "POST", "/walks/walk-away/stop", None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/walks/walk-away/status", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_delete_archived_walk() -> Result<()> {
    let (app, archive) = app();
    let walk_id = start(&app).await?;
    let (_, body) = send(&app, "POST", &format!("/walks/{}/stop", walk_id), None).await?;
    let date = body["date"].as_str().expect("date").to_string();

    let entry_id = archive.load().await[&date][0].id.clone();
    let (status, logs) = send(
        &app,
        "DELETE",
        &format!("/walks/log/{}/{}", date, urlencode(&entry_id)),
        None,
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert!(logs.get(&date).is_none());
    assert!(archive.load().await.is_empty());
    Ok(())
}

// Entry ids are RFC 3339 timestamps; `+` must not reach the router raw
fn urlencode(id: &str) -> String {
    id.replace('+', "%2B").replace(':', "%3A")
}
