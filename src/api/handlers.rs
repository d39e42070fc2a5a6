//! Axum request handlers for the HTTP API.
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::routes::AppState;
use crate::api::schema::{GenerateVideoRequest, GenerateVideoResponse, HealthResponse, VideoStatusResponse};
use crate::error::{AppError, AppResult};
use crate::task::{TaskId, TaskStatus};

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "AI Video Generation API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "endpoints": {
            "generate": "POST /api/generate-video",
            "status": "GET /api/video-status/{task_id}",
            "videos": "GET /static/videos/{file}",
        }
    }))
}

/// Register a task and start it in the background. Never waits on generation.
pub async fn generate_video(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> AppResult<Json<GenerateVideoResponse>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let fields = request.validate()?;

    let task_id = state.registry.create(fields);
    state.dispatcher.dispatch(task_id);
    tracing::info!(task_id = %task_id, "video generation queued");

    Ok(Json(GenerateVideoResponse {
        task_id: task_id.to_string(),
        status: TaskStatus::Queued,
        message: "Video generation started. Check status using the task ID.".to_string(),
    }))
}

pub async fn video_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> AppResult<Json<VideoStatusResponse>> {
    // A malformed id can never have been issued.
    let id: TaskId = task_id
        .parse()
        .map_err(|_| AppError::NotFound("Task not found".to_string()))?;
    let task = state.registry.get(&id)?;
    Ok(Json(VideoStatusResponse::from(&task)))
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    /// Also contact the provider over the network.
    #[serde(default)]
    pub check: bool,
}

pub async fn health(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HealthQuery>,
) -> Json<HealthResponse> {
    let (provider_reachable, provider_error) = if query.check {
        match state.provider.check_health().await {
            Ok(()) => (Some(true), None),
            Err(e) => {
                tracing::warn!("provider health check failed: {}", e);
                (Some(false), Some(e.to_string()))
            }
        }
    } else {
        (None, None)
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        api_configured: state.provider.is_configured(),
        provider: state.provider.name().to_string(),
        enhancer_configured: state.enhancer.is_configured(),
        provider_reachable,
        provider_error,
    })
}
