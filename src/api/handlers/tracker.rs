use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::services::wallet_tracker::TrackedWallet;
use crate::workerpool::PoolMetrics;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddTrackerRequest {
    pub walletaddress: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTrackerResponse {
    pub message: String,
    pub task_id: String,
    pub priority: i32,
    pub timeout: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub task_id: String,
}

pub async fn add(
    State(state): State<AppState>,
    Json(body): Json<AddTrackerRequest>,
) -> Result<(StatusCode, Json<AddTrackerResponse>), AppError> {
    let wallet = body.walletaddress.trim();
    if wallet.is_empty() {
        return Err(AppError::BadRequest("walletaddress is required".into()));
    }

    let tracked = state.tracker.track(wallet).await?;
    let timeout = match tracked.timeout_secs {
        Some(secs) => format!("{secs}s"),
        None => "none".into(),
    };

    Ok((
        StatusCode::CREATED,
        Json(AddTrackerResponse {
            message: "Wallet tracker added".into(),
            task_id: tracked.task_id,
            priority: tracked.priority,
            timeout,
        }),
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Value>, AppError> {
    if !state.tracker.untrack(&query.task_id).await {
        return Err(AppError::NotFound("Task not found".into()));
    }
    Ok(Json(json!({ "message": "Task canceled", "taskId": query.task_id })))
}

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let tasks: Vec<TrackedWallet> = state.tracker.list().await;
    Json(json!({ "tasks": tasks }))
}

pub async fn metrics(State(state): State<AppState>) -> Json<PoolMetrics> {
    Json(state.tracker.metrics().await)
}

pub async fn shutdown(State(state): State<AppState>) -> Json<Value> {
    let tracker = state.tracker.clone();
    tokio::spawn(async move { tracker.shutdown().await });
    Json(json!({ "message": "Worker pool is shutting down" }))
}
