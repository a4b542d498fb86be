use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::AppError;
use crate::models::submission::SubmissionId;
use crate::models::user::UserId;
use crate::money::Amount;
use crate::notify::dispatch;
use crate::state::AppState;
use crate::submissions::Decision;

#[derive(Deserialize)]
struct BroadcastRequest {
    admin_id: UserId,
    text: String,
}

#[derive(Deserialize)]
struct AddTaskRequest {
    admin_id: UserId,
    description: String,
    reward: Amount,
}

#[derive(Deserialize)]
struct BanRequest {
    admin_id: UserId,
    user_id: UserId,
}

#[derive(Deserialize)]
struct DecideRequest {
    admin_id: UserId,
    submission_id: SubmissionId,
    action: Action,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum Action {
    Approve,
    Reject,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/broadcast", post(broadcast))
        .route("/api/admin/task", post(add_task))
        .route("/api/admin/ban", post(ban))
        .route("/api/admin/decide", post(decide))
}

fn require_admin(state: &AppState, admin_id: UserId) -> Result<(), AppError> {
    if state.is_admin(admin_id) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("admin only".into()))
    }
}

async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, req.admin_id)?;
    let ids = state.store.user_ids().await;
    let reached = ids.len();
    for id in ids {
        dispatch(state.notifier.clone(), id, req.text.clone());
    }
    info!(admin_id = req.admin_id, reached, "broadcast queued");
    Ok(Json(json!({ "status": "queued", "reached": reached })))
}

async fn add_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddTaskRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, req.admin_id)?;
    if !req.reward.is_positive() {
        return Err(AppError::Internal("task reward must be positive".into()));
    }
    let task = state.store.add_task(req.description, req.reward).await;
    info!(task_id = task.id, reward = %task.reward, "task added");
    Ok(Json(json!({ "task": task })))
}

async fn ban(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BanRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, req.admin_id)?;
    let user = state.store.user(req.user_id).await.ok_or(AppError::NotFound)?;
    user.lock().await.banned = true;
    info!(admin_id = req.admin_id, user_id = req.user_id, "user banned");
    Ok(Json(json!({ "status": "banned" })))
}

async fn decide(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DecideRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let decision = match req.action {
        Action::Approve => Decision::Approve,
        Action::Reject => Decision::Reject,
    };
    match state
        .workflow
        .decide(req.submission_id, decision, req.admin_id)
        .await
    {
        Ok(status) => Ok(Json(json!({ "status": status }))),
        // Benign: another admin decided first.
        Err(AppError::AlreadyProcessed) => Ok(Json(json!({ "status": "already_processed" }))),
        Err(e) => Err(e),
    }
}
