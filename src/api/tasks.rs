use crate::state::AppState;
use axum::extract::State;
use axum::{routing::get, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/tasks", get(get_tasks))
}

async fn get_tasks(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let tasks = state.store.tasks().await;
    Json(serde_json::json!(tasks))
}
