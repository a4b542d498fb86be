use axum::extract::{ConnectInfo, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::{routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::AppError;
use crate::identity::{self, DeviceLink};
use crate::notify::dispatch;
use crate::state::AppState;

#[derive(Deserialize)]
struct VerifyRequest {
    token: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/verify", post(verify))
}

/// Device-verification callback. The fingerprint is derived here from the
/// raw connection facts; the token is single-use, so a replayed callback
/// fails `InvalidToken`.
async fn verify(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let fingerprint = identity::fingerprint(user_agent, &addr.ip().to_string());

    let (user_id, link) = state.identity.register_device(&req.token, &fingerprint).await?;
    match link {
        DeviceLink::Linked => {
            // Completing verification may be the step that unlocks full
            // access, which is the attribution moment.
            state.attribute_if_full(user_id).await;
            Ok(Json(json!({ "status": "linked" })))
        }
        DeviceLink::Collision { owner } => {
            for admin in &state.admin_ids {
                dispatch(
                    state.notifier.clone(),
                    *admin,
                    format!(
                        "device collision: user {} banned, device already owned by {}",
                        user_id, owner
                    ),
                );
            }
            Err(AppError::DeviceCollision { owner })
        }
    }
}
