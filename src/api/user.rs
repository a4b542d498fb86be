use axum::extract::{Query, State};
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::task::TaskId;
use crate::models::user::UserId;
use crate::state::AppState;
use serde_json::json;

#[derive(Deserialize)]
struct StartRequest {
    user_id: UserId,
    referral_code: Option<String>,
}

#[derive(Deserialize)]
struct UserRequest {
    user_id: UserId,
}

#[derive(Deserialize)]
struct WalletRequest {
    user_id: UserId,
    wallet_address: String,
}

#[derive(Deserialize)]
struct SubmitRequest {
    user_id: UserId,
    task_id: TaskId,
    proof_ref: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user/start", post(start))
        .route("/api/user/verify_link", get(verify_link))
        .route("/api/user/status", get(status))
        .route("/api/user/claim_bonus", post(claim_bonus))
        .route("/api/user/wallet", post(set_wallet))
        .route("/api/user/withdraw", post(withdraw))
        .route("/api/user/submit", post(submit))
}

/// First contact: creates the user record and parks the referral code
/// until the user first reaches full access. A code sent on a repeat
/// start is ignored.
async fn start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.register_contact(req.user_id, req.referral_code).await;
    Ok(Json(json!({ "status": "started" })))
}

async fn verify_link(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = parse_user_id(&params)?;
    state.store.user_or_create(user_id).await;
    let token = state.identity.issue_token(user_id).await?;
    Ok(Json(json!({ "token": token })))
}

async fn status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = parse_user_id(&params)?;
    // A membership change can complete the user's access here.
    state.attribute_if_full(user_id).await;

    let tier = state.tier_of(user_id).await?;
    let user = state.store.user(user_id).await.ok_or(AppError::NotFound)?;
    let u = user.lock().await;
    Ok(Json(json!({
        "tier": tier,
        "missing": tier.missing(),
        "balance": u.balance,
        "referral_count": u.referral_count,
        "wallet_address": u.wallet_address,
    })))
}

async fn claim_bonus(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.require_full(req.user_id).await?;
    match state.ledger.claim_bonus(req.user_id).await {
        Ok(balance) => Ok(Json(json!({ "status": "claimed", "balance": balance }))),
        // Benign no-op: the bonus was granted before.
        Err(AppError::AlreadyClaimed) => Ok(Json(json!({ "status": "already_claimed" }))),
        Err(e) => Err(e),
    }
}

async fn set_wallet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WalletRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.require_full(req.user_id).await?;
    let user = state.store.user(req.user_id).await.ok_or(AppError::NotFound)?;
    user.lock().await.wallet_address = Some(req.wallet_address);
    Ok(Json(json!({ "status": "wallet saved" })))
}

async fn withdraw(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.require_full(req.user_id).await?;
    let (amount, tx) = state.ledger.withdraw(req.user_id).await?;
    Ok(Json(json!({ "status": "sent", "amount": amount, "tx": tx })))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.require_full(req.user_id).await?;
    let id = state
        .workflow
        .submit(req.user_id, req.task_id, req.proof_ref)
        .await?;
    Ok(Json(json!({ "status": "pending review", "submission_id": id })))
}

fn parse_user_id(params: &HashMap<String, String>) -> Result<UserId, AppError> {
    params
        .get("user_id")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::BadRequest("missing or invalid user_id parameter".into()))
}
