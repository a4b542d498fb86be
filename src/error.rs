use crate::models::user::UserId;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("submission already processed")]
    AlreadyProcessed,
    #[error("bonus already claimed")]
    AlreadyClaimed,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("invalid or already used verification token")]
    InvalidToken,
    #[error("device already registered to user {owner}")]
    DeviceCollision { owner: UserId },
    #[error("payment rail error: {0}")]
    Rail(String),
    #[error("wallet address not set")]
    WalletMissing,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::AlreadyProcessed | AppError::AlreadyClaimed => StatusCode::CONFLICT,
            AppError::InsufficientBalance | AppError::WalletMissing => StatusCode::BAD_REQUEST,
            AppError::InvalidToken | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::DeviceCollision { .. } => StatusCode::FORBIDDEN,
            AppError::Rail(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
