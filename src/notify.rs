use crate::error::AppError;
use crate::models::user::UserId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), AppError>;
}

/// Fire-and-forget delivery: spawned, bounded by a timeout, never retried.
/// Failures are logged and never roll back the transition that sent them.
pub fn dispatch(notifier: Arc<dyn Notifier>, user_id: UserId, text: String) {
    tokio::spawn(async move {
        match tokio::time::timeout(SEND_TIMEOUT, notifier.send(user_id, &text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(user_id, error = %e, "notification failed"),
            Err(_) => warn!(user_id, "notification timed out"),
        }
    });
}

/// Message rendering and delivery live outside this service; the default
/// sink just records what would have been sent.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), AppError> {
        info!(user_id, text, "notify");
        Ok(())
    }
}

#[cfg(test)]
pub struct RecordingNotifier {
    pub sent: tokio::sync::Mutex<Vec<(UserId, String)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), AppError> {
        self.sent.lock().await.push((user_id, text.to_string()));
        Ok(())
    }
}
