use crate::money::Amount;
use serde::Serialize;

pub type TaskId = u64;

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub reward: Amount,
}
