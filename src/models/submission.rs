use crate::models::task::TaskId;
use crate::models::user::UserId;
use serde::Serialize;

pub type SubmissionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

/// Task proof awaiting admin arbitration. Created `Pending`, finalized
/// exactly once, immutable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub proof_ref: String,
    pub status: SubmissionStatus,
    pub processed_by: Option<UserId>,
    pub processed_at: Option<i64>,
}

impl Submission {
    pub fn new(id: SubmissionId, user_id: UserId, task_id: TaskId, proof_ref: String) -> Self {
        Self {
            id,
            user_id,
            task_id,
            proof_ref,
            status: SubmissionStatus::Pending,
            processed_by: None,
            processed_at: None,
        }
    }
}
