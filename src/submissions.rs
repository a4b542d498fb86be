use crate::error::AppError;
use crate::ledger::Ledger;
use crate::models::submission::{SubmissionId, SubmissionStatus};
use crate::models::task::TaskId;
use crate::models::user::UserId;
use crate::notify::{dispatch, Notifier};
use crate::store::Store;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Pending -> {Approved, Rejected} state machine for task proofs. The
/// terminal transition is a compare-and-set under the submission lock, so
/// racing admin decisions resolve to exactly one winner.
pub struct SubmissionWorkflow {
    store: Arc<Store>,
    ledger: Arc<Ledger>,
    notifier: Arc<dyn Notifier>,
    admin_ids: Vec<UserId>,
}

impl SubmissionWorkflow {
    pub fn new(
        store: Arc<Store>,
        ledger: Arc<Ledger>,
        notifier: Arc<dyn Notifier>,
        admin_ids: Vec<UserId>,
    ) -> Self {
        Self {
            store,
            ledger,
            notifier,
            admin_ids,
        }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Records a proof and fans a review request out to every admin.
    /// Delivery failures to individual admins never fail the submission.
    pub async fn submit(
        &self,
        user_id: UserId,
        task_id: TaskId,
        proof_ref: String,
    ) -> Result<SubmissionId, AppError> {
        let task = self.store.task(task_id).await.ok_or(AppError::NotFound)?;
        let id = self.store.add_submission(user_id, task_id, proof_ref).await;
        info!(submission_id = id, user_id, task_id, "submission created");

        for admin in &self.admin_ids {
            dispatch(
                self.notifier.clone(),
                *admin,
                format!(
                    "submission #{} from user {} for task \"{}\" awaits review",
                    id, user_id, task.description
                ),
            );
        }
        Ok(id)
    }

    /// Finalizes a pending submission. The loser of a race gets
    /// `AlreadyProcessed` and causes no side effect; approval grants the
    /// task reward before the status flips, both under the submission lock.
    pub async fn decide(
        &self,
        submission_id: SubmissionId,
        decision: Decision,
        actor: UserId,
    ) -> Result<SubmissionStatus, AppError> {
        if !self.is_admin(actor) {
            return Err(AppError::Unauthorized(
                "only admins can decide submissions".into(),
            ));
        }
        let submission = self
            .store
            .submission(submission_id)
            .await
            .ok_or(AppError::NotFound)?;

        let mut s = submission.lock().await;
        if s.status != SubmissionStatus::Pending {
            return Err(AppError::AlreadyProcessed);
        }

        let status = match decision {
            Decision::Approve => {
                let task = self.store.task(s.task_id).await.ok_or(AppError::NotFound)?;
                self.ledger.grant_task_reward(s.user_id, &task).await?;
                SubmissionStatus::Approved
            }
            Decision::Reject => SubmissionStatus::Rejected,
        };
        s.status = status;
        s.processed_by = Some(actor);
        s.processed_at = Some(chrono::Utc::now().timestamp());
        info!(submission_id, actor, ?status, "submission finalized");

        dispatch(
            self.notifier.clone(),
            s.user_id,
            match status {
                SubmissionStatus::Approved => format!("submission #{} approved", submission_id),
                _ => format!("submission #{} rejected", submission_id),
            },
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Amount;
    use crate::notify::RecordingNotifier;
    use crate::rail::MockRail;

    fn amt(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    async fn workflow() -> (Arc<Store>, Arc<RecordingNotifier>, SubmissionWorkflow) {
        let store = Arc::new(Store::new());
        let rail = Arc::new(MockRail::new(Amount::ZERO));
        let ledger = Arc::new(Ledger::new(
            store.clone(),
            rail,
            amt("0.01"),
            amt("0.2"),
        ));
        let notifier = Arc::new(RecordingNotifier::new());
        let workflow = SubmissionWorkflow::new(
            store.clone(),
            ledger,
            notifier.clone(),
            vec![100, 101],
        );
        store.user_or_create(1).await;
        (store, notifier, workflow)
    }

    async fn balance_of(store: &Store, id: UserId) -> Amount {
        store.user(id).await.unwrap().lock().await.balance
    }

    #[tokio::test]
    async fn submit_requires_existing_task() {
        let (_, _, workflow) = workflow().await;
        let err = workflow.submit(1, 42, "proof".into()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn approve_grants_reward_once() {
        let (store, _, workflow) = workflow().await;
        let task = store.add_task("join beta".into(), amt("0.25")).await;
        let id = workflow.submit(1, task.id, "proof".into()).await.unwrap();

        let status = workflow.decide(id, Decision::Approve, 100).await.unwrap();
        assert_eq!(status, SubmissionStatus::Approved);
        assert_eq!(balance_of(&store, 1).await, amt("0.25"));

        let err = workflow.decide(id, Decision::Approve, 101).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyProcessed));
        assert_eq!(balance_of(&store, 1).await, amt("0.25"));
    }

    #[tokio::test]
    async fn concurrent_decisions_have_one_winner() {
        let (store, _, workflow) = workflow().await;
        let task = store.add_task("task".into(), amt("0.25")).await;
        let id = workflow.submit(1, task.id, "proof".into()).await.unwrap();

        let (a, b) = tokio::join!(
            workflow.decide(id, Decision::Approve, 100),
            workflow.decide(id, Decision::Approve, 101)
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(balance_of(&store, 1).await, amt("0.25"));

        let submission = store.submission(id).await.unwrap();
        assert_eq!(
            submission.lock().await.status,
            SubmissionStatus::Approved
        );
    }

    #[tokio::test]
    async fn reject_has_no_ledger_effect() {
        let (store, _, workflow) = workflow().await;
        let task = store.add_task("task".into(), amt("0.25")).await;
        let id = workflow.submit(1, task.id, "proof".into()).await.unwrap();

        let status = workflow.decide(id, Decision::Reject, 100).await.unwrap();
        assert_eq!(status, SubmissionStatus::Rejected);
        assert_eq!(balance_of(&store, 1).await, Amount::ZERO);

        let submission = store.submission(id).await.unwrap();
        let s = submission.lock().await;
        assert_eq!(s.processed_by, Some(100));
        assert!(s.processed_at.is_some());
    }

    #[tokio::test]
    async fn non_admin_cannot_decide() {
        let (store, _, workflow) = workflow().await;
        let task = store.add_task("task".into(), amt("0.25")).await;
        let id = workflow.submit(1, task.id, "proof".into()).await.unwrap();

        let err = workflow.decide(id, Decision::Approve, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        let submission = store.submission(id).await.unwrap();
        assert_eq!(submission.lock().await.status, SubmissionStatus::Pending);
    }
}
