use crate::models::submission::{Submission, SubmissionId};
use crate::models::task::{Task, TaskId};
use crate::models::user::{User, UserId};
use crate::money::Amount;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Keyed store with single-writer discipline per user and per submission:
/// every record sits behind its own `Mutex`, so a read-modify-write holds
/// exactly one per-key lock and concurrent duplicate triggers serialize.
///
/// Fingerprint and token lookups go through secondary indices maintained
/// alongside the primary record instead of scanning the user table.
pub struct Store {
    users: RwLock<HashMap<UserId, Arc<Mutex<User>>>>,
    fingerprints: RwLock<HashMap<String, UserId>>,
    tokens: RwLock<HashMap<String, UserId>>,
    tasks: RwLock<Vec<Task>>,
    submissions: RwLock<Vec<Arc<Mutex<Submission>>>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            fingerprints: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            tasks: RwLock::new(Vec::new()),
            submissions: RwLock::new(Vec::new()),
        }
    }

    pub async fn user(&self, id: UserId) -> Option<Arc<Mutex<User>>> {
        self.users.read().await.get(&id).cloned()
    }

    // Create user if not exists; the flag reports whether this call
    // created the record (first contact).
    pub async fn user_or_create(&self, id: UserId) -> (Arc<Mutex<User>>, bool) {
        if let Some(user) = self.users.read().await.get(&id) {
            return (user.clone(), false);
        }
        let mut users = self.users.write().await;
        match users.entry(id) {
            Entry::Occupied(e) => (e.get().clone(), false),
            Entry::Vacant(e) => (e.insert(Arc::new(Mutex::new(User::new(id)))).clone(), true),
        }
    }

    /// Snapshot of all user ids, for broadcast fan-out.
    pub async fn user_ids(&self) -> Vec<UserId> {
        self.users.read().await.keys().copied().collect()
    }

    pub async fn fingerprint_owner(&self, fingerprint: &str) -> Option<UserId> {
        self.fingerprints.read().await.get(fingerprint).copied()
    }

    /// Atomically claims a fingerprint for `user_id` under one write lock.
    /// First writer wins: a fingerprint already owned by another user is
    /// rejected with the owner's id, and the index keeps the original owner.
    pub async fn claim_fingerprint(
        &self,
        fingerprint: &str,
        user_id: UserId,
    ) -> Result<(), UserId> {
        let mut fingerprints = self.fingerprints.write().await;
        match fingerprints.entry(fingerprint.to_string()) {
            Entry::Vacant(e) => {
                e.insert(user_id);
                Ok(())
            }
            Entry::Occupied(e) if *e.get() == user_id => Ok(()),
            Entry::Occupied(e) => Err(*e.get()),
        }
    }

    pub async fn put_token(&self, token: &str, user_id: UserId) {
        self.tokens
            .write()
            .await
            .insert(token.to_string(), user_id);
    }

    /// Resolves and consumes a token in one step. A second call with the
    /// same token returns `None`.
    pub async fn take_token(&self, token: &str) -> Option<UserId> {
        self.tokens.write().await.remove(token)
    }

    pub async fn remove_token(&self, token: &str) {
        self.tokens.write().await.remove(token);
    }

    pub async fn add_task(&self, description: String, reward: Amount) -> Task {
        let mut tasks = self.tasks.write().await;
        let task = Task {
            id: tasks.len() as TaskId + 1,
            description,
            reward,
        };
        tasks.push(task.clone());
        task
    }

    pub async fn task(&self, id: TaskId) -> Option<Task> {
        self.tasks.read().await.iter().find(|t| t.id == id).cloned()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn add_submission(
        &self,
        user_id: UserId,
        task_id: TaskId,
        proof_ref: String,
    ) -> SubmissionId {
        let mut submissions = self.submissions.write().await;
        let id = submissions.len() as SubmissionId + 1;
        submissions.push(Arc::new(Mutex::new(Submission::new(
            id, user_id, task_id, proof_ref,
        ))));
        id
    }

    pub async fn submission(&self, id: SubmissionId) -> Option<Arc<Mutex<Submission>>> {
        if id == 0 {
            return None;
        }
        self.submissions.read().await.get(id as usize - 1).cloned()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn user_or_create_is_stable() {
        let store = Store::new();
        let (a, created_a) = store.user_or_create(7).await;
        let (b, created_b) = store.user_or_create(7).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(store.user_ids().await, vec![7]);
    }

    #[tokio::test]
    async fn token_is_consumed_once() {
        let store = Store::new();
        store.put_token("t1", 3).await;
        assert_eq!(store.take_token("t1").await, Some(3));
        assert_eq!(store.take_token("t1").await, None);
    }

    #[tokio::test]
    async fn fingerprint_claim_keeps_first_owner() {
        let store = Store::new();
        assert_eq!(store.claim_fingerprint("fp", 1).await, Ok(()));
        // Re-claiming one's own fingerprint is fine.
        assert_eq!(store.claim_fingerprint("fp", 1).await, Ok(()));
        assert_eq!(store.claim_fingerprint("fp", 2).await, Err(1));
        assert_eq!(store.fingerprint_owner("fp").await, Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_fingerprint_claims_have_one_winner() {
        let store = Arc::new(Store::new());
        let a = tokio::spawn({
            let store = store.clone();
            async move { store.claim_fingerprint("fp", 1).await }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.claim_fingerprint("fp", 2).await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let winner = if a.is_ok() { 1 } else { 2 };
        assert_eq!(store.fingerprint_owner("fp").await, Some(winner));
        assert_eq!(a.err().or(b.err()), Some(winner));
    }

    #[tokio::test]
    async fn submission_ids_are_monotonic() {
        let store = Store::new();
        let a = store.add_submission(1, 1, "p1".into()).await;
        let b = store.add_submission(2, 1, "p2".into()).await;
        assert_eq!((a, b), (1, 2));
        assert!(store.submission(0).await.is_none());
        assert!(store.submission(3).await.is_none());
    }
}
