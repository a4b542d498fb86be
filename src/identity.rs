use crate::error::AppError;
use crate::models::user::UserId;
use crate::store::Store;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceLink {
    Linked,
    Collision { owner: UserId },
}

/// Fingerprint and token indices plus collision detection. Fingerprints are
/// heuristic digests, deliberately coarse (NAT neighbours can collide) and
/// never treated as strong identity.
pub struct IdentityRegistry {
    store: Arc<Store>,
}

impl IdentityRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Issues a fresh single-use verification token, invalidating any prior
    /// pending token for the user.
    pub async fn issue_token(&self, user_id: UserId) -> Result<String, AppError> {
        let user = self.store.user(user_id).await.ok_or(AppError::NotFound)?;
        let token = Uuid::new_v4().simple().to_string();

        let mut u = user.lock().await;
        if let Some(old) = u.pending_token.take() {
            self.store.remove_token(&old).await;
        }
        self.store.put_token(&token, user_id).await;
        u.pending_token = Some(token.clone());
        info!(user_id, "verification token issued");
        Ok(token)
    }

    /// Resolves a token to its user and records the device fingerprint.
    /// The token is consumed unconditionally, before the outcome is known;
    /// replays fail `InvalidToken`. A fingerprint already owned by another
    /// user bans the caller and reports the prior owner, whose own state is
    /// left untouched.
    pub async fn register_device(
        &self,
        token: &str,
        fingerprint: &str,
    ) -> Result<(UserId, DeviceLink), AppError> {
        let user_id = self
            .store
            .take_token(token)
            .await
            .ok_or(AppError::InvalidToken)?;
        let user = self.store.user(user_id).await.ok_or(AppError::NotFound)?;

        let mut u = user.lock().await;
        if u.pending_token.as_deref() == Some(token) {
            u.pending_token = None;
        }
        // Record the fingerprint either way so later collisions stay visible.
        u.device_fingerprint = Some(fingerprint.to_string());

        // The claim decides ownership under a single index lock, so two
        // racing registrations of the same fingerprint get exactly one
        // Linked outcome.
        match self.store.claim_fingerprint(fingerprint, user_id).await {
            Ok(()) => {
                info!(user_id, "device linked");
                Ok((user_id, DeviceLink::Linked))
            }
            Err(owner) => {
                u.banned = true;
                warn!(user_id, owner, "device fingerprint collision, user banned");
                Ok((user_id, DeviceLink::Collision { owner }))
            }
        }
    }
}

/// Deterministic digest over the user-agent and the first two groups of the
/// client network address. Heuristic by design: coarse prefixes make NAT
/// siblings collide, which is the point.
pub fn fingerprint(user_agent: &str, remote_addr: &str) -> String {
    let sep = if remote_addr.contains('.') { '.' } else { ':' };
    let prefix: Vec<&str> = remote_addr.split(sep).take(2).collect();

    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(b"|");
    hasher.update(prefix.join(".").as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (Arc<Store>, IdentityRegistry) {
        let store = Arc::new(Store::new());
        let registry = IdentityRegistry::new(store.clone());
        (store, registry)
    }

    #[test]
    fn fingerprint_uses_address_prefix_only() {
        let a = fingerprint("agent", "10.20.30.40");
        let b = fingerprint("agent", "10.20.99.1");
        let c = fingerprint("agent", "10.21.30.40");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, fingerprint("other-agent", "10.20.30.40"));
    }

    #[tokio::test]
    async fn issuing_overwrites_prior_token() {
        let (store, registry) = registry();
        store.user_or_create(1).await;
        let t1 = registry.issue_token(1).await.unwrap();
        let t2 = registry.issue_token(1).await.unwrap();
        assert_ne!(t1, t2);

        let err = registry.register_device(&t1, "fp").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
        let (id, link) = registry.register_device(&t2, "fp").await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(link, DeviceLink::Linked);
    }

    #[tokio::test]
    async fn token_replay_is_rejected() {
        let (store, registry) = registry();
        store.user_or_create(1).await;
        let token = registry.issue_token(1).await.unwrap();
        registry.register_device(&token, "fp").await.unwrap();

        let err = registry.register_device(&token, "fp").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn collision_bans_second_claimant_only() {
        let (store, registry) = registry();
        store.user_or_create(1).await;
        store.user_or_create(2).await;

        let t1 = registry.issue_token(1).await.unwrap();
        let (_, link) = registry.register_device(&t1, "shared-fp").await.unwrap();
        assert_eq!(link, DeviceLink::Linked);

        let t2 = registry.issue_token(2).await.unwrap();
        let (_, link) = registry.register_device(&t2, "shared-fp").await.unwrap();
        assert_eq!(link, DeviceLink::Collision { owner: 1 });

        let first = store.user(1).await.unwrap();
        let first = first.lock().await;
        assert!(!first.banned);
        assert_eq!(first.device_fingerprint.as_deref(), Some("shared-fp"));

        let second = store.user(2).await.unwrap();
        let second = second.lock().await;
        assert!(second.banned);
        // The second claimant's fingerprint is recorded anyway.
        assert_eq!(second.device_fingerprint.as_deref(), Some("shared-fp"));
        // The index still points at the first owner.
        assert_eq!(store.fingerprint_owner("shared-fp").await, Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_registrations_of_one_fingerprint_ban_exactly_one() {
        let (store, registry) = registry();
        store.user_or_create(1).await;
        store.user_or_create(2).await;
        let t1 = registry.issue_token(1).await.unwrap();
        let t2 = registry.issue_token(2).await.unwrap();

        let registry = Arc::new(registry);
        let a = tokio::spawn({
            let registry = registry.clone();
            async move { registry.register_device(&t1, "fp").await.unwrap() }
        });
        let b = tokio::spawn({
            let registry = registry.clone();
            async move { registry.register_device(&t2, "fp").await.unwrap() }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let linked = [a, b]
            .iter()
            .filter(|(_, link)| *link == DeviceLink::Linked)
            .count();
        assert_eq!(linked, 1);

        let (winner, loser) = if a.1 == DeviceLink::Linked {
            (a.0, b.0)
        } else {
            (b.0, a.0)
        };
        assert_eq!(store.fingerprint_owner("fp").await, Some(winner));
        assert!(!store.user(winner).await.unwrap().lock().await.banned);
        assert!(store.user(loser).await.unwrap().lock().await.banned);
    }

    #[tokio::test]
    async fn re_registering_own_fingerprint_is_not_a_collision() {
        let (store, registry) = registry();
        store.user_or_create(1).await;
        let t1 = registry.issue_token(1).await.unwrap();
        registry.register_device(&t1, "fp").await.unwrap();

        let t2 = registry.issue_token(1).await.unwrap();
        let (_, link) = registry.register_device(&t2, "fp").await.unwrap();
        assert_eq!(link, DeviceLink::Linked);
        assert!(!store.user(1).await.unwrap().lock().await.banned);
    }
}
