use crate::config::Config;
use crate::error::AppError;
use crate::identity::IdentityRegistry;
use crate::ledger::Ledger;
use crate::models::user::UserId;
use crate::notify::Notifier;
use crate::oracle::MembershipOracle;
use crate::policy::{classify, Tier};
use crate::rail::PaymentRail;
use crate::referral::ReferralEngine;
use crate::store::Store;
use std::sync::Arc;

/// Shared handles wired once at startup and cloned into every handler.
pub struct AppState {
    pub store: Arc<Store>,
    pub identity: IdentityRegistry,
    pub ledger: Arc<Ledger>,
    pub workflow: crate::submissions::SubmissionWorkflow,
    pub referral: ReferralEngine,
    pub oracle: Arc<dyn MembershipOracle>,
    pub notifier: Arc<dyn Notifier>,
    pub channel: String,
    pub admin_ids: Vec<UserId>,
}

impl AppState {
    pub fn new(
        config: &Config,
        rail: Arc<dyn PaymentRail>,
        oracle: Arc<dyn MembershipOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let store = Arc::new(Store::new());
        let ledger = Arc::new(Ledger::new(
            store.clone(),
            rail.clone(),
            config.bonus,
            config.min_withdrawal,
        ));
        let workflow = crate::submissions::SubmissionWorkflow::new(
            store.clone(),
            ledger.clone(),
            notifier.clone(),
            config.admin_ids.clone(),
        );
        let referral = ReferralEngine::new(
            store.clone(),
            ledger.clone(),
            rail,
            notifier.clone(),
            config.referral_reward,
        );
        Arc::new(Self {
            identity: IdentityRegistry::new(store.clone()),
            ledger,
            workflow,
            referral,
            oracle,
            notifier,
            channel: config.channel.clone(),
            admin_ids: config.admin_ids.clone(),
            store,
        })
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Current tier for a user, computed from the record and a fresh
    /// membership check.
    pub async fn tier_of(&self, user_id: UserId) -> Result<Tier, AppError> {
        let user = self.store.user(user_id).await.ok_or(AppError::NotFound)?;
        let membership = self.oracle.check(&self.channel, user_id).await;
        let u = user.lock().await;
        Ok(classify(&u, membership))
    }

    /// Gates a command on full access; the error lists what is still
    /// missing, verification before membership.
    pub async fn require_full(&self, user_id: UserId) -> Result<(), AppError> {
        match self.tier_of(user_id).await? {
            Tier::Full => Ok(()),
            Tier::Banned => Err(AppError::Unauthorized("account is banned".into())),
            tier => Err(AppError::Unauthorized(format!(
                "missing: {}",
                tier.missing().join(", ")
            ))),
        }
    }

    /// First contact: creates the user record, and only then parks the
    /// referral code for later attribution. A code offered by an already
    /// known user is ignored, so access gained earlier can never be
    /// attributed retroactively.
    pub async fn register_contact(&self, user_id: UserId, referral_code: Option<String>) {
        let (user, created) = self.store.user_or_create(user_id).await;
        if created {
            if let Some(code) = referral_code {
                user.lock().await.pending_referral = Some(code);
            }
        }
    }

    /// Runs referral attribution the first time a user reaches full
    /// access. The engine's own guards make repeat calls harmless.
    pub async fn attribute_if_full(&self, user_id: UserId) {
        let Ok(Tier::Full) = self.tier_of(user_id).await else {
            return;
        };
        let code = {
            let Some(user) = self.store.user(user_id).await else {
                return;
            };
            let mut u = user.lock().await;
            u.pending_referral.take()
        };
        if let Some(code) = code {
            self.referral.attribute(user_id, Some(&code)).await;
        }
    }
}
