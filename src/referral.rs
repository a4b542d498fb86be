use crate::ledger::Ledger;
use crate::models::user::UserId;
use crate::notify::{dispatch, Notifier};
use crate::rail::PaymentRail;
use crate::store::Store;
use crate::money::Amount;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// First-writer-wins referral attribution. Invoked when a user first
/// reaches full access; every rejection path is a silent no-op.
pub struct ReferralEngine {
    store: Arc<Store>,
    ledger: Arc<Ledger>,
    rail: Arc<dyn PaymentRail>,
    notifier: Arc<dyn Notifier>,
    reward: Amount,
}

impl ReferralEngine {
    pub fn new(
        store: Arc<Store>,
        ledger: Arc<Ledger>,
        rail: Arc<dyn PaymentRail>,
        notifier: Arc<dyn Notifier>,
        reward: Amount,
    ) -> Self {
        Self {
            store,
            ledger,
            rail,
            notifier,
            reward,
        }
    }

    /// Attributes `new_user_id` to the referrer encoded in `code` and pays
    /// the referrer. The counter increments exactly once per attribution,
    /// independent of which payout path succeeds.
    pub async fn attribute(&self, new_user_id: UserId, code: Option<&str>) {
        let Some(code) = code else { return };
        let Ok(referrer_id) = code.trim().parse::<UserId>() else {
            debug!(new_user_id, code, "unparseable referral code, ignored");
            return;
        };
        if referrer_id == new_user_id {
            debug!(new_user_id, "self-referral ignored");
            return;
        }
        let Some(referrer) = self.store.user(referrer_id).await else {
            debug!(new_user_id, referrer_id, "unknown referrer, ignored");
            return;
        };
        let Some(new_user) = self.store.user(new_user_id).await else {
            return;
        };

        // First successful attribution is permanent.
        {
            let mut u = new_user.lock().await;
            if u.referred_by.is_some() {
                return;
            }
            u.referred_by = Some(referrer_id);
        }

        let wallet = {
            let mut r = referrer.lock().await;
            r.referral_count += 1;
            r.wallet_address.clone()
        };
        info!(new_user_id, referrer_id, "referral attributed");

        let paid_on_rail = match wallet {
            Some(wallet) => self.pay_on_rail(&wallet).await,
            None => false,
        };
        if !paid_on_rail {
            // Fallback keeps the payout inside the ledger.
            if let Err(e) = self
                .ledger
                .credit(referrer_id, self.reward, "referral reward")
                .await
            {
                warn!(referrer_id, error = %e, "referral fallback credit failed");
            }
        }

        dispatch(
            self.notifier.clone(),
            referrer_id,
            format!("referral reward of {} for inviting a new member", self.reward),
        );
    }

    async fn pay_on_rail(&self, wallet: &str) -> bool {
        match self.rail.operating_balance().await {
            Ok(balance) if balance >= self.reward => {
                match self.rail.transfer(wallet, self.reward).await {
                    Ok(tx) => {
                        info!(wallet, tx = %tx, "referral paid on rail");
                        true
                    }
                    Err(e) => {
                        warn!(wallet, error = %e, "rail payout failed, falling back to ledger");
                        false
                    }
                }
            }
            Ok(_) => {
                debug!("rail operating balance too low, falling back to ledger");
                false
            }
            Err(e) => {
                warn!(error = %e, "rail balance query failed, falling back to ledger");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rail::MockRail;
    use crate::notify::RecordingNotifier;

    fn amt(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    async fn engine(rail: MockRail) -> (Arc<Store>, Arc<MockRail>, ReferralEngine) {
        let store = Arc::new(Store::new());
        let rail = Arc::new(rail);
        let ledger = Arc::new(Ledger::new(
            store.clone(),
            rail.clone(),
            amt("0.01"),
            amt("0.2"),
        ));
        let engine = ReferralEngine::new(
            store.clone(),
            ledger,
            rail.clone(),
            Arc::new(RecordingNotifier::new()),
            amt("0.05"),
        );
        store.user_or_create(1).await;
        store.user_or_create(2).await;
        (store, rail, engine)
    }

    async fn referrer_state(store: &Store, id: UserId) -> (u32, Amount) {
        let user = store.user(id).await.unwrap();
        let u = user.lock().await;
        (u.referral_count, u.balance)
    }

    #[tokio::test]
    async fn attribution_is_single_shot() {
        let (store, _, engine) = engine(MockRail::new(Amount::ZERO)).await;
        store.user_or_create(3).await;

        engine.attribute(1, Some("2")).await;
        engine.attribute(1, Some("3")).await;

        let user = store.user(1).await.unwrap();
        assert_eq!(user.lock().await.referred_by, Some(2));
        let (count, _) = referrer_state(&store, 2).await;
        assert_eq!(count, 1);
        let (count, balance) = referrer_state(&store, 3).await;
        assert_eq!((count, balance), (0, Amount::ZERO));
    }

    #[tokio::test]
    async fn self_and_unknown_codes_are_ignored() {
        let (store, _, engine) = engine(MockRail::new(Amount::ZERO)).await;
        engine.attribute(1, None).await;
        engine.attribute(1, Some("1")).await;
        engine.attribute(1, Some("999")).await;
        engine.attribute(1, Some("not-a-code")).await;

        let user = store.user(1).await.unwrap();
        assert_eq!(user.lock().await.referred_by, None);
    }

    #[tokio::test]
    async fn missing_wallet_falls_back_to_ledger_credit() {
        let (store, rail, engine) = engine(MockRail::new(amt("100"))).await;
        engine.attribute(1, Some("2")).await;

        let (count, balance) = referrer_state(&store, 2).await;
        assert_eq!(count, 1);
        assert_eq!(balance, amt("0.05"));
        assert!(rail.transfers.lock().await.is_empty());
    }

    #[tokio::test]
    async fn rail_failure_falls_back_without_double_count() {
        let (store, _, engine) = engine(MockRail::failing(amt("100"))).await;
        {
            let user = store.user(2).await.unwrap();
            user.lock().await.wallet_address = Some("wallet".into());
        }
        engine.attribute(1, Some("2")).await;

        let (count, balance) = referrer_state(&store, 2).await;
        assert_eq!(count, 1);
        assert_eq!(balance, amt("0.05"));
    }

    #[tokio::test]
    async fn rail_payout_skips_ledger_credit() {
        let (store, rail, engine) = engine(MockRail::new(amt("100"))).await;
        {
            let user = store.user(2).await.unwrap();
            user.lock().await.wallet_address = Some("wallet".into());
        }
        engine.attribute(1, Some("2")).await;

        let (count, balance) = referrer_state(&store, 2).await;
        assert_eq!(count, 1);
        assert_eq!(balance, Amount::ZERO);
        assert_eq!(
            rail.transfers.lock().await.as_slice(),
            &[("wallet".to_string(), amt("0.05"))]
        );
    }

    #[tokio::test]
    async fn low_rail_balance_falls_back_to_ledger() {
        let (store, rail, engine) = engine(MockRail::new(amt("0.01"))).await;
        {
            let user = store.user(2).await.unwrap();
            user.lock().await.wallet_address = Some("wallet".into());
        }
        engine.attribute(1, Some("2")).await;

        let (count, balance) = referrer_state(&store, 2).await;
        assert_eq!((count, balance), (1, amt("0.05")));
        assert!(rail.transfers.lock().await.is_empty());
    }
}
