use crate::error::AppError;
use crate::models::task::Task;
use crate::models::user::{User, UserId};
use crate::money::Amount;
use crate::rail::PaymentRail;
use crate::store::Store;
use std::sync::Arc;
use tracing::{info, warn};

/// Balance mutations. Every operation locks exactly one user record for the
/// duration of its local read-modify-write; rail round-trips happen with the
/// lock released, bracketed by a reservation.
pub struct Ledger {
    store: Arc<Store>,
    rail: Arc<dyn PaymentRail>,
    bonus: Amount,
    min_withdrawal: Amount,
}

impl Ledger {
    pub fn new(
        store: Arc<Store>,
        rail: Arc<dyn PaymentRail>,
        bonus: Amount,
        min_withdrawal: Amount,
    ) -> Self {
        Self {
            store,
            rail,
            bonus,
            min_withdrawal,
        }
    }

    fn credit_locked(user: &mut User, amount: Amount, cause: &str) -> Result<Amount, AppError> {
        if !amount.is_positive() {
            return Err(AppError::Internal("credit amount must be positive".into()));
        }
        let new_balance = user
            .balance
            .checked_add(amount)
            .ok_or_else(|| AppError::Internal(format!("balance overflow for {}", user.id)))?;
        user.balance = new_balance;
        info!(
            user_id = user.id,
            amount = %amount,
            balance = %new_balance,
            cause,
            "balance credited"
        );
        Ok(new_balance)
    }

    pub async fn credit(
        &self,
        user_id: UserId,
        amount: Amount,
        cause: &str,
    ) -> Result<Amount, AppError> {
        let user = self.store.user(user_id).await.ok_or(AppError::NotFound)?;
        let mut u = user.lock().await;
        Self::credit_locked(&mut u, amount, cause)
    }

    pub async fn debit(&self, user_id: UserId, amount: Amount) -> Result<Amount, AppError> {
        let user = self.store.user(user_id).await.ok_or(AppError::NotFound)?;
        let mut u = user.lock().await;
        if u.available() < amount {
            return Err(AppError::InsufficientBalance);
        }
        let new_balance = u
            .balance
            .checked_sub(amount)
            .ok_or(AppError::InsufficientBalance)?;
        u.balance = new_balance;
        info!(user_id, amount = %amount, balance = %new_balance, "balance debited");
        Ok(new_balance)
    }

    /// One-time signup bonus. The flag flip and the credit happen under the
    /// same user lock, so a duplicate trigger observes the flag and reports
    /// `AlreadyClaimed` without a second credit.
    pub async fn claim_bonus(&self, user_id: UserId) -> Result<Amount, AppError> {
        let user = self.store.user(user_id).await.ok_or(AppError::NotFound)?;
        let mut u = user.lock().await;
        if u.bonus_claimed {
            return Err(AppError::AlreadyClaimed);
        }
        u.bonus_claimed = true;
        Self::credit_locked(&mut u, self.bonus, "signup bonus")
    }

    /// Credits a task reward. Only the submission workflow calls this, as
    /// the side effect of the single Pending -> Approved transition.
    pub(crate) async fn grant_task_reward(
        &self,
        user_id: UserId,
        task: &Task,
    ) -> Result<Amount, AppError> {
        let user = self.store.user(user_id).await.ok_or(AppError::NotFound)?;
        let mut u = user.lock().await;
        Self::credit_locked(&mut u, task.reward, "task reward")
    }

    /// Full-balance withdrawal: reserve locally, transfer on the rail, then
    /// commit the debit. A rail failure releases the reservation and leaves
    /// the balance exactly as it was.
    pub async fn withdraw(&self, user_id: UserId) -> Result<(Amount, String), AppError> {
        let user = self.store.user(user_id).await.ok_or(AppError::NotFound)?;

        let (wallet, amount) = {
            let mut u = user.lock().await;
            let wallet = u.wallet_address.clone().ok_or(AppError::WalletMissing)?;
            let amount = u.available();
            if amount < self.min_withdrawal {
                return Err(AppError::InsufficientBalance);
            }
            u.reserved = u
                .reserved
                .checked_add(amount)
                .ok_or_else(|| AppError::Internal("reservation overflow".into()))?;
            (wallet, amount)
        };

        // Rail round-trips happen with the user lock released.
        let outcome = self.transfer_reserved(&wallet, amount).await;

        let mut u = user.lock().await;
        u.reserved = u.reserved.saturating_sub(amount);
        match outcome {
            Ok(tx) => {
                u.balance = u
                    .balance
                    .checked_sub(amount)
                    .ok_or_else(|| AppError::Internal("withdrawal underflow".into()))?;
                info!(user_id, amount = %amount, tx = %tx, "withdrawal committed");
                Ok((amount, tx))
            }
            Err(e) => {
                warn!(user_id, amount = %amount, error = %e, "withdrawal failed, reservation released");
                Err(e)
            }
        }
    }

    async fn transfer_reserved(&self, wallet: &str, amount: Amount) -> Result<String, AppError> {
        let operating = self.rail.operating_balance().await?;
        if operating < amount {
            return Err(AppError::Rail("insufficient rail operating balance".into()));
        }
        self.rail.transfer(wallet, amount).await
    }
}
