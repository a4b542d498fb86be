use crate::money::Amount;
use serde::Serialize;

pub type UserId = i64;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub balance: Amount,
    /// Portion of `balance` held back by an in-flight withdrawal.
    #[serde(skip)]
    pub reserved: Amount,
    pub wallet_address: Option<String>,
    pub referral_count: u32,
    pub device_fingerprint: Option<String>,
    pub banned: bool,
    pub bonus_claimed: bool,
    pub referred_by: Option<UserId>,
    #[serde(skip)]
    pub pending_token: Option<String>,
    /// Referral code captured at first contact, consumed on first
    /// successful attribution attempt.
    #[serde(skip)]
    pub pending_referral: Option<String>,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            balance: Amount::ZERO,
            reserved: Amount::ZERO,
            wallet_address: None,
            referral_count: 0,
            device_fingerprint: None,
            banned: false,
            bonus_claimed: false,
            referred_by: None,
            pending_token: None,
            pending_referral: None,
        }
    }

    /// Balance not held back by a withdrawal reservation.
    pub fn available(&self) -> Amount {
        self.balance.saturating_sub(self.reserved)
    }
}
