use crate::models::user::UserId;
use async_trait::async_trait;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Member,
    NotMember,
    /// Oracle could not answer; callers must treat this as `NotMember`.
    Unknown,
}

#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn check(&self, channel: &str, user_id: UserId) -> Membership;
}

/// Env-seeded member list, for running without the chat platform attached.
pub struct AllowlistOracle {
    members: HashSet<UserId>,
}

impl AllowlistOracle {
    pub fn new(members: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    pub fn from_env(var: &str) -> Self {
        let members = std::env::var(var)
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        Self { members }
    }
}

#[async_trait]
impl MembershipOracle for AllowlistOracle {
    async fn check(&self, _channel: &str, user_id: UserId) -> Membership {
        if self.members.contains(&user_id) {
            Membership::Member
        } else {
            Membership::NotMember
        }
    }
}
