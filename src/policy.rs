use crate::models::user::User;
use crate::oracle::Membership;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Banned,
    NeedsBoth,
    NeedsVerification,
    NeedsMembership,
    Full,
}

impl Tier {
    /// Missing requirements in reporting order: verification first, then
    /// membership.
    pub fn missing(&self) -> &'static [&'static str] {
        match self {
            Tier::NeedsBoth => &["verification", "membership"],
            Tier::NeedsVerification => &["verification"],
            Tier::NeedsMembership => &["membership"],
            Tier::Banned | Tier::Full => &[],
        }
    }
}

/// Computed on demand from the user record and the membership fact, never
/// cached as stored state. `Membership::Unknown` fails closed.
pub fn classify(user: &User, membership: Membership) -> Tier {
    if user.banned {
        return Tier::Banned;
    }
    let is_member = membership == Membership::Member;
    let is_verified = user.device_fingerprint.is_some();
    match (is_verified, is_member) {
        (true, true) => Tier::Full,
        (false, true) => Tier::NeedsVerification,
        (true, false) => Tier::NeedsMembership,
        (false, false) => Tier::NeedsBoth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;

    fn user(verified: bool, banned: bool) -> User {
        let mut u = User::new(1);
        u.banned = banned;
        if verified {
            u.device_fingerprint = Some("fp".into());
        }
        u
    }

    #[test]
    fn banned_overrides_everything() {
        assert_eq!(
            classify(&user(true, true), Membership::Member),
            Tier::Banned
        );
    }

    #[test]
    fn full_requires_both_proofs() {
        assert_eq!(classify(&user(true, false), Membership::Member), Tier::Full);
        assert_eq!(
            classify(&user(false, false), Membership::Member),
            Tier::NeedsVerification
        );
        assert_eq!(
            classify(&user(true, false), Membership::NotMember),
            Tier::NeedsMembership
        );
        assert_eq!(
            classify(&user(false, false), Membership::NotMember),
            Tier::NeedsBoth
        );
    }

    #[test]
    fn unknown_membership_fails_closed() {
        assert_eq!(
            classify(&user(true, false), Membership::Unknown),
            Tier::NeedsMembership
        );
    }

    #[test]
    fn missing_reports_verification_before_membership() {
        assert_eq!(Tier::NeedsBoth.missing(), ["verification", "membership"]);
        assert!(Tier::Full.missing().is_empty());
    }
}
