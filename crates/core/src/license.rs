//! License domain rules: key format, status lifecycle, expiry math, and
//! the offline-grace window.
//!
//! Keys look like `BL-7KQ2-M9X4-AB1C-D0EF`: a fixed prefix plus four
//! segments of four characters drawn from `[A-Z0-9]`. The status
//! lifecycle is strictly monotonic: `Unused -> Active -> Expired`.

use chrono::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Prefix on every generated license key.
pub const KEY_PREFIX: &str = "BL";

/// Characters a key segment may contain.
const KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of segments after the prefix.
const KEY_SEGMENTS: usize = 4;

/// Characters per segment.
const KEY_SEGMENT_LEN: usize = 4;

/// Days a previously-verified license stays valid while the ledger is
/// unreachable. Beyond this the caller must fail closed.
pub const OFFLINE_GRACE_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// Key generation / validation
// ---------------------------------------------------------------------------

/// Generate a fresh license key.
///
/// Uniqueness is NOT guaranteed here -- the key space makes collisions
/// negligible, but callers must still retry on a ledger collision rather
/// than trust the odds.
pub fn generate_key() -> String {
    let mut rng = rand::rng();
    let mut key = String::with_capacity(KEY_PREFIX.len() + KEY_SEGMENTS * (KEY_SEGMENT_LEN + 1));
    key.push_str(KEY_PREFIX);

    for _ in 0..KEY_SEGMENTS {
        key.push('-');
        for _ in 0..KEY_SEGMENT_LEN {
            let idx = rng.random_range(0..KEY_CHARSET.len());
            key.push(KEY_CHARSET[idx] as char);
        }
    }
    key
}

/// Check that a string has the canonical key shape (`BL-XXXX-XXXX-XXXX-XXXX`).
pub fn is_valid_key(key: &str) -> bool {
    let mut parts = key.split('-');
    if parts.next() != Some(KEY_PREFIX) {
        return false;
    }
    let segments: Vec<&str> = parts.collect();
    segments.len() == KEY_SEGMENTS
        && segments.iter().all(|s| {
            s.len() == KEY_SEGMENT_LEN && s.bytes().all(|b| KEY_CHARSET.contains(&b))
        })
}

// ---------------------------------------------------------------------------
// Status lifecycle
// ---------------------------------------------------------------------------

/// License lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Issued but never activated.
    Unused,
    /// Activated and inside its validity window.
    Active,
    /// Past `expires_at`. Terminal.
    Expired,
}

impl LicenseStatus {
    /// Storage representation (lowercase, as persisted in the ledger).
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Unused => "unused",
            LicenseStatus::Active => "active",
            LicenseStatus::Expired => "expired",
        }
    }

    /// Parse the storage representation. Unknown strings are an error.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "unused" => Ok(LicenseStatus::Unused),
            "active" => Ok(LicenseStatus::Active),
            "expired" => Ok(LicenseStatus::Expired),
            other => Err(format!("unknown license status: {other}")),
        }
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// The lifecycle is monotonic: `Unused -> Active -> Expired`, no
    /// reverse edges, no skipping back.
    pub fn can_transition_to(&self, next: LicenseStatus) -> bool {
        matches!(
            (self, next),
            (LicenseStatus::Unused, LicenseStatus::Active)
                | (LicenseStatus::Active, LicenseStatus::Expired)
        )
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Expiry math
// ---------------------------------------------------------------------------

/// Compute the expiry timestamp fixed at activation.
pub fn expiry_from(activated_at: Timestamp, duration_days: i32) -> Timestamp {
    activated_at + Duration::days(i64::from(duration_days))
}

/// Whether a license with the given `expires_at` is expired at `now`.
///
/// Applied lazily (on verify / sweep); the stored status may trail this.
pub fn is_expired(expires_at: Timestamp, now: Timestamp) -> bool {
    now > expires_at
}

/// Whether an offline caller is still inside the grace window given the
/// time of its last successful verification.
pub fn within_grace_window(last_verified: Timestamp, now: Timestamp) -> bool {
    now - last_verified < Duration::days(OFFLINE_GRACE_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn generated_key_has_canonical_shape() {
        for _ in 0..50 {
            let key = generate_key();
            assert!(is_valid_key(&key), "bad key shape: {key}");
        }
    }

    #[test]
    fn generated_keys_differ() {
        let a = generate_key();
        let b = generate_key();
        assert_ne!(a, b);
    }

    #[test]
    fn validation_rejects_malformed_keys() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("BL-AAAA-BBBB-CCCC"));
        assert!(!is_valid_key("XX-AAAA-BBBB-CCCC-DDDD"));
        assert!(!is_valid_key("BL-aaaa-BBBB-CCCC-DDDD"));
        assert!(!is_valid_key("BL-AAAA-BBBB-CCCC-DDDDD"));
        assert!(!is_valid_key("BL-AAAA-BBBB-CCCC-DD!D"));
    }

    #[test]
    fn validation_accepts_canonical_key() {
        assert!(is_valid_key("BL-7KQ2-M9X4-AB1C-D0EF"));
    }

    #[test]
    fn status_roundtrips_through_storage_form() {
        for status in [
            LicenseStatus::Unused,
            LicenseStatus::Active,
            LicenseStatus::Expired,
        ] {
            assert_eq!(LicenseStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(LicenseStatus::parse("revoked").is_err());
    }

    #[test]
    fn transitions_are_monotonic() {
        use LicenseStatus::*;
        assert!(Unused.can_transition_to(Active));
        assert!(Active.can_transition_to(Expired));

        assert!(!Unused.can_transition_to(Expired));
        assert!(!Active.can_transition_to(Unused));
        assert!(!Expired.can_transition_to(Active));
        assert!(!Expired.can_transition_to(Unused));
    }

    #[test]
    fn expiry_is_activation_plus_duration() {
        let activated = Utc::now();
        let expires = expiry_from(activated, 730);
        assert_eq!(expires - activated, Duration::days(730));
    }

    #[test]
    fn expired_only_after_expiry_instant() {
        let now = Utc::now();
        assert!(!is_expired(now, now));
        assert!(!is_expired(now + Duration::seconds(1), now));
        assert!(is_expired(now - Duration::seconds(1), now));
    }

    #[test]
    fn grace_window_is_seven_days() {
        let now = Utc::now();
        assert!(within_grace_window(now - Duration::days(6), now));
        assert!(!within_grace_window(now - Duration::days(7), now));
        assert!(!within_grace_window(now - Duration::days(30), now));
    }
}
