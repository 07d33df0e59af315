//! # PIN Authentication
//!
//! Hashes, verifies, and rate-limits PIN attempts. PINs are 4-6 digits,
//! stored as hex-encoded SHA-256. Three consecutive failures lock the phone
//! for fifteen minutes (both knobs configurable).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::models::PinAttempt;
use crate::traits::Store;

/// Outcome of a PIN verification. Wrong PINs and lockouts are legitimate
/// domain outcomes, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    Success { user_id: Uuid },
    Invalid { remaining_attempts: u32 },
    Locked { blocked_until: DateTime<Utc> },
    NotRegistered,
}

pub struct PinAuth {
    store: Arc<dyn Store>,
    max_failed: u32,
    lock_for: Duration,
}

impl PinAuth {
    pub fn new(store: Arc<dyn Store>, max_failed: u32, lock_for: std::time::Duration) -> Self {
        PinAuth {
            store,
            max_failed,
            lock_for: Duration::from_std(lock_for).unwrap_or_else(|_| Duration::seconds(900)),
        }
    }

    /// Register (or replace) the PIN for a profile. Only the profile owner
    /// may do this; any orphan row binding the phone to another profile is
    /// removed by the store.
    pub async fn register(&self, caller: Uuid, user_id: Uuid, phone: &str, pin_raw: &str) -> Result<()> {
        if caller != user_id {
            return Err(GatewayError::Unauthorized(
                "PIN can only be set by the profile owner".into(),
            ));
        }
        if !is_pin_shaped(pin_raw) {
            return Err(GatewayError::Validation(
                "PIN must be 4-6 digits".into(),
            ));
        }
        self.store
            .upsert_pin(user_id, phone, &hash_pin(pin_raw))
            .await
    }

    /// The verification algorithm:
    ///
    /// 1. no record → `NotRegistered` (failure attempt logged)
    /// 2. standing lock → `Locked` without consuming an attempt
    /// 3. expired lock → cleared, counter reset
    /// 4. constant-time hash compare
    /// 5. match → counter reset, last_login stamped, success logged
    /// 6. mismatch → counter bumped; at the limit the phone locks
    pub async fn verify(&self, phone: &str, pin_raw: &str, source: &str) -> Result<VerifyOutcome> {
        let now = Utc::now();

        let Some(mut record) = self.store.get_pin(phone).await? else {
            self.log_attempt(phone, now, false, source).await?;
            return Ok(VerifyOutcome::NotRegistered);
        };

        if record.is_locked {
            match record.blocked_until {
                Some(until) if until > now => {
                    return Ok(VerifyOutcome::Locked { blocked_until: until });
                }
                _ => {
                    // Lock has run out; start from a clean slate.
                    self.store.set_pin_attempts(phone, 0, None).await?;
                    record.failed_attempts = 0;
                    record.is_locked = false;
                    record.blocked_until = None;
                }
            }
        }

        if constant_time_eq(&hash_pin(pin_raw), &record.pin_hash) {
            self.store.record_pin_login(phone, now).await?;
            self.log_attempt(phone, now, true, source).await?;
            return Ok(VerifyOutcome::Success { user_id: record.user_id });
        }

        let attempts = record.failed_attempts + 1;
        let outcome = if attempts >= i64::from(self.max_failed) {
            let blocked_until = now + self.lock_for;
            self.store
                .set_pin_attempts(phone, attempts, Some(blocked_until))
                .await?;
            VerifyOutcome::Locked { blocked_until }
        } else {
            self.store.set_pin_attempts(phone, attempts, None).await?;
            VerifyOutcome::Invalid {
                remaining_attempts: self.max_failed - attempts as u32,
            }
        };
        self.log_attempt(phone, now, false, source).await?;
        Ok(outcome)
    }

    async fn log_attempt(
        &self,
        phone: &str,
        at: DateTime<Utc>,
        success: bool,
        source: &str,
    ) -> Result<()> {
        self.store
            .insert_pin_attempt(&PinAttempt {
                phone: phone.to_string(),
                attempted_at: at,
                success,
                source: source.to_string(),
            })
            .await
    }
}

/// `^\d{4,6}$` — the shape the controller also uses to spot PIN entry.
pub fn is_pin_shaped(text: &str) -> bool {
    let text = text.trim();
    (4..=6).contains(&text.len()) && text.bytes().all(|b| b.is_ascii_digit())
}

pub fn hash_pin(pin_raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pin_raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Byte-wise XOR fold so the comparison time does not leak the first
/// differing position. Both operands are fixed-length hex digests.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_shape_accepts_four_to_six_digits() {
        assert!(is_pin_shaped("1234"));
        assert!(is_pin_shaped("123456"));
        assert!(!is_pin_shaped("123"));
        assert!(!is_pin_shaped("1234567"));
        assert!(!is_pin_shaped("12a4"));
        assert!(!is_pin_shaped("merhaba"));
    }

    #[test]
    fn hash_is_hex_sha256() {
        // SHA-256("1234")
        assert_eq!(
            hash_pin("1234"),
            "03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4"
        );
    }

    #[test]
    fn constant_time_eq_compares_full_length() {
        let a = hash_pin("1234");
        let b = hash_pin("0000");
        assert!(constant_time_eq(&a, &a.clone()));
        assert!(!constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, "short"));
    }
}
