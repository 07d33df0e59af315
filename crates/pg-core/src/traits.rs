//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AgentReply, AgentRequest, Draft, EndReason, ImageSafetyFlag, Listing, PinAttempt, PinRecord,
    Profile, SafetyReport, Session,
};

/// Persistence contract for users, PIN records, sessions, safety flags, and
/// drafts.
///
/// Each call is idempotent where the name implies it (`upsert_*`, `end_*`,
/// `delete_*`); multi-row effects are transactional, so opening a session
/// atomically invalidates any prior active session for the same phone.
/// Implementations signal `StoreUnavailable` for transient faults and
/// `IntegrityViolation` for constraint breaks.
#[async_trait]
pub trait Store: Send + Sync {
    // Profiles (read-only here; rows are created out-of-band)
    async fn get_profile_by_phone(&self, phone: &str) -> Result<Option<Profile>>;

    // PIN records
    async fn get_pin(&self, phone: &str) -> Result<Option<PinRecord>>;
    /// Replaces any PIN row for `phone`, removing orphan rows that tie the
    /// phone to a different profile.
    async fn upsert_pin(&self, user_id: Uuid, phone: &str, pin_hash: &str) -> Result<()>;
    async fn set_pin_attempts(
        &self,
        phone: &str,
        attempts: i64,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()>;
    /// Successful verify: zero the counter, clear the lock, stamp last_login.
    async fn record_pin_login(&self, phone: &str, at: DateTime<Utc>) -> Result<()>;
    async fn insert_pin_attempt(&self, attempt: &PinAttempt) -> Result<()>;

    // Sessions
    /// In one transaction: end any active session for `phone` with reason
    /// `manual`, then insert a fresh timed session expiring after `ttl`.
    async fn open_session(&self, user_id: Uuid, phone: &str, ttl: Duration) -> Result<Session>;
    /// Returns the `is_active = true` row for `phone` regardless of expiry;
    /// the session manager decides liveness and lazy timeout.
    async fn get_active_session(&self, phone: &str) -> Result<Option<Session>>;
    /// Updates `last_activity` only; `expires_at` is absolute from creation.
    async fn touch_session(&self, id: Uuid) -> Result<()>;
    async fn end_session(&self, id: Uuid, reason: EndReason) -> Result<()>;
    /// Transitions every expired active session to `end_reason = timeout`.
    /// Returns the number of sessions swept.
    async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;

    // Drafts
    async fn get_draft(&self, user_id: Uuid) -> Result<Option<Draft>>;
    async fn upsert_draft(&self, draft: &Draft) -> Result<()>;
    async fn delete_draft(&self, user_id: Uuid) -> Result<()>;

    // Safety flags (append-only; the gateway never reads them back)
    async fn insert_safety_flag(&self, flag: &ImageSafetyFlag) -> Result<()>;
}

/// Writer for published listings. Kept separate from `Store` because the
/// listings table belongs to the wider marketplace, not to this core.
#[async_trait]
pub trait ListingsRepo: Send + Sync {
    /// Inserts the listing and returns its id. May fail with
    /// `IntegrityViolation`, `Validation`, or `StoreUnavailable`; the draft
    /// FSM maps each kind to a user-facing message.
    async fn insert_listing(&self, listing: &Listing) -> Result<Uuid>;
}

/// External image-safety classifier, consumed as an opaque verdict source.
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    async fn classify(&self, image_ref: &str) -> Result<SafetyReport>;
}

/// Downstream conversational agent backend for non-listing intents.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn dispatch(&self, request: &AgentRequest) -> Result<AgentReply>;
}
