//! # Session Lifecycle
//!
//! One active session per phone, absolute ten-minute expiry, explicit end
//! reasons. Activity refreshes `last_activity` but never the expiry;
//! predictable expiry is a deliberate UX decision.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{EndReason, Session};
use crate::traits::Store;

pub struct SessionManager {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, ttl: std::time::Duration) -> Self {
        SessionManager {
            store,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(600)),
        }
    }

    /// The unique live session for `phone`, if any. An expired-but-active
    /// row is lazily transitioned to `end_reason = timeout` on the way out,
    /// so callers never observe a stale session.
    pub async fn current(&self, phone: &str) -> Result<Option<Session>> {
        let Some(session) = self.store.get_active_session(phone).await? else {
            return Ok(None);
        };
        let now = Utc::now();
        if session.is_live(now) {
            return Ok(Some(session));
        }
        self.store.end_session(session.id, EndReason::Timeout).await?;
        Ok(None)
    }

    /// Opens a fresh timed session. The store ends any prior active session
    /// for the phone (reason `manual`) in the same transaction, so exactly
    /// one row stays active.
    pub async fn open(&self, user_id: Uuid, phone: &str) -> Result<Session> {
        self.store.open_session(user_id, phone, self.ttl).await
    }

    /// Marks activity. MUST NOT extend `expires_at`.
    pub async fn touch(&self, session_id: Uuid) -> Result<()> {
        self.store.touch_session(session_id).await
    }

    /// Idempotent: ending an already-ended session leaves it unchanged.
    pub async fn end(&self, session_id: Uuid, reason: EndReason) -> Result<()> {
        self.store.end_session(session_id, reason).await
    }
}
