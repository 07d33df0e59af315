//! # pg-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational
//! model and the `pg-core` domain models. Uniqueness contracts live here
//! as real constraints: one active session per phone (partial unique
//! index), one draft per user, one PIN row per user and per phone.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pg_core::error::{GatewayError, Result};
use pg_core::models::{
    Draft, DraftState, EndReason, ImageSafetyFlag, Listing, PinAttempt, PinRecord, Profile, Role,
    Session, SessionType,
};
use pg_core::traits::{ListingsRepo, Store};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

pub struct SqliteStore {
    pool: SqlitePool,
}

// Helpers for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

/// Unique-constraint breaks are fatal for the turn; everything else from
/// the driver is treated as transient.
fn store_err(e: sqlx::Error) -> GatewayError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return GatewayError::IntegrityViolation(db.message().to_string());
        }
    }
    GatewayError::StoreUnavailable(e.to_string())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id            BLOB PRIMARY KEY,
    phone         TEXT UNIQUE,
    display_name  TEXT,
    role          TEXT NOT NULL DEFAULT 'user'
);

CREATE TABLE IF NOT EXISTS user_security (
    user_id          BLOB NOT NULL UNIQUE,
    phone            TEXT NOT NULL UNIQUE,
    pin_hash         TEXT NOT NULL,
    failed_attempts  INTEGER NOT NULL DEFAULT 0,
    is_locked        INTEGER NOT NULL DEFAULT 0,
    blocked_until    TEXT,
    last_login       TEXT
);

CREATE TABLE IF NOT EXISTS pin_verification_attempts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    phone         TEXT NOT NULL,
    attempted_at  TEXT NOT NULL,
    success       INTEGER NOT NULL,
    source        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_sessions (
    id             BLOB PRIMARY KEY,
    user_id        BLOB NOT NULL,
    phone          TEXT NOT NULL,
    token          BLOB NOT NULL UNIQUE,
    is_active      INTEGER NOT NULL,
    created_at     TEXT NOT NULL,
    expires_at     TEXT NOT NULL,
    ended_at       TEXT,
    end_reason     TEXT,
    last_activity  TEXT NOT NULL,
    session_type   TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_user_sessions_active_phone
    ON user_sessions(phone) WHERE is_active = 1;

CREATE TABLE IF NOT EXISTS image_safety_flags (
    id           BLOB PRIMARY KEY,
    user_id      BLOB,
    image_ref    TEXT,
    flag_type    TEXT NOT NULL,
    confidence   TEXT NOT NULL,
    message      TEXT NOT NULL,
    status       TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    reviewed_at  TEXT,
    reviewer     TEXT,
    notes        TEXT
);

CREATE TABLE IF NOT EXISTS active_drafts (
    user_id         BLOB PRIMARY KEY,
    state           TEXT NOT NULL,
    listing_data    TEXT NOT NULL,
    images          TEXT NOT NULL,
    vision_product  TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS listings (
    id           BLOB PRIMARY KEY,
    user_id      BLOB NOT NULL,
    title        TEXT NOT NULL,
    price        INTEGER,
    condition    TEXT,
    category     TEXT,
    description  TEXT,
    location     TEXT,
    stock        INTEGER,
    status       TEXT NOT NULL,
    metadata     TEXT NOT NULL,
    images       TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
"#;

impl SqliteStore {
    pub async fn new(url: &str) -> Result<Self> {
        // A :memory: database exists per connection; pooling it across
        // several would hand each worker an empty schema.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(store_err)?;
        for statement in SCHEMA.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&pool).await.map_err(store_err)?;
        }
        Ok(SqliteStore { pool })
    }
}

fn session_from_row(row: &SqliteRow) -> Session {
    Session {
        id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
        user_id: blob_to_uuid(row.get::<Vec<u8>, _>("user_id").as_slice()),
        phone: row.get("phone"),
        token: blob_to_uuid(row.get::<Vec<u8>, _>("token").as_slice()),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        ended_at: row.get("ended_at"),
        end_reason: row
            .get::<Option<String>, _>("end_reason")
            .as_deref()
            .and_then(EndReason::parse),
        last_activity: row.get("last_activity"),
        session_type: SessionType::parse(row.get::<String, _>("session_type").as_str()),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_profile_by_phone(&self, phone: &str) -> Result<Option<Profile>> {
        let row = sqlx::query("SELECT id, phone, display_name, role FROM profiles WHERE phone = ?")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(row.map(|row| Profile {
            id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
            phone: row.get("phone"),
            display_name: row.get("display_name"),
            role: Role::parse(row.get::<String, _>("role").as_str()),
        }))
    }

    async fn get_pin(&self, phone: &str) -> Result<Option<PinRecord>> {
        let row = sqlx::query(
            "SELECT user_id, phone, pin_hash, failed_attempts, is_locked, blocked_until, last_login
             FROM user_security WHERE phone = ?",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|row| PinRecord {
            user_id: blob_to_uuid(row.get::<Vec<u8>, _>("user_id").as_slice()),
            phone: row.get("phone"),
            pin_hash: row.get("pin_hash"),
            failed_attempts: row.get("failed_attempts"),
            is_locked: row.get("is_locked"),
            blocked_until: row.get("blocked_until"),
            last_login: row.get("last_login"),
        }))
    }

    /// Replacing a PIN removes any row that ties the phone or the profile
    /// to a previous pairing, inside one transaction.
    async fn upsert_pin(&self, user_id: Uuid, phone: &str, pin_hash: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query("DELETE FROM user_security WHERE phone = ? OR user_id = ?")
            .bind(phone)
            .bind(uuid_to_blob(user_id))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        sqlx::query(
            "INSERT INTO user_security (user_id, phone, pin_hash, failed_attempts, is_locked)
             VALUES (?, ?, ?, 0, 0)",
        )
        .bind(uuid_to_blob(user_id))
        .bind(phone)
        .bind(pin_hash)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)
    }

    async fn set_pin_attempts(
        &self,
        phone: &str,
        attempts: i64,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE user_security SET failed_attempts = ?, is_locked = ?, blocked_until = ?
             WHERE phone = ?",
        )
        .bind(attempts)
        .bind(locked_until.is_some())
        .bind(locked_until)
        .bind(phone)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn record_pin_login(&self, phone: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE user_security
             SET failed_attempts = 0, is_locked = 0, blocked_until = NULL, last_login = ?
             WHERE phone = ?",
        )
        .bind(at)
        .bind(phone)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn insert_pin_attempt(&self, attempt: &PinAttempt) -> Result<()> {
        sqlx::query(
            "INSERT INTO pin_verification_attempts (phone, attempted_at, success, source)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&attempt.phone)
        .bind(attempt.attempted_at)
        .bind(attempt.success)
        .bind(&attempt.source)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Atomic open: end whatever is active for the phone, then insert the
    /// new row. The partial unique index backs this up if two opens race.
    async fn open_session(&self, user_id: Uuid, phone: &str, ttl: Duration) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::now_v7(),
            user_id,
            phone: phone.to_string(),
            token: Uuid::new_v4(),
            is_active: true,
            created_at: now,
            expires_at: now + ttl,
            ended_at: None,
            end_reason: None,
            last_activity: now,
            session_type: SessionType::Timed,
        };

        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query(
            "UPDATE user_sessions SET is_active = 0, ended_at = ?, end_reason = 'manual'
             WHERE phone = ? AND is_active = 1",
        )
        .bind(now)
        .bind(phone)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "INSERT INTO user_sessions
             (id, user_id, phone, token, is_active, created_at, expires_at, last_activity, session_type)
             VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(session.id))
        .bind(uuid_to_blob(session.user_id))
        .bind(phone)
        .bind(uuid_to_blob(session.token))
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.last_activity)
        .bind(session.session_type.as_str())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(session)
    }

    async fn get_active_session(&self, phone: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM user_sessions WHERE phone = ? AND is_active = 1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(|row| session_from_row(&row)))
    }

    async fn touch_session(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE user_sessions SET last_activity = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Idempotent: the `is_active = 1` guard keeps a second call from
    /// rewriting `ended_at` or the reason.
    async fn end_session(&self, id: Uuid, reason: EndReason) -> Result<()> {
        sqlx::query(
            "UPDATE user_sessions SET is_active = 0, ended_at = ?, end_reason = ?
             WHERE id = ? AND is_active = 1",
        )
        .bind(Utc::now())
        .bind(reason.as_str())
        .bind(uuid_to_blob(id))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = 0, ended_at = ?, end_reason = 'timeout'
             WHERE is_active = 1 AND expires_at <= ?",
        )
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected())
    }

    async fn get_draft(&self, user_id: Uuid) -> Result<Option<Draft>> {
        let row = sqlx::query("SELECT * FROM active_drafts WHERE user_id = ?")
            .bind(uuid_to_blob(user_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(row.map(|row| Draft {
            user_id: blob_to_uuid(row.get::<Vec<u8>, _>("user_id").as_slice()),
            state: DraftState::parse(row.get::<String, _>("state").as_str()),
            listing_data: serde_json::from_str(&row.get::<String, _>("listing_data"))
                .unwrap_or_default(),
            images: serde_json::from_str(&row.get::<String, _>("images")).unwrap_or_default(),
            vision_product: row
                .get::<Option<String>, _>("vision_product")
                .and_then(|raw| serde_json::from_str(&raw).ok()),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn upsert_draft(&self, draft: &Draft) -> Result<()> {
        let listing_data = serde_json::to_string(&draft.listing_data)
            .map_err(|e| GatewayError::Validation(e.to_string()))?;
        let images = serde_json::to_string(&draft.images)
            .map_err(|e| GatewayError::Validation(e.to_string()))?;
        let vision = match &draft.vision_product {
            Some(v) => {
                Some(serde_json::to_string(v).map_err(|e| GatewayError::Validation(e.to_string()))?)
            }
            None => None,
        };

        sqlx::query(
            "INSERT INTO active_drafts
             (user_id, state, listing_data, images, vision_product, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 state = excluded.state,
                 listing_data = excluded.listing_data,
                 images = excluded.images,
                 vision_product = excluded.vision_product,
                 updated_at = excluded.updated_at",
        )
        .bind(uuid_to_blob(draft.user_id))
        .bind(draft.state.as_str())
        .bind(listing_data)
        .bind(images)
        .bind(vision)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn delete_draft(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM active_drafts WHERE user_id = ?")
            .bind(uuid_to_blob(user_id))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn insert_safety_flag(&self, flag: &ImageSafetyFlag) -> Result<()> {
        sqlx::query(
            "INSERT INTO image_safety_flags
             (id, user_id, image_ref, flag_type, confidence, message, status, created_at,
              reviewed_at, reviewer, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(flag.id))
        .bind(flag.user_id.map(uuid_to_blob))
        .bind(&flag.image_ref)
        .bind(flag.flag_type.as_str())
        .bind(flag.confidence.as_str())
        .bind(&flag.message)
        .bind(flag.status.as_str())
        .bind(flag.created_at)
        .bind(flag.reviewed_at)
        .bind(&flag.reviewer)
        .bind(&flag.notes)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait]
impl ListingsRepo for SqliteStore {
    async fn insert_listing(&self, listing: &Listing) -> Result<Uuid> {
        if listing.title.trim().is_empty() {
            return Err(GatewayError::Validation("listing title is empty".into()));
        }
        let metadata = serde_json::to_string(&listing.metadata)
            .map_err(|e| GatewayError::Validation(e.to_string()))?;
        let images = serde_json::to_string(&listing.images)
            .map_err(|e| GatewayError::Validation(e.to_string()))?;

        sqlx::query(
            "INSERT INTO listings
             (id, user_id, title, price, condition, category, description, location, stock,
              status, metadata, images, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(listing.id))
        .bind(uuid_to_blob(listing.user_id))
        .bind(&listing.title)
        .bind(listing.price)
        .bind(&listing.condition)
        .bind(&listing.category)
        .bind(&listing.description)
        .bind(&listing.location)
        .bind(listing.stock)
        .bind(&listing.status)
        .bind(metadata)
        .bind(images)
        .bind(listing.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(listing.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_core::auth::{hash_pin, PinAuth, VerifyOutcome};
    use pg_core::models::{Confidence, FlagStatus, FlagType};
    use pg_core::session::SessionManager;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    async fn memory_store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap())
    }

    fn ten_minutes() -> StdDuration {
        StdDuration::from_secs(600)
    }

    #[tokio::test]
    async fn open_session_invalidates_prior_active() {
        let store = memory_store().await;
        let user = Uuid::now_v7();

        let first = store
            .open_session(user, "+905551234567", Duration::seconds(600))
            .await
            .unwrap();
        let second = store
            .open_session(user, "+905551234567", Duration::seconds(600))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        // Exactly one active row, and the old one carries the manual reason.
        let active: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM user_sessions WHERE phone = ? AND is_active = 1")
                .bind("+905551234567")
                .fetch_one(&store.pool)
                .await
                .unwrap()
                .get("n");
        assert_eq!(active, 1);

        let old = sqlx::query("SELECT end_reason, ended_at FROM user_sessions WHERE id = ?")
            .bind(uuid_to_blob(first.id))
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(old.get::<Option<String>, _>("end_reason").as_deref(), Some("manual"));
        assert!(old.get::<Option<DateTime<Utc>>, _>("ended_at").is_some());
    }

    #[tokio::test]
    async fn current_returns_opened_session_and_lazily_times_out() {
        let store = memory_store().await;
        let manager = SessionManager::new(store.clone(), ten_minutes());
        let user = Uuid::now_v7();

        let opened = manager.open(user, "+905550000001").await.unwrap();
        let current = manager.current("+905550000001").await.unwrap().unwrap();
        assert_eq!(current.id, opened.id);

        // An already-expired session is swept on access.
        let expired_manager = SessionManager::new(store.clone(), StdDuration::from_secs(0));
        let expired = expired_manager.open(user, "+905550000002").await.unwrap();
        assert!(manager.current("+905550000002").await.unwrap().is_none());

        let row = sqlx::query("SELECT end_reason FROM user_sessions WHERE id = ?")
            .bind(uuid_to_blob(expired.id))
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<Option<String>, _>("end_reason").as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn touch_updates_activity_but_never_the_expiry() {
        let store = memory_store().await;
        store
            .open_session(Uuid::now_v7(), "+905550000006", Duration::seconds(600))
            .await
            .unwrap();
        let before = store.get_active_session("+905550000006").await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        store.touch_session(before.id).await.unwrap();

        let touched = store.get_active_session("+905550000006").await.unwrap().unwrap();
        assert_eq!(touched.expires_at, before.expires_at);
        assert!(touched.last_activity > before.last_activity);
    }

    #[tokio::test]
    async fn profile_lookup_by_phone() {
        let store = memory_store().await;
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO profiles (id, phone, display_name, role) VALUES (?, ?, ?, ?)")
            .bind(uuid_to_blob(id))
            .bind("+905551230000")
            .bind("Ayşe")
            .bind("moderator")
            .execute(&store.pool)
            .await
            .unwrap();

        let profile = store.get_profile_by_phone("+905551230000").await.unwrap().unwrap();
        assert_eq!(profile.id, id);
        assert_eq!(profile.display_name.as_deref(), Some("Ayşe"));
        assert_eq!(profile.role, Role::Moderator);
        assert!(store.get_profile_by_phone("+900000000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn end_session_is_idempotent() {
        let store = memory_store().await;
        let session = store
            .open_session(Uuid::now_v7(), "+905550000003", Duration::seconds(600))
            .await
            .unwrap();

        store
            .end_session(session.id, EndReason::UserCancelled)
            .await
            .unwrap();
        let first_ended: Option<DateTime<Utc>> =
            sqlx::query("SELECT ended_at FROM user_sessions WHERE id = ?")
                .bind(uuid_to_blob(session.id))
                .fetch_one(&store.pool)
                .await
                .unwrap()
                .get("ended_at");

        // Second call with a different reason must not rewrite anything.
        store.end_session(session.id, EndReason::Manual).await.unwrap();
        let row = sqlx::query("SELECT ended_at, end_reason FROM user_sessions WHERE id = ?")
            .bind(uuid_to_blob(session.id))
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<Option<DateTime<Utc>>, _>("ended_at"), first_ended);
        assert_eq!(
            row.get::<Option<String>, _>("end_reason").as_deref(),
            Some("user_cancelled")
        );
    }

    #[tokio::test]
    async fn sweep_times_out_only_expired_sessions() {
        let store = memory_store().await;
        store
            .open_session(Uuid::now_v7(), "+905550000004", Duration::seconds(0))
            .await
            .unwrap();
        store
            .open_session(Uuid::now_v7(), "+905550000005", Duration::seconds(600))
            .await
            .unwrap();

        let swept = store.sweep_expired_sessions(Utc::now()).await.unwrap();
        assert_eq!(swept, 1);
        assert!(store.get_active_session("+905550000004").await.unwrap().is_none());
        assert!(store.get_active_session("+905550000005").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn register_then_verify_succeeds_and_resets_counter() {
        let store = memory_store().await;
        let auth = PinAuth::new(store.clone(), 3, StdDuration::from_secs(900));
        let user = Uuid::now_v7();

        auth.register(user, user, "+905551112233", "1234").await.unwrap();

        // A stray failure first, so success provably resets the counter.
        let wrong = auth.verify("+905551112233", "0000", "whatsapp").await.unwrap();
        assert_eq!(wrong, VerifyOutcome::Invalid { remaining_attempts: 2 });

        let outcome = auth.verify("+905551112233", "1234", "whatsapp").await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Success { user_id: user });

        let record = store.get_pin("+905551112233").await.unwrap().unwrap();
        assert_eq!(record.failed_attempts, 0);
        assert!(!record.is_locked);
        assert!(record.last_login.is_some());
    }

    #[tokio::test]
    async fn re_register_replaces_the_previous_pin() {
        let store = memory_store().await;
        let auth = PinAuth::new(store.clone(), 3, StdDuration::from_secs(900));
        let user = Uuid::now_v7();

        auth.register(user, user, "+905551112244", "1234").await.unwrap();
        auth.register(user, user, "+905551112244", "9999").await.unwrap();

        let old = auth.verify("+905551112244", "1234", "web").await.unwrap();
        assert_eq!(old, VerifyOutcome::Invalid { remaining_attempts: 2 });
        let new = auth.verify("+905551112244", "9999", "web").await.unwrap();
        assert_eq!(new, VerifyOutcome::Success { user_id: user });
    }

    #[tokio::test]
    async fn third_failure_locks_and_lock_short_circuits() {
        let store = memory_store().await;
        let auth = PinAuth::new(store.clone(), 3, StdDuration::from_secs(900));
        let user = Uuid::now_v7();
        auth.register(user, user, "+905551112255", "1234").await.unwrap();

        assert_eq!(
            auth.verify("+905551112255", "0000", "whatsapp").await.unwrap(),
            VerifyOutcome::Invalid { remaining_attempts: 2 }
        );
        assert_eq!(
            auth.verify("+905551112255", "0000", "whatsapp").await.unwrap(),
            VerifyOutcome::Invalid { remaining_attempts: 1 }
        );
        let locked = auth.verify("+905551112255", "0000", "whatsapp").await.unwrap();
        let VerifyOutcome::Locked { blocked_until } = locked else {
            panic!("expected lock after third failure, got {locked:?}");
        };
        assert!(blocked_until > Utc::now());

        // Fourth attempt bounces off the lock without touching the counter.
        let again = auth.verify("+905551112255", "1234", "whatsapp").await.unwrap();
        assert!(matches!(again, VerifyOutcome::Locked { .. }));
        let record = store.get_pin("+905551112255").await.unwrap().unwrap();
        assert_eq!(record.failed_attempts, 3);

        // Three verifies logged; the lock bounce is not an attempt.
        let attempts: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM pin_verification_attempts WHERE phone = ?")
                .bind("+905551112255")
                .fetch_one(&store.pool)
                .await
                .unwrap()
                .get("n");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn unknown_phone_is_not_registered() {
        let store = memory_store().await;
        let auth = PinAuth::new(store.clone(), 3, StdDuration::from_secs(900));
        let outcome = auth.verify("+905559999999", "1234", "whatsapp").await.unwrap();
        assert_eq!(outcome, VerifyOutcome::NotRegistered);
    }

    #[tokio::test]
    async fn register_rejects_foreign_caller_and_bad_shape() {
        let store = memory_store().await;
        let auth = PinAuth::new(store.clone(), 3, StdDuration::from_secs(900));
        let owner = Uuid::now_v7();
        let attacker = Uuid::now_v7();

        assert!(matches!(
            auth.register(attacker, owner, "+905551112266", "1234").await,
            Err(GatewayError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.register(owner, owner, "+905551112266", "12").await,
            Err(GatewayError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn orphan_pin_row_is_removed_on_phone_takeover() {
        let store = memory_store().await;
        let old_user = Uuid::now_v7();
        let new_user = Uuid::now_v7();

        store
            .upsert_pin(old_user, "+905551112277", &hash_pin("1111"))
            .await
            .unwrap();
        store
            .upsert_pin(new_user, "+905551112277", &hash_pin("2222"))
            .await
            .unwrap();

        let record = store.get_pin("+905551112277").await.unwrap().unwrap();
        assert_eq!(record.user_id, new_user);
        let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM user_security")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn draft_round_trip_and_single_row_per_user() {
        let store = memory_store().await;
        let user = Uuid::now_v7();
        let now = Utc::now();

        let mut draft = Draft {
            user_id: user,
            state: DraftState::Draft,
            listing_data: serde_json::json!({"title": "iphone 13", "price": 25000}),
            images: vec!["u/a.jpg".into()],
            vision_product: None,
            created_at: now,
            updated_at: now,
        };
        store.upsert_draft(&draft).await.unwrap();

        draft.state = DraftState::Preview;
        draft.listing_data["category"] = serde_json::json!("Elektronik");
        store.upsert_draft(&draft).await.unwrap();

        let loaded = store.get_draft(user).await.unwrap().unwrap();
        assert_eq!(loaded.state, DraftState::Preview);
        assert_eq!(loaded.listing_data["title"], "iphone 13");
        assert_eq!(loaded.images, vec!["u/a.jpg".to_string()]);

        let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM active_drafts")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(rows, 1);

        store.delete_draft(user).await.unwrap();
        assert!(store.get_draft(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn safety_flag_insert_persists_pending_row() {
        let store = memory_store().await;
        let flag = ImageSafetyFlag {
            id: Uuid::now_v7(),
            user_id: Some(Uuid::now_v7()),
            image_ref: Some("u/x.jpg".into()),
            flag_type: FlagType::Weapon,
            confidence: Confidence::High,
            message: "silah tespit edildi".into(),
            status: FlagStatus::Pending,
            created_at: Utc::now(),
            reviewed_at: None,
            reviewer: None,
            notes: None,
        };
        store.insert_safety_flag(&flag).await.unwrap();

        let row = sqlx::query("SELECT flag_type, status FROM image_safety_flags WHERE id = ?")
            .bind(uuid_to_blob(flag.id))
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("flag_type"), "weapon");
        assert_eq!(row.get::<String, _>("status"), "pending");
    }

    struct AlwaysBlocks;

    #[async_trait]
    impl pg_core::traits::SafetyClassifier for AlwaysBlocks {
        async fn classify(&self, _image_ref: &str) -> Result<pg_core::models::SafetyReport> {
            Ok(pg_core::models::SafetyReport {
                safe: false,
                flag_type: "weapon".into(),
                confidence: "high".into(),
                message: "silah".into(),
                allow_listing: false,
                product: None,
            })
        }
    }

    #[tokio::test]
    async fn gate_block_writes_exactly_one_pending_flag() {
        let store = memory_store().await;
        let gate = pg_core::safety::SafetyGate::new(store.clone(), Arc::new(AlwaysBlocks), true);
        let user = Uuid::now_v7();

        let verdict = gate
            .evaluate(Some(user), &["u/a.jpg".into(), "u/b.jpg".into()])
            .await
            .unwrap();
        assert!(matches!(verdict, pg_core::models::Verdict::Block { flag_type: FlagType::Weapon, .. }));

        // Only the first image is evaluated; exactly one row lands.
        let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM image_safety_flags")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(rows, 1);
        let row = sqlx::query("SELECT status, image_ref FROM image_safety_flags")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("status"), "pending");
        assert_eq!(row.get::<String, _>("image_ref"), "u/a.jpg");
    }

    #[tokio::test]
    async fn listing_insert_returns_id_and_validates_title() {
        let store = memory_store().await;
        let listing = Listing {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            title: "Toyota Corolla".into(),
            price: 500_000,
            condition: Some("used".into()),
            category: "Otomotiv".into(),
            description: None,
            location: "Türkiye".into(),
            stock: 1,
            status: "active".into(),
            metadata: serde_json::json!({"type": "vehicle"}),
            images: vec![],
            created_at: Utc::now(),
        };
        let id = store.insert_listing(&listing).await.unwrap();
        assert_eq!(id, listing.id);

        let untitled = Listing { title: "  ".into(), ..listing };
        assert!(matches!(
            store.insert_listing(&untitled).await,
            Err(GatewayError::Validation(_))
        ));
    }
}
