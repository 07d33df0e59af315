//! # Domain Models
//!
//! These structs represent the core entities of the marketplace gateway.
//! We use UUID v7 for time-ordered, globally unique identification; session
//! tokens are random v4.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role attached to a profile. Profiles are created out-of-band; the
/// gateway only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Moderator => "moderator",
        }
    }

    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            _ => Role::User,
        }
    }
}

/// A marketplace user as seen by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    /// WhatsApp phone in E.164 form (e.g., "+905551234567"); unique when set
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub role: Role,
}

/// PIN credential row, one per profile.
///
/// Invariant: `is_locked` holds exactly while `blocked_until` lies in the
/// future. A successful verify resets `failed_attempts` to 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinRecord {
    pub user_id: Uuid,
    pub phone: String,
    /// Hex-encoded SHA-256 of the 4-6 digit PIN
    pub pin_hash: String,
    pub failed_attempts: i64,
    pub is_locked: bool,
    pub blocked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Append-only audit row for every PIN verification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinAttempt {
    pub phone: String,
    pub attempted_at: DateTime<Utc>,
    pub success: bool,
    /// Where the attempt came from ("whatsapp", "web")
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Timed,
    EventBased,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Timed => "timed",
            SessionType::EventBased => "event_based",
        }
    }

    pub fn parse(s: &str) -> SessionType {
        match s {
            "event_based" => SessionType::EventBased,
            _ => SessionType::Timed,
        }
    }
}

/// Tagged cause of a session's termination, always paired with `ended_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Timeout,
    UserCancelled,
    OperationCompleted,
    Manual,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Timeout => "timeout",
            EndReason::UserCancelled => "user_cancelled",
            EndReason::OperationCompleted => "operation_completed",
            EndReason::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<EndReason> {
        match s {
            "timeout" => Some(EndReason::Timeout),
            "user_cancelled" => Some(EndReason::UserCancelled),
            "operation_completed" => Some(EndReason::OperationCompleted),
            "manual" => Some(EndReason::Manual),
            _ => None,
        }
    }
}

/// A phone-scoped authentication window with an absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone: String,
    pub token: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Always `created_at + ttl`; never extended by activity
    pub expires_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
    pub last_activity: DateTime<Utc>,
    pub session_type: SessionType,
}

impl Session {
    /// An active session whose expiry still lies ahead of `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// Classifier verdict categories for an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    None,
    Weapon,
    Drugs,
    Violence,
    Abuse,
    Terrorism,
    Stolen,
    Document,
    Sexual,
    Hate,
    Unknown,
}

impl FlagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::None => "none",
            FlagType::Weapon => "weapon",
            FlagType::Drugs => "drugs",
            FlagType::Violence => "violence",
            FlagType::Abuse => "abuse",
            FlagType::Terrorism => "terrorism",
            FlagType::Stolen => "stolen",
            FlagType::Document => "document",
            FlagType::Sexual => "sexual",
            FlagType::Hate => "hate",
            FlagType::Unknown => "unknown",
        }
    }

    /// Classifier responses are free strings; anything unrecognized maps to
    /// `Unknown` rather than failing the turn.
    pub fn parse(s: &str) -> FlagType {
        match s {
            "none" => FlagType::None,
            "weapon" => FlagType::Weapon,
            "drugs" => FlagType::Drugs,
            "violence" => FlagType::Violence,
            "abuse" => FlagType::Abuse,
            "terrorism" => FlagType::Terrorism,
            "stolen" => FlagType::Stolen,
            "document" => FlagType::Document,
            "sexual" => FlagType::Sexual,
            "hate" => FlagType::Hate,
            _ => FlagType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Confidence {
        match s {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    Pending,
    Confirmed,
    Dismissed,
    Banned,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Pending => "pending",
            FlagStatus::Confirmed => "confirmed",
            FlagStatus::Dismissed => "dismissed",
            FlagStatus::Banned => "banned",
        }
    }
}

/// Append-only review row written whenever the safety gate blocks an image.
/// Admin review happens elsewhere; the gateway only inserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSafetyFlag {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub image_ref: Option<String>,
    pub flag_type: FlagType,
    pub confidence: Confidence,
    pub message: String,
    pub status: FlagStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer: Option<String>,
    pub notes: Option<String>,
}

/// Draft lifecycle states. `Published` and `Cancelled` are terminal; a
/// terminal draft is removed from storage rather than kept around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DraftState {
    Draft,
    Preview,
    Published,
    Cancelled,
}

impl DraftState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftState::Draft => "DRAFT",
            DraftState::Preview => "PREVIEW",
            DraftState::Published => "PUBLISHED",
            DraftState::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> DraftState {
        match s {
            "PREVIEW" => DraftState::Preview,
            "PUBLISHED" => DraftState::Published,
            "CANCELLED" => DraftState::Cancelled,
            _ => DraftState::Draft,
        }
    }
}

/// A user-scoped in-progress listing, persisted across turns until
/// published or cancelled. At most one per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub user_id: Uuid,
    pub state: DraftState,
    /// Free-form attribute bag (title, price, condition, category, ...)
    pub listing_data: serde_json::Value,
    pub images: Vec<String>,
    /// Opaque snapshot from the vision classifier, passed through on publish
    pub vision_product: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Closed routing enumeration. The router never produces anything outside
/// this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateListing,
    UpdateListing,
    DeleteListing,
    PublishListing,
    SearchProduct,
    ViewMyListings,
    SmallTalk,
    Cancel,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CreateListing => "create_listing",
            Intent::UpdateListing => "update_listing",
            Intent::DeleteListing => "delete_listing",
            Intent::PublishListing => "publish_listing",
            Intent::SearchProduct => "search_product",
            Intent::ViewMyListings => "view_my_listings",
            Intent::SmallTalk => "small_talk",
            Intent::Cancel => "cancel",
        }
    }

    /// Listing-adjacent intents are handled by the draft FSM instead of the
    /// agent backend.
    pub fn is_listing_adjacent(&self) -> bool {
        matches!(
            self,
            Intent::CreateListing
                | Intent::UpdateListing
                | Intent::PublishListing
                | Intent::DeleteListing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Whatsapp,
    Web,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Whatsapp => "whatsapp",
            Transport::Web => "web",
        }
    }
}

/// One inbound message as received from the transport layer.
#[derive(Debug, Clone, Deserialize)]
pub struct Turn {
    pub phone: String,
    pub user_id: Option<Uuid>,
    pub text: String,
    #[serde(default)]
    pub image_refs: Vec<String>,
    pub transport: Transport,
    /// Echoed through to the agent backend when the turn is forwarded
    #[serde(default)]
    pub conversation_state: Option<ConversationState>,
}

/// Immutable request context threaded through every call of a turn.
/// Replaces any process-wide "current user" state.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub user_id: Uuid,
    pub phone: String,
    pub session_token: Uuid,
    pub transport: Transport,
}

/// Reply envelope returned to the transport.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub reply_text: String,
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<Uuid>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
}

impl TurnReply {
    pub fn text(reply_text: impl Into<String>) -> Self {
        TurnReply {
            reply_text: reply_text.into(),
            intent: None,
            session_token: None,
            listing_id: None,
            success: true,
            end_reason: None,
        }
    }
}

/// Safety gate result over an image batch. `Block` always has a matching
/// `image_safety_flags` row persisted before it is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Safe {
        product_summary: Option<serde_json::Value>,
    },
    Block {
        flag_type: FlagType,
        confidence: Confidence,
        message: String,
    },
}

/// Strict-JSON response contract of the external image classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyReport {
    pub safe: bool,
    pub flag_type: String,
    pub confidence: String,
    pub message: String,
    pub allow_listing: bool,
    #[serde(default)]
    pub product: Option<serde_json::Value>,
}

/// Conversation state echoed between gateway and agent backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub active_listing_id: Option<String>,
    #[serde(default)]
    pub last_intent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub authenticated: bool,
    pub session_expires_at: Option<DateTime<Utc>>,
}

/// Request contract toward the downstream agent backend.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRequest {
    pub user_id: Uuid,
    pub phone: Option<String>,
    pub message: String,
    pub conversation_history: Vec<serde_json::Value>,
    pub media_paths: Vec<String>,
    pub auth_context: AuthContext,
    pub conversation_state: ConversationState,
}

/// Response contract from the agent backend.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentReply {
    pub response: String,
    pub intent: String,
    pub success: bool,
}

impl AgentReply {
    /// The agent signals a finished operation via an intent tag carrying the
    /// `complet` stem (e.g. "sale_completed"). A dedicated boolean would be
    /// preferable once the agent contract is under our control.
    pub fn signals_completion(&self) -> bool {
        self.intent.to_ascii_lowercase().contains("complet")
    }
}

/// A published listing row as written by the draft FSM on publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    /// Integer price, currency implied TRY
    pub price: i64,
    pub condition: Option<String>,
    pub category: String,
    pub description: Option<String>,
    pub location: String,
    pub stock: i64,
    pub status: String,
    /// Carries the `type` discriminator plus any audit keys
    pub metadata: serde_json::Value,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_reason_round_trips_through_str() {
        for reason in [
            EndReason::Timeout,
            EndReason::UserCancelled,
            EndReason::OperationCompleted,
            EndReason::Manual,
        ] {
            assert_eq!(EndReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(EndReason::parse("weird"), None);
    }

    #[test]
    fn unknown_flag_type_maps_to_unknown() {
        assert_eq!(FlagType::parse("weapon"), FlagType::Weapon);
        assert_eq!(FlagType::parse("contraband"), FlagType::Unknown);
    }

    #[test]
    fn session_liveness_respects_absolute_expiry() {
        let now = Utc::now();
        let session = Session {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            phone: "+905551234567".to_string(),
            token: Uuid::new_v4(),
            is_active: true,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(600),
            ended_at: None,
            end_reason: None,
            last_activity: now,
            session_type: SessionType::Timed,
        };
        assert!(session.is_live(now));
        assert!(!session.is_live(now + chrono::Duration::seconds(601)));
    }

    #[test]
    fn completion_stem_is_detected_case_insensitively() {
        let reply = AgentReply {
            response: "done".into(),
            intent: "Sale_Completed".into(),
            success: true,
        };
        assert!(reply.signals_completion());
    }
}
