//! # Turn Controller
//!
//! Orchestrates one inbound turn: safety → auth → session → route →
//! dispatch. Short-circuits at the first reply, holds the phone lock for
//! the whole turn, and is the only place user-visible Turkish text is
//! produced.

use std::sync::Arc;

use pg_core::auth::{is_pin_shaped, PinAuth, VerifyOutcome};
use pg_core::config::GatewayConfig;
use pg_core::draft::{DraftFsm, StepOutcome};
use pg_core::error::{GatewayError, Result};
use pg_core::intent::IntentRouter;
use pg_core::models::{
    AgentRequest, AuthContext, EndReason, Intent, Session, Turn, TurnContext, TurnReply, Verdict,
};
use pg_core::retry::with_read_retries;
use pg_core::safety::SafetyGate;
use pg_core::session::SessionManager;
use pg_core::traits::{AgentBackend, ListingsRepo, SafetyClassifier, Store};

use crate::locks::PhoneLocks;
use crate::replies;

pub struct Controller {
    config: GatewayConfig,
    sessions: SessionManager,
    auth: PinAuth,
    gate: SafetyGate,
    fsm: DraftFsm,
    agent: Arc<dyn AgentBackend>,
    router: IntentRouter,
    locks: PhoneLocks,
}

impl Controller {
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn Store>,
        listings: Arc<dyn ListingsRepo>,
        classifier: Arc<dyn SafetyClassifier>,
        agent: Arc<dyn AgentBackend>,
    ) -> Self {
        Controller {
            sessions: SessionManager::new(store.clone(), config.session_ttl),
            auth: PinAuth::new(store.clone(), config.pin_max_failed, config.pin_lock),
            gate: SafetyGate::new(store.clone(), classifier, config.safety_fail_open),
            fsm: DraftFsm::new(store, listings),
            router: IntentRouter::new(&config.keywords),
            agent,
            locks: PhoneLocks::new(),
            config,
        }
    }

    /// Out-of-band PIN (re)registration, exposed over HTTP for the account
    /// surface. The caller must be the profile owner.
    pub async fn register_pin(
        &self,
        caller: uuid::Uuid,
        user_id: uuid::Uuid,
        phone: &str,
        pin: &str,
    ) -> Result<()> {
        self.auth.register(caller, user_id, phone, pin).await
    }

    /// Handles one turn end to end. Never fails outward: every error kind
    /// maps to a short Turkish reply, with the technical detail logged.
    pub async fn handle(&self, turn: &Turn) -> TurnReply {
        let _guard = self.locks.acquire(&turn.phone).await;
        match self.handle_locked(turn).await {
            Ok(reply) => reply,
            Err(error) => {
                log::error!("turn failed for {}: {error}", turn.phone);
                let mut reply = TurnReply::text(match &error {
                    GatewayError::StoreUnavailable(_) => replies::store_unavailable(),
                    GatewayError::ExternalUnavailable(_) | GatewayError::Timeout(_) => {
                        replies::agent_unavailable()
                    }
                    _ => replies::generic_error(),
                });
                reply.success = false;
                reply
            }
        }
    }

    async fn handle_locked(&self, turn: &Turn) -> Result<TurnReply> {
        // 1. Image safety runs before any routing decision.
        let mut vision_product = None;
        if !turn.image_refs.is_empty() {
            match self.gate.evaluate(turn.user_id, &turn.image_refs).await? {
                Verdict::Block { message, .. } => {
                    let mut reply = TurnReply::text(replies::safety_refusal(&message));
                    reply.success = false;
                    return Ok(reply);
                }
                Verdict::Safe { product_summary } => vision_product = product_summary,
            }
        }

        // 2. Session lookup (lazy timeout happens inside).
        let session = with_read_retries(|| self.sessions.current(&turn.phone)).await?;

        // 3. No session: either a PIN entry or a prompt for one.
        let Some(session) = session else {
            return self.handle_unauthenticated(turn).await;
        };

        // 4. Activity stamp; never extends the expiry.
        self.sessions.touch(session.id).await?;

        let ctx = TurnContext {
            user_id: session.user_id,
            phone: turn.phone.clone(),
            session_token: session.token,
            transport: turn.transport,
        };

        let has_draft =
            with_read_retries(|| self.fsm.has_active_draft(ctx.user_id)).await?;

        // 5. Cancel keyword: with a draft it cancels the draft, without one
        //    it closes the session.
        if self.router.is_cancel_message(&turn.text) {
            if has_draft {
                self.fsm.cancel_active(ctx.user_id).await?;
                let mut reply = TurnReply::text(replies::draft_cancelled());
                reply.intent = Some(Intent::Cancel);
                return Ok(reply);
            }
            self.sessions.end(session.id, EndReason::UserCancelled).await?;
            let mut reply = TurnReply::text(replies::session_cancelled());
            reply.intent = Some(Intent::Cancel);
            reply.end_reason = Some(EndReason::UserCancelled);
            return Ok(reply);
        }

        // 6. Deterministic routing.
        let intent = self.router.classify(&turn.text, has_draft);

        // 7. Listing-adjacent intents drive the draft FSM.
        if intent.is_listing_adjacent() {
            let outcome = self
                .fsm
                .step(intent, &ctx, &turn.text, &turn.image_refs, vision_product)
                .await?;
            match outcome {
                StepOutcome::Forward => {
                    // Published-listing work belongs to the agent backend.
                }
                other => return Ok(self.render_step(intent, other)),
            }
        }

        // 8. Everything else goes downstream.
        self.dispatch_to_agent(turn, &session, &ctx, intent).await
    }

    async fn handle_unauthenticated(&self, turn: &Turn) -> Result<TurnReply> {
        let text = turn.text.trim();
        if !is_pin_shaped(text) {
            let mut reply = TurnReply::text(replies::pin_prompt());
            reply.success = false;
            return Ok(reply);
        }

        match self
            .auth
            .verify(&turn.phone, text, turn.transport.as_str())
            .await?
        {
            VerifyOutcome::Success { user_id } => {
                // A draft cannot outlive its session; whatever a prior
                // (expired or superseded) session left behind goes now.
                self.fsm.discard_on_session_end(user_id).await?;
                let session = self.sessions.open(user_id, &turn.phone).await?;
                let mut reply =
                    TurnReply::text(replies::login_success(self.config.session_ttl_minutes()));
                reply.session_token = Some(session.token);
                Ok(reply)
            }
            VerifyOutcome::Invalid { remaining_attempts } => {
                let mut reply = TurnReply::text(replies::pin_invalid(remaining_attempts));
                reply.success = false;
                Ok(reply)
            }
            VerifyOutcome::Locked { blocked_until } => {
                let mut reply = TurnReply::text(replies::pin_locked(blocked_until));
                reply.success = false;
                Ok(reply)
            }
            VerifyOutcome::NotRegistered => {
                let mut reply = TurnReply::text(replies::pin_not_registered());
                reply.success = false;
                Ok(reply)
            }
        }
    }

    fn render_step(&self, intent: Intent, outcome: StepOutcome) -> TurnReply {
        let mut reply = match outcome {
            StepOutcome::Preview { draft } => TurnReply::text(replies::draft_preview(&draft)),
            StepOutcome::Updated { missing, .. } => {
                let field = missing.first().copied().unwrap_or("title");
                TurnReply::text(replies::missing_field(field))
            }
            StepOutcome::Published {
                listing_id,
                title,
                price,
                location,
            } => {
                let mut reply =
                    TurnReply::text(replies::publish_success(&title, price, &location, listing_id));
                reply.listing_id = Some(listing_id);
                reply
            }
            StepOutcome::PublishFailed { error } => {
                log::warn!("publish failed: {error}");
                let mut reply = TurnReply::text(replies::publish_failed(&error));
                reply.success = false;
                reply
            }
            StepOutcome::NoDraft => TurnReply::text(replies::no_draft_to_publish()),
            StepOutcome::Cancelled => TurnReply::text(replies::draft_cancelled()),
            StepOutcome::Forward => TurnReply::text(replies::generic_error()),
        };
        reply.intent = Some(intent);
        reply
    }

    async fn dispatch_to_agent(
        &self,
        turn: &Turn,
        session: &Session,
        ctx: &TurnContext,
        intent: Intent,
    ) -> Result<TurnReply> {
        let mut conversation_state = turn.conversation_state.clone().unwrap_or_default();
        conversation_state.last_intent = Some(intent.as_str().to_string());

        let request = AgentRequest {
            user_id: ctx.user_id,
            phone: Some(ctx.phone.clone()),
            message: turn.text.clone(),
            conversation_history: Vec::new(),
            media_paths: turn.image_refs.clone(),
            auth_context: AuthContext {
                user_id: ctx.user_id,
                authenticated: true,
                session_expires_at: Some(session.expires_at),
            },
            conversation_state,
        };

        let agent_reply = match self.agent.dispatch(&request).await {
            Ok(agent_reply) => agent_reply,
            Err(GatewayError::ExternalUnavailable(e)) | Err(GatewayError::Timeout(e)) => {
                // The session survives an agent outage.
                log::warn!("agent backend unavailable: {e}");
                let mut reply = TurnReply::text(replies::agent_unavailable());
                reply.intent = Some(intent);
                reply.success = false;
                return Ok(reply);
            }
            Err(other) => return Err(other),
        };

        let mut reply = TurnReply::text(agent_reply.response.clone());
        reply.intent = Some(intent);
        reply.success = agent_reply.success;

        // 9. The agent's completion tag closes the session.
        if agent_reply.signals_completion() {
            self.sessions
                .end(session.id, EndReason::OperationCompleted)
                .await?;
            self.fsm.discard_on_session_end(ctx.user_id).await?;
            reply.end_reason = Some(EndReason::OperationCompleted);
        }

        Ok(reply)
    }
}
