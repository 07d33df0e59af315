//! pazar-gateway/crates/pg-api/src/handlers.rs
//!
//! This module coordinates the flow between HTTP requests and the turn
//! controller. Every domain outcome (refusals included) is a 200; 4xx is
//! reserved for malformed input and 5xx for unrecovered infrastructure.

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pg_core::error::GatewayError;
use pg_core::models::{Turn, TurnReply};

use crate::controller::Controller;
use crate::replies;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub controller: Controller,
    pub turn_deadline: std::time::Duration,
    pub classifier_configured: bool,
    pub agent_configured: bool,
}

/// `POST /turn` — one inbound message, one reply envelope.
pub async fn handle_turn(data: web::Data<AppState>, body: web::Json<Turn>) -> impl Responder {
    let turn = body.into_inner();
    if turn.phone.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "phone is required"
        }));
    }

    // The turn deadline is a hard upper bound; on breach we answer with a
    // generic error and stop mutating state.
    match tokio::time::timeout(data.turn_deadline, data.controller.handle(&turn)).await {
        Ok(reply) => HttpResponse::Ok().json(reply),
        Err(_) => {
            log::error!("turn deadline exceeded for {}", turn.phone);
            let mut reply = TurnReply::text(replies::generic_error());
            reply.success = false;
            HttpResponse::Ok().json(reply)
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterPinRequest {
    /// Authenticated caller; must match `user_id`
    pub caller_id: Uuid,
    pub user_id: Uuid,
    pub phone: String,
    pub pin: String,
}

#[derive(Serialize)]
struct RegisterPinResponse {
    success: bool,
    message: String,
}

/// `POST /pin/register` — out-of-band PIN setup from the account surface.
pub async fn register_pin(
    data: web::Data<AppState>,
    body: web::Json<RegisterPinRequest>,
) -> impl Responder {
    let req = body.into_inner();
    match data
        .controller
        .register_pin(req.caller_id, req.user_id, &req.phone, &req.pin)
        .await
    {
        Ok(()) => HttpResponse::Ok().json(RegisterPinResponse {
            success: true,
            message: replies::pin_registered(),
        }),
        Err(GatewayError::Unauthorized(_)) => HttpResponse::Forbidden().json(RegisterPinResponse {
            success: false,
            message: "Bu işlem için yetkiniz yok.".to_string(),
        }),
        Err(GatewayError::Validation(_)) => HttpResponse::BadRequest().json(RegisterPinResponse {
            success: false,
            message: "PIN 4-6 haneli rakamlardan oluşmalıdır".to_string(),
        }),
        Err(error) => {
            log::error!("pin register failed: {error}");
            HttpResponse::InternalServerError().json(RegisterPinResponse {
                success: false,
                message: replies::store_unavailable(),
            })
        }
    }
}

/// `GET /health` — collaborator wiring without secrets.
pub async fn health(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "pazar-gateway",
        "checks": {
            "safety_classifier": if data.classifier_configured { "configured" } else { "missing" },
            "agent_backend": if data.agent_configured { "configured" } else { "missing" },
        }
    }))
}
