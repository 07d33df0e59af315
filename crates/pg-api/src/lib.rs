//! # pg-api
//!
//! The web routing and orchestration layer for the marketplace gateway.

pub mod controller;
pub mod handlers;
pub mod locks;
pub mod middleware;
pub mod replies;

use actix_web::web;

/// Configures the routes for the gateway.
///
/// Scoped configuration lets the binary mount the API under a different
/// prefix if the transport webhook ever needs one.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            // One inbound message, one reply envelope
            .route("/turn", web::post().to(handlers::handle_turn))
            // Out-of-band PIN setup
            .route("/pin/register", web::post().to(handlers::register_pin))
            // Collaborator wiring
            .route("/health", web::get().to(handlers::health)),
    );
}
