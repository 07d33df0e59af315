//! pazar-gateway/crates/pg-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the marketplace
//! gateway: models, ports, errors, configuration, and the five engines
//! (PIN auth, session lifecycle, safety gate, intent router, draft FSM).

pub mod auth;
pub mod category;
pub mod config;
pub mod draft;
pub mod error;
pub mod extract;
pub mod intent;
pub mod models;
pub mod price;
pub mod retry;
pub mod safety;
pub mod session;
pub mod traits;

// Re-exporting for easier access in other crates
pub use config::{GatewayConfig, RouterKeywords};
pub use error::{GatewayError, Result};
pub use models::*;
pub use traits::*;
