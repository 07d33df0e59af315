//! # GatewayError
//!
//! Centralized error handling for the gateway ecosystem.
//! Maps infrastructure and validation failures to actionable error types.
//!
//! Domain outcomes that a user can trigger legitimately (wrong PIN, locked
//! account, blocked image) are NOT errors; they are sum types returned by
//! the respective engines. Only the controller turns error kinds into
//! user-visible Turkish strings.

use thiserror::Error;

/// The primary error type for all gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Caller mismatch, e.g. registering a PIN for somebody else's profile
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Input failed a contract check (bad PIN shape, missing listing field)
    #[error("validation error: {0}")]
    Validation(String),

    /// Transient persistence failure; reads may be retried with backoff
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Constraint violation in the store; fatal for the turn
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// A boundary collaborator (classifier, agent backend) failed
    #[error("external service unavailable: {0}")]
    ExternalUnavailable(String),

    /// A bounded external call exceeded its deadline
    #[error("timed out: {0}")]
    Timeout(String),
}

impl GatewayError {
    /// Transient errors are worth retrying with jittered backoff; everything
    /// else surfaces immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::StoreUnavailable(_))
    }
}

/// A specialized Result type for gateway logic.
pub type Result<T> = std::result::Result<T, GatewayError>;
