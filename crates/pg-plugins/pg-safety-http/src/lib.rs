//! # pg-safety-http
//!
//! HTTP implementation of `SafetyClassifier`. The classifier service owns
//! content judgment (including the contract that clothing items such as
//! swimwear are not illegal in isolation); this client only moves the
//! verdict across the wire within its time budget.

use std::time::Duration;

use async_trait::async_trait;
use pg_core::error::{GatewayError, Result};
use pg_core::models::SafetyReport;
use pg_core::traits::SafetyClassifier;
use serde::Serialize;

pub struct SafetyHttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image_ref: &'a str,
}

impl SafetyHttpClassifier {
    /// `base_url` points at the classifier service root; the call budget
    /// comes from SAFETY_TIMEOUT_MS.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("pazar-gateway/0.1")
            .build()
            .unwrap_or_default();
        SafetyHttpClassifier {
            client,
            endpoint: format!("{}/classify", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl SafetyClassifier for SafetyHttpClassifier {
    async fn classify(&self, image_ref: &str) -> Result<SafetyReport> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest { image_ref })
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ExternalUnavailable(format!(
                "classifier returned {status}"
            )));
        }

        // The contract is strict JSON; anything else counts as an outage
        // and lets the gate apply its outage policy.
        response
            .json::<SafetyReport>()
            .await
            .map_err(|e| GatewayError::ExternalUnavailable(format!("malformed classifier reply: {e}")))
    }
}

fn transport_err(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(format!("classifier call timed out: {e}"))
    } else {
        GatewayError::ExternalUnavailable(format!("classifier unreachable: {e}"))
    }
}
