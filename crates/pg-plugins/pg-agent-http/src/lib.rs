//! # pg-agent-http
//!
//! HTTP implementation of `AgentBackend`. Non-listing intents are answered
//! by the downstream agent service; this client ships the turn with its
//! auth and conversation context and brings back the reply envelope.

use std::time::Duration;

use async_trait::async_trait;
use pg_core::error::{GatewayError, Result};
use pg_core::models::{AgentReply, AgentRequest};
use pg_core::traits::AgentBackend;

pub struct AgentHttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl AgentHttpBackend {
    /// `base_url` points at the agent service root; the call budget comes
    /// from AGENT_TIMEOUT_MS.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("pazar-gateway/0.1")
            .build()
            .unwrap_or_default();
        AgentHttpBackend {
            client,
            endpoint: format!("{}/agent/run", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl AgentBackend for AgentHttpBackend {
    async fn dispatch(&self, request: &AgentRequest) -> Result<AgentReply> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ExternalUnavailable(format!(
                "agent backend returned {status}"
            )));
        }

        response
            .json::<AgentReply>()
            .await
            .map_err(|e| GatewayError::ExternalUnavailable(format!("malformed agent reply: {e}")))
    }
}

fn transport_err(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(format!("agent call timed out: {e}"))
    } else {
        GatewayError::ExternalUnavailable(format!("agent backend unreachable: {e}"))
    }
}
