//! DashScope (Qwen) text-generation client used as the conversational assistant.

use crate::session::ConversationTurn;
use crate::traits::{AssistantClient, RelayError, RelayResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// DashScope API Types
// ============================================================================

/// Request body for the text-generation API.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub input: GenerationInput<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationInput<'a> {
    pub messages: &'a [ConversationTurn],
}

/// Response body from the text-generation API.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub output: GenerationOutput,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationOutput {
    #[serde(default)]
    pub text: String,
}

// ============================================================================
// Client
// ============================================================================

pub struct DashScopeAssistant {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl DashScopeAssistant {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AssistantClient for DashScopeAssistant {
    async fn generate_reply(&self, history: &[ConversationTurn]) -> RelayResult<String> {
        let request = GenerationRequest {
            model: &self.model,
            input: GenerationInput { messages: history },
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            turns = history.len(),
            "Calling assistant API"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.api_key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::Collaborator(format!("assistant request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Collaborator(format!(
                "assistant API returned {status}: {body}"
            )));
        }

        let generation: GenerationResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Collaborator(format!("invalid assistant response: {e}")))?;

        Ok(generation.output.text)
    }
}
