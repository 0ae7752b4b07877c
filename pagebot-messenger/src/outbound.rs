//! Outbound replies through the Graph API send endpoint.

use crate::traits::{OutboundSender, RelayError, RelayResult};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SendPayload<'a> {
    recipient: Recipient<'a>,
    message: MessageBody<'a>,
    messaging_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    text: &'a str,
}

/// Sends text as the page via `/{version}/{page_id}/messages`.
pub struct GraphApiSender {
    client: reqwest::Client,
    url: String,
    access_token: String,
}

impl GraphApiSender {
    pub fn new(
        graph_url: &str,
        api_version: &str,
        page_id: &str,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: format!(
                "{}/{}/{}/messages",
                graph_url.trim_end_matches('/'),
                api_version,
                page_id
            ),
            access_token: access_token.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl OutboundSender for GraphApiSender {
    async fn send_message(&self, target_id: &str, text: &str) -> RelayResult<()> {
        let payload = SendPayload {
            recipient: Recipient { id: target_id },
            message: MessageBody { text },
            messaging_type: "RESPONSE",
        };

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::Collaborator(format!("Graph API send error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error = resp.text().await.unwrap_or_default();
            return Err(RelayError::Collaborator(format!(
                "Graph API error ({status}): {error}"
            )));
        }

        tracing::info!(target_id = %target_id, "Message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sender(server: &MockServer) -> GraphApiSender {
        GraphApiSender::new(
            &server.uri(),
            "v19.0",
            "page-1",
            "page-token",
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_url_layout() {
        let sender = GraphApiSender::new(
            "https://graph.facebook.com/",
            "v19.0",
            "123",
            "t",
            Duration::from_secs(1),
        );
        assert_eq!(sender.url(), "https://graph.facebook.com/v19.0/123/messages");
    }

    #[tokio::test]
    async fn test_send_message_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v19.0/page-1/messages"))
            .and(header("Authorization", "Bearer page-token"))
            .and(body_json(serde_json::json!({
                "recipient": { "id": "psid-1" },
                "message": { "text": "hello" },
                "messaging_type": "RESPONSE"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "recipient_id": "psid-1",
                "message_id": "m_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        sender(&server).send_message("psid-1", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_includes_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":{"message":"bad psid"}}"#),
            )
            .mount(&server)
            .await;

        let err = sender(&server).send_message("x", "hello").await.unwrap_err();
        assert!(err.to_string().contains("bad psid"));
    }
}
