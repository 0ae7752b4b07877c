//! Drives one webhook delivery: parse, decide, send.

use crate::event::{parse_payload, WebhookEvent};
use crate::selector::{ReplyDecision, ReplyStrategySelector};
use crate::traits::{OutboundSender, RelayResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Counts for one processed delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Events parsed from the payload
    pub events: usize,
    /// Replies the send API accepted
    pub replies_sent: usize,
    /// Events whose reply failed or was rejected
    pub skipped: usize,
}

/// Entry point for decoded webhook payloads.
pub struct EventDispatcher {
    selector: ReplyStrategySelector,
    sender: Arc<dyn OutboundSender>,
}

impl EventDispatcher {
    pub fn new(selector: ReplyStrategySelector, sender: Arc<dyn OutboundSender>) -> Self {
        Self { selector, sender }
    }

    pub fn selector(&self) -> &ReplyStrategySelector {
        &self.selector
    }

    /// Process one delivery.
    ///
    /// Structural problems fail the whole payload before any reply work
    /// starts. Per-event failures (collaborator errors, a pending assistant
    /// turn) are logged and the remaining events still run. `test_mode`
    /// suppresses every outbound side effect.
    pub async fn dispatch(&self, payload: &Value, test_mode: bool) -> RelayResult<DispatchSummary> {
        let events = parse_payload(payload)?;
        let mut summary = DispatchSummary {
            events: events.len(),
            ..DispatchSummary::default()
        };

        for event in &events {
            match self.handle_event(event, test_mode).await {
                Ok(true) => summary.replies_sent += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.skipped += 1;
                    tracing::warn!(
                        event = event.kind(),
                        user_id = event.target_id().unwrap_or_default(),
                        text = event_text(event),
                        error = %e,
                        "Reply skipped"
                    );
                }
            }
        }

        tracing::debug!(
            events = summary.events,
            replies_sent = summary.replies_sent,
            skipped = summary.skipped,
            test_mode,
            "Delivery processed"
        );
        Ok(summary)
    }

    /// Returns whether a reply went out.
    async fn handle_event(&self, event: &WebhookEvent, test_mode: bool) -> RelayResult<bool> {
        let decision = self.selector.decide(event, test_mode).await?;

        match decision {
            ReplyDecision::Reply { target_id, text } if !test_mode => {
                self.sender.send_message(&target_id, &text).await?;
                Ok(true)
            }
            ReplyDecision::Reply { target_id, .. } => {
                tracing::debug!(target_id = %target_id, "Test mode, reply suppressed");
                Ok(false)
            }
            ReplyDecision::NoOp => Ok(false),
        }
    }
}

fn event_text(event: &WebhookEvent) -> &str {
    match event {
        WebhookEvent::PageChangeFeed { message_text, .. } => message_text,
        WebhookEvent::PageMessage { text, .. } => text,
        WebhookEvent::PageChangeRating { .. } | WebhookEvent::Unrecognized => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Sentiment;
    use crate::selector::{NEGATIVE_REPLY, POSITIVE_REPLY};
    use crate::session::{ConversationTurn, SessionStore};
    use crate::traits::{AssistantClient, RelayError, SentimentClassifier};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Classifies by keyword; "boom" fails.
    struct KeywordSentiment;

    #[async_trait]
    impl SentimentClassifier for KeywordSentiment {
        async fn classify(&self, text: &str) -> RelayResult<Sentiment> {
            match text {
                "boom" => Err(RelayError::Collaborator("predict service down".into())),
                t if t.contains("great") => Ok(Sentiment::Positive),
                t if t.contains("terrible") => Ok(Sentiment::Negative),
                _ => Ok(Sentiment::Neutral),
            }
        }
    }

    struct EchoAssistant;

    #[async_trait]
    impl AssistantClient for EchoAssistant {
        async fn generate_reply(&self, history: &[ConversationTurn]) -> RelayResult<String> {
            Ok(history
                .last()
                .map(|t| format!("echo: {}", t.content()))
                .unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl OutboundSender for RecordingSender {
        async fn send_message(&self, target_id: &str, text: &str) -> RelayResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((target_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn dispatcher() -> (EventDispatcher, Arc<RecordingSender>, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new());
        let sender = Arc::new(RecordingSender::default());
        let selector = ReplyStrategySelector::new(
            Arc::new(KeywordSentiment),
            Arc::new(EchoAssistant),
            sessions.clone(),
        );
        (
            EventDispatcher::new(selector, sender.clone()),
            sender,
            sessions,
        )
    }

    fn feed_change(post_id: &str, message: &str) -> Value {
        json!({ "field": "feed", "value": { "post_id": post_id, "message": message } })
    }

    #[tokio::test]
    async fn test_negative_feed_sends_one_reply() {
        let (dispatcher, sender, sessions) = dispatcher();
        let payload = json!({
            "object": "page",
            "entry": [{ "changes": [feed_change("p1", "terrible")] }]
        });

        let summary = dispatcher.dispatch(&payload, false).await.unwrap();

        assert_eq!(summary.replies_sent, 1);
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![("p1".to_string(), NEGATIVE_REPLY.to_string())]
        );
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_collaborator_failure_does_not_stop_batch() {
        let (dispatcher, sender, _) = dispatcher();
        let payload = json!({
            "object": "page",
            "entry": [{ "changes": [
                feed_change("p1", "boom"),
                feed_change("p2", "great"),
                feed_change("p3", "whatever")
            ] }]
        });

        let summary = dispatcher.dispatch(&payload, false).await.unwrap();

        assert_eq!(
            summary,
            DispatchSummary {
                events: 3,
                replies_sent: 1,
                skipped: 1
            }
        );
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![("p2".to_string(), POSITIVE_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn test_test_mode_sends_nothing() {
        let (dispatcher, sender, sessions) = dispatcher();
        let payload = json!({
            "object": "page",
            "entry": [
                { "changes": [feed_change("p1", "great")] },
                { "messaging": [{ "sender": { "id": "s1" }, "message": { "text": "hi" } }] }
            ]
        });

        let summary = dispatcher.dispatch(&payload, true).await.unwrap();

        assert_eq!(summary.events, 2);
        assert_eq!(summary.replies_sent, 0);
        assert!(sender.sent.lock().unwrap().is_empty());
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_object_rejected() {
        let (dispatcher, sender, _) = dispatcher();
        let err = dispatcher
            .dispatch(&json!({ "object": "group", "entry": [] }), false)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::UnknownObject { .. }));
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sequence_error_skips_event_only() {
        let (dispatcher, sender, sessions) = dispatcher();
        sessions.prepare_for_turn("s1", "pending").unwrap();
        let payload = json!({
            "object": "page",
            "entry": [
                { "messaging": [{ "sender": { "id": "s1" }, "message": { "text": "again" } }] },
                { "messaging": [{ "sender": { "id": "s2" }, "message": { "text": "hello" } }] }
            ]
        });

        let summary = dispatcher.dispatch(&payload, false).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![("s2".to_string(), "echo: hello".to_string())]
        );
    }
}
