//! Reply strategy selection: canned sentiment replies or an assistant turn.

use crate::event::{Sentiment, WebhookEvent};
use crate::session::{ConversationTurn, SessionStore};
use crate::traits::{AssistantClient, RelayResult, SentimentClassifier};
use std::sync::Arc;

/// Reply to positive feedback.
pub const POSITIVE_REPLY: &str =
    "We're so glad to hear that! Could you share more about what you enjoyed?";

/// Reply to negative feedback.
pub const NEGATIVE_REPLY: &str =
    "We're sorry to hear that. Could you share more about what went wrong?";

/// What to send in response to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyDecision {
    Reply { target_id: String, text: String },
    NoOp,
}

impl ReplyDecision {
    fn reply(target_id: &str, text: impl Into<String>) -> Self {
        Self::Reply {
            target_id: target_id.to_string(),
            text: text.into(),
        }
    }

    /// Canned reply for a sentiment; neutral gets none.
    fn canned(target_id: &str, sentiment: Sentiment) -> Self {
        match sentiment {
            Sentiment::Positive => Self::reply(target_id, POSITIVE_REPLY),
            Sentiment::Negative => Self::reply(target_id, NEGATIVE_REPLY),
            Sentiment::Neutral => Self::NoOp,
        }
    }
}

/// Turns events into reply decisions.
pub struct ReplyStrategySelector {
    classifier: Arc<dyn SentimentClassifier>,
    assistant: Arc<dyn AssistantClient>,
    sessions: Arc<SessionStore>,
}

impl ReplyStrategySelector {
    pub fn new(
        classifier: Arc<dyn SentimentClassifier>,
        assistant: Arc<dyn AssistantClient>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            classifier,
            assistant,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Decide the reply for one event.
    ///
    /// In test mode feed text is still classified, but the assistant is never
    /// called and conversation history is left alone.
    pub async fn decide(&self, event: &WebhookEvent, test_mode: bool) -> RelayResult<ReplyDecision> {
        match event {
            WebhookEvent::PageChangeFeed {
                post_id,
                message_text,
            } => {
                let sentiment = self.classifier.classify(message_text).await?;
                tracing::debug!(target_id = %post_id, sentiment = %sentiment, "Feed classified");
                Ok(ReplyDecision::canned(post_id, sentiment))
            }
            WebhookEvent::PageChangeRating {
                comment_id,
                sentiment,
            } => Ok(ReplyDecision::canned(comment_id, *sentiment)),
            WebhookEvent::PageMessage { sender_id, text } => {
                if test_mode {
                    return Ok(ReplyDecision::NoOp);
                }
                self.converse(sender_id, text).await
            }
            WebhookEvent::Unrecognized => Ok(ReplyDecision::NoOp),
        }
    }

    async fn converse(&self, sender_id: &str, text: &str) -> RelayResult<ReplyDecision> {
        let turn = PendingTurn {
            sessions: self.sessions.as_ref(),
            user_id: sender_id,
            history: self.sessions.prepare_for_turn(sender_id, text)?,
            recorded: false,
        };

        // Dropping `turn` on any early exit, including cancellation of this
        // future, rolls the user turn back.
        let reply = self.assistant.generate_reply(&turn.history).await?;
        if reply.is_empty() {
            return Ok(ReplyDecision::NoOp);
        }

        tracing::info!(user_id = %sender_id, message = %text, reply = %reply, "Assistant replied");
        turn.record(&reply);
        Ok(ReplyDecision::reply(sender_id, reply))
    }
}

/// A user turn opened in the session store and not yet answered.
struct PendingTurn<'a> {
    sessions: &'a SessionStore,
    user_id: &'a str,
    history: Vec<ConversationTurn>,
    recorded: bool,
}

impl PendingTurn<'_> {
    fn record(mut self, reply: &str) {
        self.sessions
            .record_assistant_reply(self.user_id, &self.history, reply);
        self.recorded = true;
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if !self.recorded && self.sessions.abandon_turn(self.user_id, &self.history) {
            tracing::debug!(user_id = %self.user_id, "Unanswered user turn rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use crate::traits::RelayError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use std::sync::Mutex;

    struct FixedSentiment {
        sentiment: Sentiment,
        calls: AtomicUsize,
    }

    impl FixedSentiment {
        fn new(sentiment: Sentiment) -> Arc<Self> {
            Arc::new(Self {
                sentiment,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SentimentClassifier for FixedSentiment {
        async fn classify(&self, _text: &str) -> RelayResult<Sentiment> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.sentiment)
        }
    }

    /// Replies with a fixed text (or fails) and remembers every history it saw.
    struct ScriptedAssistant {
        reply: Option<String>,
        seen: Mutex<Vec<Vec<ConversationTurn>>>,
    }

    impl ScriptedAssistant {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AssistantClient for ScriptedAssistant {
        async fn generate_reply(&self, history: &[ConversationTurn]) -> RelayResult<String> {
            self.seen.lock().unwrap().push(history.to_vec());
            self.reply
                .clone()
                .ok_or_else(|| RelayError::Collaborator("assistant unavailable".into()))
        }
    }

    fn selector(
        sentiment: Sentiment,
        assistant: Arc<ScriptedAssistant>,
    ) -> (ReplyStrategySelector, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new());
        let selector =
            ReplyStrategySelector::new(FixedSentiment::new(sentiment), assistant, sessions.clone());
        (selector, sessions)
    }

    fn feed(post_id: &str) -> WebhookEvent {
        WebhookEvent::PageChangeFeed {
            post_id: post_id.into(),
            message_text: "some text".into(),
        }
    }

    fn message(sender: &str, text: &str) -> WebhookEvent {
        WebhookEvent::PageMessage {
            sender_id: sender.into(),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_feed_sentiment_maps_to_canned_reply() {
        let cases = [
            (Sentiment::Positive, ReplyDecision::reply("p1", POSITIVE_REPLY)),
            (Sentiment::Negative, ReplyDecision::reply("p1", NEGATIVE_REPLY)),
            (Sentiment::Neutral, ReplyDecision::NoOp),
        ];

        for (sentiment, expected) in cases {
            let (selector, sessions) = selector(sentiment, ScriptedAssistant::replying("x"));
            let decision = selector.decide(&feed("p1"), false).await.unwrap();
            assert_eq!(decision, expected, "sentiment {sentiment}");
            assert!(sessions.is_empty());
        }
    }

    #[tokio::test]
    async fn test_rating_never_neutral() {
        let (selector, _) = selector(Sentiment::Neutral, ScriptedAssistant::replying("x"));
        let positive = WebhookEvent::PageChangeRating {
            comment_id: "c1".into(),
            sentiment: Sentiment::Positive,
        };
        let negative = WebhookEvent::PageChangeRating {
            comment_id: "c2".into(),
            sentiment: Sentiment::Negative,
        };

        assert_eq!(
            selector.decide(&positive, false).await.unwrap(),
            ReplyDecision::reply("c1", POSITIVE_REPLY)
        );
        assert_eq!(
            selector.decide(&negative, false).await.unwrap(),
            ReplyDecision::reply("c2", NEGATIVE_REPLY)
        );
    }

    #[tokio::test]
    async fn test_message_uses_assistant_output_verbatim() {
        let assistant = ScriptedAssistant::replying("Try the second floor.");
        let (selector, sessions) = selector(Sentiment::Neutral, assistant.clone());

        let decision = selector.decide(&message("s1", "Where?"), false).await.unwrap();

        assert_eq!(decision, ReplyDecision::reply("s1", "Try the second floor."));
        let stored = sessions.get("s1").unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].role(), Role::Assistant);
    }

    #[tokio::test]
    async fn test_test_mode_skips_assistant_but_classifies_feed() {
        let assistant = ScriptedAssistant::replying("hi");
        let classifier = FixedSentiment::new(Sentiment::Positive);
        let sessions = Arc::new(SessionStore::new());
        let selector =
            ReplyStrategySelector::new(classifier.clone(), assistant.clone(), sessions.clone());

        let msg = selector.decide(&message("s1", "hello"), true).await.unwrap();
        let fed = selector.decide(&feed("p1"), true).await.unwrap();

        assert_eq!(msg, ReplyDecision::NoOp);
        assert_eq!(fed, ReplyDecision::reply("p1", POSITIVE_REPLY));
        assert_eq!(assistant.calls(), 0);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_assistant_failure_rolls_back_turn() {
        let (selector, sessions) = selector(Sentiment::Neutral, ScriptedAssistant::failing());

        let err = selector.decide(&message("s1", "hello"), false).await.unwrap_err();

        assert!(matches!(err, RelayError::Collaborator(_)));
        assert!(sessions.get("s1").is_none());
    }

    #[tokio::test]
    async fn test_empty_reply_is_noop() {
        let (selector, sessions) = selector(Sentiment::Neutral, ScriptedAssistant::replying(""));

        let decision = selector.decide(&message("s1", "hello"), false).await.unwrap();

        assert_eq!(decision, ReplyDecision::NoOp);
        assert!(sessions.get("s1").is_none());
    }

    /// Never answers its first call; answers every later one.
    struct StallsOnce {
        stalled: AtomicBool,
    }

    #[async_trait]
    impl AssistantClient for StallsOnce {
        async fn generate_reply(&self, _history: &[ConversationTurn]) -> RelayResult<String> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Ok("back online".into())
        }
    }

    #[tokio::test]
    async fn test_cancelled_turn_is_rolled_back() {
        let sessions = Arc::new(SessionStore::new());
        let selector = ReplyStrategySelector::new(
            FixedSentiment::new(Sentiment::Neutral),
            Arc::new(StallsOnce {
                stalled: AtomicBool::new(false),
            }),
            sessions.clone(),
        );

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            selector.decide(&message("s1", "hi"), false),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(sessions.get("s1").is_none());

        let decision = selector.decide(&message("s1", "hi again"), false).await.unwrap();
        assert_eq!(decision, ReplyDecision::reply("s1", "back online"));
        assert_eq!(sessions.get("s1").map(|h| h.len()), Some(3));
    }

    #[tokio::test]
    async fn test_pending_turn_surfaces_sequence_error() {
        let assistant = ScriptedAssistant::replying("hi");
        let (selector, sessions) = selector(Sentiment::Neutral, assistant.clone());
        sessions.prepare_for_turn("s1", "still waiting").unwrap();

        let err = selector.decide(&message("s1", "again"), false).await.unwrap_err();

        assert!(matches!(err, RelayError::Sequence { .. }));
        assert_eq!(assistant.calls(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_is_noop() {
        let (selector, _) = selector(Sentiment::Positive, ScriptedAssistant::replying("x"));
        assert_eq!(
            selector.decide(&WebhookEvent::Unrecognized, false).await.unwrap(),
            ReplyDecision::NoOp
        );
    }
}
