//! Relay error taxonomy and the collaborator seams the core calls out through.

use crate::event::Sentiment;
use crate::session::ConversationTurn;
use async_trait::async_trait;

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Relay error type.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The payload's top-level `object` is absent or not `"page"`.
    #[error("Unknown object type in payload: {object}")]
    UnknownObject { object: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// An assistant turn is already pending for this user.
    #[error("Conversation for {user_id} is awaiting an assistant reply")]
    Sequence { user_id: String },

    /// Sentiment, assistant, or send API failure.
    #[error("Collaborator call failed: {0}")]
    Collaborator(String),
}

impl RelayError {
    /// Whether the sender of the payload is at fault.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownObject { .. } | Self::MalformedPayload(_))
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

/// Sentiment prediction service.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> RelayResult<Sentiment>;
}

/// Conversational assistant given the full ordered history as context.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn generate_reply(&self, history: &[ConversationTurn]) -> RelayResult<String>;
}

/// Chat platform send API.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send_message(&self, target_id: &str, text: &str) -> RelayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        let unknown = RelayError::UnknownObject {
            object: "group".into(),
        };
        assert!(unknown.is_client_error());
        assert_eq!(unknown.status_code(), 400);
        assert_eq!(
            RelayError::MalformedPayload("entry".into()).status_code(),
            400
        );
    }

    #[test]
    fn test_transient_errors_are_not_client_errors() {
        let seq = RelayError::Sequence {
            user_id: "u1".into(),
        };
        assert!(!seq.is_client_error());
        assert_eq!(seq.status_code(), 500);
        assert!(!RelayError::Collaborator("timeout".into()).is_client_error());
    }
}
