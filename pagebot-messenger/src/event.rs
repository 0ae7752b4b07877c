//! Typed webhook events parsed from Messenger page deliveries.
//!
//! A delivery looks like:
//!
//! ```text
//! {"object": "page", "entry": [
//!     {"changes":   [{"field": "feed",    "value": {"post_id": .., "message": ..}},
//!                    {"field": "ratings", "value": {"comment_id": .., "recommendation_type": ..}}]},
//!     {"messaging": [{"sender": {"id": ..}, "message": {"text": ..}}]}
//! ]}
//! ```
//!
//! Parsing fails fast with a structural error instead of handing an untyped
//! tree to the reply strategies.

use crate::traits::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The only top-level `object` this relay handles.
pub const PAGE_OBJECT: &str = "page";

/// Outcome of classifying a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    /// Parse a classifier label; unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }

    /// Ratings only distinguish a `POSITIVE` recommendation from everything else.
    pub fn from_recommendation(recommendation_type: Option<&str>) -> Self {
        if recommendation_type == Some("POSITIVE") {
            Self::Positive
        } else {
            Self::Negative
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One actionable item from a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A visitor post or comment on the page feed.
    PageChangeFeed { post_id: String, message_text: String },
    /// A page recommendation; its sentiment is resolved while parsing.
    PageChangeRating {
        comment_id: String,
        sentiment: Sentiment,
    },
    /// A direct message to the page.
    PageMessage { sender_id: String, text: String },
    Unrecognized,
}

impl WebhookEvent {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PageChangeFeed { .. } => "feed",
            Self::PageChangeRating { .. } => "ratings",
            Self::PageMessage { .. } => "message",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Identifier a reply to this event would be sent to.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::PageChangeFeed { post_id, .. } => Some(post_id.as_str()),
            Self::PageChangeRating { comment_id, .. } => Some(comment_id.as_str()),
            Self::PageMessage { sender_id, .. } => Some(sender_id.as_str()),
            Self::Unrecognized => None,
        }
    }
}

/// Parse a decoded delivery into events, in payload order.
pub fn parse_payload(payload: &Value) -> RelayResult<Vec<WebhookEvent>> {
    let object = payload.get("object").and_then(Value::as_str);
    if object != Some(PAGE_OBJECT) {
        return Err(RelayError::UnknownObject {
            object: object.unwrap_or("<missing>").to_string(),
        });
    }

    let entries = payload
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("`entry` must be an array"))?;

    let mut events = Vec::new();
    for entry in entries {
        if let Some(changes) = entry.get("changes") {
            let changes = changes
                .as_array()
                .ok_or_else(|| malformed("`changes` must be an array"))?;
            for change in changes {
                if let Some(event) = parse_change(change)? {
                    events.push(event);
                }
            }
        } else if let Some(messaging) = entry.get("messaging") {
            events.push(parse_messaging(messaging)?);
        }
    }

    Ok(events)
}

/// Feed and ratings changes become events; other fields are ignored.
fn parse_change(change: &Value) -> RelayResult<Option<WebhookEvent>> {
    let field = change
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("change is missing string `field`"))?;
    let value = change
        .get("value")
        .filter(|v| v.is_object())
        .ok_or_else(|| malformed("change is missing object `value`"))?;

    let event = match field {
        "feed" => {
            // Reactions, likes and shares carry no text to classify.
            let Some(message) = value.get("message").and_then(Value::as_str) else {
                tracing::debug!(item = ?value.get("item"), "Ignoring feed change without message");
                return Ok(None);
            };
            WebhookEvent::PageChangeFeed {
                post_id: required_str(value, "post_id")?,
                message_text: message.to_string(),
            }
        }
        "ratings" => WebhookEvent::PageChangeRating {
            comment_id: required_str(value, "comment_id")?,
            sentiment: Sentiment::from_recommendation(
                value.get("recommendation_type").and_then(Value::as_str),
            ),
        },
        other => {
            tracing::debug!(field = %other, "Ignoring page change");
            return Ok(None);
        }
    };

    Ok(Some(event))
}

/// Only the first element of a `messaging` array is handled.
fn parse_messaging(messaging: &Value) -> RelayResult<WebhookEvent> {
    let first = messaging
        .as_array()
        .ok_or_else(|| malformed("`messaging` must be an array"))?
        .first()
        .ok_or_else(|| malformed("`messaging` is empty"))?;

    let sender_id = first
        .pointer("/sender/id")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("message is missing `sender.id`"))?;
    let text = first
        .pointer("/message/text")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("message is missing `message.text`"))?;

    Ok(WebhookEvent::PageMessage {
        sender_id: sender_id.to_string(),
        text: text.to_string(),
    })
}

fn required_str(value: &Value, key: &str) -> RelayResult<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(format!("change value is missing `{key}`")))
}

fn malformed(reason: impl Into<String>) -> RelayError {
    RelayError::MalformedPayload(reason.into())
}
