//! Boundary decode of provider webhook payloads.
//!
//! The provider posts either a batch of delivery statuses or a batch of
//! inbound messages with their contacts. Both arrive untyped; `WebhookEvent::decode`
//! turns them into one of two variants or a `Malformed` error. Only the first
//! element of each batch is decoded; later elements are ignored.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::WebhookError;

// ── Status events ───────────────────────────────────────────────────

/// One delivery-status notification for a message we sent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusEvent {
    /// Provider-assigned message id.
    #[serde(rename = "id")]
    pub message_id: String,
    /// Raw provider status. Mapped to the local vocabulary during reconciliation.
    pub status: String,
    #[serde(default)]
    pub errors: Option<Vec<ProviderError>>,
}

impl StatusEvent {
    /// The first reported error, if the provider sent any.
    pub fn first_error(&self) -> Option<&ProviderError> {
        self.errors.as_deref().and_then(<[ProviderError]>::first)
    }
}

/// Error detail attached to a `failed` status.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderError {
    /// Numeric on the wire, but tolerated as a string.
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub error_data: Option<ErrorData>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub details: Option<String>,
}

impl ProviderError {
    /// Error code as text, whatever JSON type it arrived as.
    pub fn code_string(&self) -> Option<String> {
        match self.code.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// `details` from the top level, falling back to `error_data.details`.
    pub fn details(&self) -> Option<&str> {
        self.details
            .as_deref()
            .or_else(|| self.error_data.as_ref()?.details.as_deref())
    }

    /// Human-readable description built from title, details and href.
    ///
    /// Format is `"{title}: {details} ({href})"`; absent parts are dropped.
    pub fn description(&self) -> Option<String> {
        let head = match (self.title.as_deref(), self.details()) {
            (Some(title), Some(details)) => Some(format!("{title}: {details}")),
            (Some(title), None) => Some(title.to_string()),
            (None, Some(details)) => Some(details.to_string()),
            (None, None) => None,
        };
        match (head, self.href.as_deref()) {
            (Some(head), Some(href)) => Some(format!("{head} ({href})")),
            (Some(head), None) => Some(head),
            (None, Some(href)) => Some(href.to_string()),
            (None, None) => None,
        }
    }
}

// ── Message events ──────────────────────────────────────────────────

/// Inbound message type. Only text is acted on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum MessageType {
    Text,
    Other(String),
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        if value == "text" {
            Self::Text
        } else {
            Self::Other(value)
        }
    }
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Other(other) => other,
        }
    }
}

/// One inbound message paired with its sender.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Provider contact id of the sender (`contacts[0].wa_id`).
    pub sender_id: String,
    pub message_id: String,
    pub message_type: MessageType,
    /// Present when the message is text.
    pub text_body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    #[serde(rename = "type")]
    message_type: MessageType,
    #[serde(default)]
    text: Option<RawText>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct RawContact {
    wa_id: String,
}

// ── Decode ──────────────────────────────────────────────────────────

/// Top-level batches, kept untyped so only their first elements are decoded.
#[derive(Debug, Deserialize)]
struct RawWebhook {
    #[serde(default)]
    statuses: Option<Vec<Value>>,
    #[serde(default)]
    messages: Option<Vec<Value>>,
    #[serde(default)]
    contacts: Option<Vec<Value>>,
}

/// Decode the first element of a batch; the rest is never inspected.
fn first_of<T: DeserializeOwned>(batch: Vec<Value>, name: &str) -> Result<T, WebhookError> {
    let first = batch
        .into_iter()
        .next()
        .ok_or_else(|| WebhookError::malformed(format!("{name} array is empty")))?;
    serde_json::from_value(first)
        .map_err(|e| WebhookError::malformed(format!("{name}[0] is not recognised: {e}")))
}

/// A classified webhook callback.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Status(StatusEvent),
    Message(MessageEvent),
}

impl WebhookEvent {
    /// Classify a raw payload.
    ///
    /// Accepts the bare `value` object or the provider's full
    /// `{entry: [{changes: [{value}]}]}` envelope, in which case the first
    /// change value is classified. A `statuses` key always selects the status
    /// branch, even when its first element fails to decode.
    pub fn decode(payload: &Value) -> Result<Self, WebhookError> {
        if !payload.is_object() {
            return Err(WebhookError::malformed("payload is not a JSON object"));
        }

        let body = match payload.get("entry") {
            Some(entry) => entry
                .pointer("/0/changes/0/value")
                .filter(|v| v.is_object())
                .ok_or_else(|| {
                    WebhookError::malformed("envelope has no entry[0].changes[0].value object")
                })?,
            None => payload,
        };

        let raw = RawWebhook::deserialize(body)
            .map_err(|e| WebhookError::malformed(format!("batch fields must be arrays: {e}")))?;

        match raw {
            RawWebhook {
                statuses: Some(statuses),
                ..
            } => Ok(WebhookEvent::Status(first_of(statuses, "statuses")?)),
            RawWebhook {
                statuses: None,
                messages: Some(messages),
                contacts: Some(contacts),
            } => {
                let message: RawMessage = first_of(messages, "messages")?;
                let contact: RawContact = first_of(contacts, "contacts")?;
                Ok(WebhookEvent::Message(MessageEvent {
                    sender_id: contact.wa_id,
                    message_id: message.id,
                    message_type: message.message_type,
                    text_body: message.text.map(|t| t.body),
                }))
            }
            _ => Err(WebhookError::malformed(
                "expected a statuses array or messages and contacts arrays",
            )),
        }
    }
}
