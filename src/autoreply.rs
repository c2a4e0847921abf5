//! Auto-reply decision: acknowledges inbound text unless it looks automated.
//!
//! Replying to another system's auto-responder starts a reply loop, so the
//! heuristic leans towards silence. A heuristic failure also suppresses.

use std::sync::{Arc, LazyLock};

use regex::RegexSet;
use tracing::{debug, info, warn};

use crate::channels::OutboundMessenger;
use crate::config::{AckConfig, ExecutionMode};
use crate::webhook::payload::{MessageEvent, MessageType};

/// Longest body (in characters) that still gets an acknowledgement.
pub const MAX_REPLY_BODY_CHARS: usize = 256;

/// Characters stripped from inbound text before it is inspected or echoed.
const STRIPPED_CHARS: &[char] = &['/', '\\', '[', ']', '<', '>', '(', ')', '*'];

/// Phrases that mark a message as machine-written. Matched on lower-cased text.
const SUPPRESSION_PATTERNS: &[&str] = &[
    r"auto.reply",
    r"thank",
    r"received your message",
    r"http",
    r"out.of.office",
    r"dear customer",
];

static SUPPRESSION: LazyLock<Result<RegexSet, regex::Error>> =
    LazyLock::new(|| RegexSet::new(SUPPRESSION_PATTERNS.iter().map(|p| format!("(?i){p}"))));

/// Remove the characters in `STRIPPED_CHARS` from `body`.
pub fn sanitize_body(body: &str) -> String {
    body.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect()
}

/// Whether an already-sanitized body deserves an acknowledgement.
pub fn should_auto_reply(body: &str) -> bool {
    if body.is_empty() || body.chars().count() > MAX_REPLY_BODY_CHARS {
        return false;
    }
    match &*SUPPRESSION {
        Ok(set) => !set.is_match(&body.to_lowercase()),
        Err(e) => {
            warn!(error = %e, "Suppression patterns failed to compile; suppressing reply");
            false
        }
    }
}

/// Why no acknowledgement went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NonText,
    Suppressed,
}

/// Result of one auto-reply decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoReplyOutcome {
    Skipped(SkipReason),
    /// One acknowledgement was sent to the sender.
    Sent,
    /// The send was attempted and failed. Not retried.
    SendFailed,
}

/// Decides on, and sends, acknowledgement replies.
pub struct AutoReplyEngine {
    messenger: Arc<dyn OutboundMessenger>,
    mode: ExecutionMode,
    api_client_id: String,
    ack: AckConfig,
}

impl AutoReplyEngine {
    pub fn new(
        messenger: Arc<dyn OutboundMessenger>,
        mode: ExecutionMode,
        api_client_id: impl Into<String>,
        ack: AckConfig,
    ) -> Self {
        Self {
            messenger,
            mode,
            api_client_id: api_client_id.into(),
            ack,
        }
    }

    /// Evaluate one inbound message and send at most one acknowledgement.
    ///
    /// Never fails: send errors are logged and reported as `SendFailed`.
    pub async fn decide(&self, event: &MessageEvent) -> AutoReplyOutcome {
        if event.message_type != MessageType::Text {
            info!(
                message_id = %event.message_id,
                message_type = event.message_type.as_str(),
                "Ignoring non-text inbound message"
            );
            return AutoReplyOutcome::Skipped(SkipReason::NonText);
        }

        let body = sanitize_body(event.text_body.as_deref().unwrap_or_default());
        if !should_auto_reply(&body) {
            debug!(message_id = %event.message_id, "Auto-reply suppressed");
            return AutoReplyOutcome::Skipped(SkipReason::Suppressed);
        }

        let result = if self.mode.is_production() {
            self.messenger
                .send_text_message(&event.sender_id, &self.api_client_id, &self.ack.text)
                .await
        } else {
            self.messenger
                .send_template_message(
                    &event.sender_id,
                    &self.api_client_id,
                    &self.ack.template_name,
                    &[],
                    &self.ack.language,
                    true,
                )
                .await
        };

        match result {
            Ok(()) => {
                info!(
                    message_id = %event.message_id,
                    sender = %event.sender_id,
                    production = self.mode.is_production(),
                    "Acknowledgement sent"
                );
                AutoReplyOutcome::Sent
            }
            Err(e) => {
                warn!(
                    message_id = %event.message_id,
                    sender = %event.sender_id,
                    error = %e,
                    "Acknowledgement send failed"
                );
                AutoReplyOutcome::SendFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ChannelError;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Template {
            recipient: String,
            api_client_id: String,
            template_name: String,
            params: Vec<String>,
            language: String,
            is_test_mode: bool,
        },
        Text {
            recipient: String,
            api_client_id: String,
            body: String,
        },
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<Sent>>,
        fail: bool,
    }

    impl RecordingMessenger {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OutboundMessenger for RecordingMessenger {
        async fn send_template_message(
            &self,
            recipient: &str,
            api_client_id: &str,
            template_name: &str,
            params: &[String],
            language: &str,
            is_test_mode: bool,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(Sent::Template {
                recipient: recipient.into(),
                api_client_id: api_client_id.into(),
                template_name: template_name.into(),
                params: params.to_vec(),
                language: language.into(),
                is_test_mode,
            });
            if self.fail {
                return Err(ChannelError::SendFailed {
                    name: "test".into(),
                    reason: "boom".into(),
                });
            }
            Ok(())
        }

        async fn send_text_message(
            &self,
            recipient: &str,
            api_client_id: &str,
            body: &str,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(Sent::Text {
                recipient: recipient.into(),
                api_client_id: api_client_id.into(),
                body: body.into(),
            });
            Ok(())
        }
    }

    fn text_event(body: &str) -> MessageEvent {
        MessageEvent {
            sender_id: "15550001".into(),
            message_id: "wamid.in1".into(),
            message_type: MessageType::Text,
            text_body: Some(body.into()),
        }
    }

    fn engine(messenger: Arc<RecordingMessenger>, mode: ExecutionMode) -> AutoReplyEngine {
        AutoReplyEngine::new(messenger, mode, "10987", AckConfig::default())
    }

    // ── Heuristic ───────────────────────────────────────────────────

    #[test]
    fn sanitize_strips_every_listed_char() {
        assert_eq!(sanitize_body(r"a/b\c[d]e<f>g(h)i*j"), "abcdefghij");
        assert_eq!(sanitize_body("plain text"), "plain text");
        assert_eq!(sanitize_body("/\\[]<>()*"), "");
    }

    #[test]
    fn qualifying_body_gets_reply() {
        let body = "When will I receive my results?";
        assert_eq!(body.chars().count(), 31);
        assert!(should_auto_reply(body));
        assert!(should_auto_reply("Can I change my appointment?"));
    }

    #[test]
    fn empty_and_oversized_bodies_suppressed() {
        assert!(!should_auto_reply(""));
        assert!(should_auto_reply(&"a".repeat(MAX_REPLY_BODY_CHARS)));
        assert!(!should_auto_reply(&"a".repeat(MAX_REPLY_BODY_CHARS + 1)));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let body = "é".repeat(MAX_REPLY_BODY_CHARS);
        assert!(body.len() > MAX_REPLY_BODY_CHARS);
        assert!(should_auto_reply(&body));
    }

    #[test]
    fn automated_phrases_suppressed() {
        for body in [
            "Thank you for your message",
            "THANKS!",
            "Out-of-office until Monday",
            "I am out of office",
            "This is an auto-reply",
            "Auto_Reply: away",
            "We have received your message",
            "see http://example.com",
            "Dear Customer, your order shipped",
        ] {
            assert!(!should_auto_reply(body), "expected suppression for {body:?}");
        }
    }

    #[test]
    fn sanitized_link_still_suppressed() {
        let body = sanitize_body("visit https://example.com/path");
        assert_eq!(body, "visit https:example.compath");
        assert!(!should_auto_reply(&body));
    }

    // ── Engine ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn non_production_sends_template_once() {
        let messenger = Arc::new(RecordingMessenger::default());
        let engine = engine(messenger.clone(), ExecutionMode::NonProduction);

        let outcome = engine
            .decide(&text_event("When will I receive my results?"))
            .await;
        assert_eq!(outcome, AutoReplyOutcome::Sent);
        assert_eq!(
            messenger.sent(),
            vec![Sent::Template {
                recipient: "15550001".into(),
                api_client_id: "10987".into(),
                template_name: "hello_world".into(),
                params: vec![],
                language: "en_US".into(),
                is_test_mode: true,
            }]
        );
    }

    #[tokio::test]
    async fn production_sends_fixed_text_once() {
        let messenger = Arc::new(RecordingMessenger::default());
        let engine = engine(messenger.clone(), ExecutionMode::Production);

        let outcome = engine.decide(&text_event("Is the clinic open today?")).await;
        assert_eq!(outcome, AutoReplyOutcome::Sent);
        assert_eq!(
            messenger.sent(),
            vec![Sent::Text {
                recipient: "15550001".into(),
                api_client_id: "10987".into(),
                body: crate::config::DEFAULT_ACK_TEXT.into(),
            }]
        );
    }

    #[test]
    fn own_acknowledgement_would_not_be_answered() {
        assert!(!should_auto_reply(&sanitize_body(crate::config::DEFAULT_ACK_TEXT)));
    }

    #[tokio::test]
    async fn suppressed_body_sends_nothing() {
        let messenger = Arc::new(RecordingMessenger::default());
        let engine = engine(messenger.clone(), ExecutionMode::Production);

        let outcome = engine.decide(&text_event("Thank you for your message")).await;
        assert_eq!(outcome, AutoReplyOutcome::Skipped(SkipReason::Suppressed));
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn body_of_only_stripped_chars_is_empty() {
        let messenger = Arc::new(RecordingMessenger::default());
        let engine = engine(messenger.clone(), ExecutionMode::Production);

        let outcome = engine.decide(&text_event("(*)")).await;
        assert_eq!(outcome, AutoReplyOutcome::Skipped(SkipReason::Suppressed));
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn non_text_message_ignored() {
        let messenger = Arc::new(RecordingMessenger::default());
        let engine = engine(messenger.clone(), ExecutionMode::Production);

        let event = MessageEvent {
            message_type: MessageType::Other("image".into()),
            text_body: None,
            ..text_event("")
        };
        let outcome = engine.decide(&event).await;
        assert_eq!(outcome, AutoReplyOutcome::Skipped(SkipReason::NonText));
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_contained() {
        let messenger = Arc::new(RecordingMessenger {
            fail: true,
            ..Default::default()
        });
        let engine = engine(messenger.clone(), ExecutionMode::NonProduction);

        let outcome = engine.decide(&text_event("Where do I park?")).await;
        assert_eq!(outcome, AutoReplyOutcome::SendFailed);
        assert_eq!(messenger.sent().len(), 1);
    }
}
