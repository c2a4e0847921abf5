//! Webhook dispatcher: classifies a payload and routes it to its engine.

use serde_json::Value;
use tracing::{info, warn};

use crate::autoreply::{AutoReplyEngine, AutoReplyOutcome};
use crate::error::WebhookError;
use crate::reconcile::{ReconcileOutcome, StatusReconciler};
use crate::webhook::payload::WebhookEvent;

/// What happened to one webhook call.
#[derive(Debug)]
pub enum DispatchOutcome {
    Status(ReconcileOutcome),
    Message(AutoReplyOutcome),
}

/// Routes classified webhook events to reconciliation or auto-reply.
pub struct WebhookDispatcher {
    reconciler: StatusReconciler,
    auto_reply: AutoReplyEngine,
}

impl WebhookDispatcher {
    pub fn new(reconciler: StatusReconciler, auto_reply: AutoReplyEngine) -> Self {
        Self {
            reconciler,
            auto_reply,
        }
    }

    /// Handle one raw webhook payload.
    ///
    /// Classification and reconciliation errors are returned; auto-reply
    /// problems never are.
    pub async fn dispatch(&self, payload: &Value) -> Result<DispatchOutcome, WebhookError> {
        info!("Webhook received");

        let event = WebhookEvent::decode(payload).inspect_err(|e| {
            warn!(error = %e, payload = %payload, "Unrecognised webhook payload");
        })?;

        match event {
            WebhookEvent::Status(status) => {
                info!(message_id = %status.message_id, status = %status.status, "Status webhook");
                let outcome = self.reconciler.reconcile(&status).await?;
                Ok(DispatchOutcome::Status(outcome))
            }
            WebhookEvent::Message(message) => {
                info!(
                    message_id = %message.message_id,
                    sender = %message.sender_id,
                    "Message webhook"
                );
                let outcome = self.auto_reply.decide(&message).await;
                Ok(DispatchOutcome::Message(outcome))
            }
        }
    }
}
