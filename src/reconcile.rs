//! Status reconciliation: applies provider delivery statuses to outbound records.
//!
//! Flow:
//! 1. One lookup of the provider message id against the record store
//! 2. No match → untracked message, nothing to do
//! 3. More than one match → data corruption, surfaced as an error
//! 4. Provider status → field update via `TRANSITIONS`; unknown statuses fail closed
//! 5. The update is spawned and not awaited by the caller

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::WebhookError;
use crate::store::{DeliveryStatus, MessageRecordStore, RecordKind, RecordUpdate};
use crate::webhook::payload::StatusEvent;

/// Which timestamp column a transition stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    SentAt,
    DeliveredAt,
    ReadAt,
    DeletedAt,
    ErroredAt,
}

/// What a provider status does to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Informational status with no bearing on delivery.
    Ignore,
    /// Set the status and stamp one timestamp column.
    Apply { status: DeliveryStatus, stamp: Stamp },
}

/// Provider status vocabulary. A status missing here is rejected.
pub static TRANSITIONS: &[(&str, Transition)] = &[
    (
        "sent",
        Transition::Apply {
            status: DeliveryStatus::Sent,
            stamp: Stamp::SentAt,
        },
    ),
    (
        "delivered",
        Transition::Apply {
            status: DeliveryStatus::Delivered,
            stamp: Stamp::DeliveredAt,
        },
    ),
    (
        "read",
        Transition::Apply {
            status: DeliveryStatus::Read,
            stamp: Stamp::ReadAt,
        },
    ),
    (
        "deleted",
        Transition::Apply {
            status: DeliveryStatus::Deleted,
            stamp: Stamp::DeletedAt,
        },
    ),
    (
        "failed",
        Transition::Apply {
            status: DeliveryStatus::Failed,
            stamp: Stamp::ErroredAt,
        },
    ),
    ("warning", Transition::Ignore),
];

/// Look up the transition for a raw provider status.
pub fn transition_for(status: &str) -> Option<Transition> {
    TRANSITIONS
        .iter()
        .find(|(name, _)| *name == status)
        .map(|(_, transition)| *transition)
}

/// Build the field update for a status event.
///
/// Returns `Ok(None)` for informational statuses. Failures carry the first
/// provider error's code and description when present.
pub fn build_update(
    event: &StatusEvent,
    now: DateTime<Utc>,
) -> Result<Option<RecordUpdate>, WebhookError> {
    let transition =
        transition_for(&event.status).ok_or_else(|| WebhookError::UnhandledStatus {
            message_id: event.message_id.clone(),
            status: event.status.clone(),
        })?;

    let (status, stamp) = match transition {
        Transition::Ignore => return Ok(None),
        Transition::Apply { status, stamp } => (status, stamp),
    };

    let mut update = RecordUpdate::status(status);
    match stamp {
        Stamp::SentAt => update.sent_at = Some(now),
        Stamp::DeliveredAt => update.delivered_at = Some(now),
        Stamp::ReadAt => update.read_at = Some(now),
        Stamp::DeletedAt => update.deleted_at = Some(now),
        Stamp::ErroredAt => update.errored_at = Some(now),
    }

    if status == DeliveryStatus::Failed {
        match event.first_error() {
            Some(err) => {
                update.error_code = err.code_string();
                update.error_description = err.description();
            }
            None => warn!(
                message_id = %event.message_id,
                "Failed status arrived without error details"
            ),
        }
    }

    Ok(Some(update))
}

/// Result of reconciling one status event.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// No record carries this provider id; the message was not sent by us.
    Untracked,
    /// Status carries no delivery information; record left as is.
    Informational,
    /// An update was dispatched to the store.
    Dispatched {
        kind: RecordKind,
        update: RecordUpdate,
        /// Background write; callers may await it but are not required to.
        task: JoinHandle<()>,
    },
}

/// Applies provider status events to the record store.
pub struct StatusReconciler {
    store: Arc<dyn MessageRecordStore>,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn MessageRecordStore>) -> Self {
        Self { store }
    }

    /// Reconcile one status event against the store.
    pub async fn reconcile(&self, event: &StatusEvent) -> Result<ReconcileOutcome, WebhookError> {
        let matches = self
            .store
            .find_by_provider_message_id(&event.message_id)
            .await?;

        let record = match matches.as_slice() {
            [] => {
                info!(
                    message_id = %event.message_id,
                    status = %event.status,
                    "Status for untracked message"
                );
                return Ok(ReconcileOutcome::Untracked);
            }
            [record] => record,
            _ => {
                error!(
                    message_id = %event.message_id,
                    matches = matches.len(),
                    "Provider message id resolves to multiple outbound records"
                );
                return Err(WebhookError::InvariantViolation {
                    message_id: event.message_id.clone(),
                    matches: matches.len(),
                });
            }
        };

        let Some(update) = build_update(event, Utc::now())? else {
            info!(
                message_id = %event.message_id,
                status = %event.status,
                "Informational status, record unchanged"
            );
            return Ok(ReconcileOutcome::Informational);
        };

        let kind = record.kind;
        let store = Arc::clone(&self.store);
        let provider_id = event.message_id.clone();
        let pending = update.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = store.apply_update(kind, &provider_id, &pending).await {
                error!(
                    message_id = %provider_id,
                    kind = %kind,
                    error = %e,
                    "Failed to persist status update"
                );
            }
        });

        debug!(
            message_id = %event.message_id,
            kind = %kind,
            status = %update.status,
            "Status update dispatched"
        );
        Ok(ReconcileOutcome::Dispatched { kind, update, task })
    }
}
