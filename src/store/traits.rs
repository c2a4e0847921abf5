//! `MessageRecordStore` trait: single async interface over outbound message records.
//!
//! Ordinary and transactional messages share one keyspace; the `RecordKind`
//! tag tells them apart. A provider message id resolves to at most one record.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;

/// Which family of outbound message a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Conversational messages sent by operators.
    Ordinary,
    /// System-triggered transactional notifications.
    Transactional,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ordinary => "ordinary",
            Self::Transactional => "transactional",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordinary" => Ok(Self::Ordinary),
            "transactional" => Ok(Self::Transactional),
            other => Err(DatabaseError::Query(format!("unknown record kind '{other}'"))),
        }
    }
}

/// Local delivery status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Set by the send path before the provider reports anything.
    Queued,
    Sent,
    Delivered,
    Read,
    Deleted,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Sent => "SENT",
            Self::Delivered => "DELIVERED",
            Self::Read => "READ",
            Self::Deleted => "DELETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(Self::Queued),
            "SENT" => Ok(Self::Sent),
            "DELIVERED" => Ok(Self::Delivered),
            "READ" => Ok(Self::Read),
            "DELETED" => Ok(Self::Deleted),
            "FAILED" => Ok(Self::Failed),
            other => Err(DatabaseError::Query(format!("unknown delivery status '{other}'"))),
        }
    }
}

/// A previously sent message tracked by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessageRecord {
    pub id: String,
    pub kind: RecordKind,
    pub service_provider_message_id: String,
    pub recipient: String,
    pub status: DeliveryStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub errored_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field-level update for one record. `None` leaves the stored value untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub status: DeliveryStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub errored_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

impl RecordUpdate {
    /// An update that only sets the status.
    pub fn status(status: DeliveryStatus) -> Self {
        Self {
            status,
            sent_at: None,
            delivered_at: None,
            read_at: None,
            deleted_at: None,
            errored_at: None,
            error_code: None,
            error_description: None,
        }
    }
}

/// Backend-agnostic store for outbound message records.
#[async_trait]
pub trait MessageRecordStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Insert a record for a message that has just been handed to the provider.
    /// Returns the generated record id.
    async fn insert_record(
        &self,
        kind: RecordKind,
        service_provider_message_id: &str,
        recipient: &str,
    ) -> Result<String, DatabaseError>;

    /// All records whose provider message id matches. More than one is corruption.
    async fn find_by_provider_message_id(
        &self,
        service_provider_message_id: &str,
    ) -> Result<Vec<OutboundMessageRecord>, DatabaseError>;

    /// Apply a field-level update to the record of `kind` with this provider message id.
    async fn apply_update(
        &self,
        kind: RecordKind,
        service_provider_message_id: &str,
        update: &RecordUpdate,
    ) -> Result<(), DatabaseError>;
}
