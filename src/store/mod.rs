//! Persistence layer: libSQL-backed storage for outbound message records.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    DeliveryStatus, MessageRecordStore, OutboundMessageRecord, RecordKind, RecordUpdate,
};
