//! libSQL backend: async `MessageRecordStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{
    DeliveryStatus, MessageRecordStore, OutboundMessageRecord, RecordKind, RecordUpdate,
};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    /// Keeps the database handle alive for the lifetime of `conn`.
    _db: LibSqlDatabase,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self { _db: db, conn };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self { _db: db, conn };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Load a record by its internal id.
    pub async fn get_record(
        &self,
        id: &str,
    ) -> Result<Option<OutboundMessageRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM outbound_messages WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_record: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_record: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

const RECORD_COLUMNS: &str = "id, kind, service_provider_message_id, recipient, status, sent_at, delivered_at, read_at, deleted_at, errored_at, error_code, error_description, created_at, updated_at";

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn opt_timestamp(ts: Option<DateTime<Utc>>) -> libsql::Value {
    opt_text_owned(ts.map(|t| t.to_rfc3339()))
}

/// Map a libsql Row to an OutboundMessageRecord. Column order matches RECORD_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<OutboundMessageRecord, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));

    let kind: String = row.get(1).map_err(parse)?;
    let status: String = row.get(4).map_err(parse)?;
    let created_str: String = row.get(12).map_err(parse)?;
    let updated_str: String = row.get(13).map_err(parse)?;

    Ok(OutboundMessageRecord {
        id: row.get(0).map_err(parse)?,
        kind: kind.parse()?,
        service_provider_message_id: row.get(2).map_err(parse)?,
        recipient: row.get(3).map_err(parse)?,
        status: status.parse()?,
        sent_at: parse_optional_datetime(&row.get(5).ok()),
        delivered_at: parse_optional_datetime(&row.get(6).ok()),
        read_at: parse_optional_datetime(&row.get(7).ok()),
        deleted_at: parse_optional_datetime(&row.get(8).ok()),
        errored_at: parse_optional_datetime(&row.get(9).ok()),
        error_code: row.get(10).ok(),
        error_description: row.get(11).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── MessageRecordStore impl ─────────────────────────────────────────

#[async_trait]
impl MessageRecordStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn insert_record(
        &self,
        kind: RecordKind,
        service_provider_message_id: &str,
        recipient: &str,
    ) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO outbound_messages (id, kind, service_provider_message_id, recipient,
                    status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.clone(),
                    kind.as_str(),
                    service_provider_message_id,
                    recipient,
                    DeliveryStatus::Queued.as_str(),
                    now,
                ],
            )
            .await
            .map_err(|e| {
                if e.to_string().contains("UNIQUE") {
                    DatabaseError::Constraint(format!(
                        "provider message id {service_provider_message_id} already tracked"
                    ))
                } else {
                    DatabaseError::Query(format!("insert_record: {e}"))
                }
            })?;

        debug!(
            id = %id,
            kind = %kind,
            provider_id = service_provider_message_id,
            "Outbound record inserted"
        );
        Ok(id)
    }

    async fn find_by_provider_message_id(
        &self,
        service_provider_message_id: &str,
    ) -> Result<Vec<OutboundMessageRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM outbound_messages WHERE service_provider_message_id = ?1"
                ),
                params![service_provider_message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_by_provider_message_id: {e}")))?;

        let mut records = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => records.push(row_to_record(&row)?),
                Ok(None) => break,
                Err(e) => {
                    return Err(DatabaseError::Query(format!(
                        "find_by_provider_message_id: {e}"
                    )));
                }
            }
        }
        Ok(records)
    }

    async fn apply_update(
        &self,
        kind: RecordKind,
        service_provider_message_id: &str,
        update: &RecordUpdate,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE outbound_messages SET
                    status = ?1,
                    sent_at = COALESCE(?2, sent_at),
                    delivered_at = COALESCE(?3, delivered_at),
                    read_at = COALESCE(?4, read_at),
                    deleted_at = COALESCE(?5, deleted_at),
                    errored_at = COALESCE(?6, errored_at),
                    error_code = COALESCE(?7, error_code),
                    error_description = COALESCE(?8, error_description),
                    updated_at = ?9
                 WHERE service_provider_message_id = ?10 AND kind = ?11",
                params![
                    update.status.as_str(),
                    opt_timestamp(update.sent_at),
                    opt_timestamp(update.delivered_at),
                    opt_timestamp(update.read_at),
                    opt_timestamp(update.deleted_at),
                    opt_timestamp(update.errored_at),
                    opt_text_owned(update.error_code.clone()),
                    opt_text_owned(update.error_description.clone()),
                    now,
                    service_provider_message_id,
                    kind.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_update: {e}")))?;

        if changed == 0 {
            warn!(
                provider_id = service_provider_message_id,
                kind = %kind,
                "Update matched no outbound record"
            );
        } else {
            debug!(
                provider_id = service_provider_message_id,
                status = %update.status,
                "Outbound record updated"
            );
        }
        Ok(())
    }
}
