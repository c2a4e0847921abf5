//! Error types for delivery-hook.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Outbound messaging errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Errors raised while classifying or reconciling a webhook callback.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Payload matched neither the status nor the message shape.
    #[error("Malformed webhook payload: {reason}")]
    Malformed { reason: String },

    /// A provider message id resolved to more than one outbound record.
    #[error("Provider message id {message_id} matches {matches} outbound records")]
    InvariantViolation { message_id: String, matches: usize },

    /// The provider sent a status value with no entry in the transition table.
    #[error("Unhandled provider status '{status}' for message {message_id}")]
    UnhandledStatus { message_id: String, status: String },

    #[error("Record lookup failed: {0}")]
    Lookup(#[from] DatabaseError),
}

impl WebhookError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
