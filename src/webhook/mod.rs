//! Provider webhook ingestion: payload decode, dispatch and HTTP routes.

pub mod dispatch;
pub mod payload;
pub mod routes;

pub use dispatch::{DispatchOutcome, WebhookDispatcher};
pub use payload::{MessageEvent, MessageType, StatusEvent, WebhookEvent};
pub use routes::{WebhookState, webhook_routes};
