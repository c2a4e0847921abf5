//! Outbound messaging: the provider send API behind a trait.

pub mod whatsapp;

use async_trait::async_trait;

use crate::error::ChannelError;

pub use whatsapp::WhatsAppClient;

/// Sends messages through the provider on behalf of an API client account.
#[async_trait]
pub trait OutboundMessenger: Send + Sync {
    /// Send a pre-approved template message.
    async fn send_template_message(
        &self,
        recipient: &str,
        api_client_id: &str,
        template_name: &str,
        params: &[String],
        language: &str,
        is_test_mode: bool,
    ) -> Result<(), ChannelError>;

    /// Send a free-text message.
    async fn send_text_message(
        &self,
        recipient: &str,
        api_client_id: &str,
        body: &str,
    ) -> Result<(), ChannelError>;
}
