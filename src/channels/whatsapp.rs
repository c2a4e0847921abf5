//! WhatsApp Cloud API client: sends acknowledgement replies.
//!
//! Posts to `{api_base}/{phone_number_id}/messages` with a bearer token.
//! The phone number id doubles as the API client id of the sending account.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::OutboundMessenger;
use crate::config::ProviderConfig;
use crate::error::ChannelError;

/// Opaque callback tag attached to test-mode sends; the provider echoes it
/// back on the matching status webhooks.
const TEST_MODE_CALLBACK_TAG: &str = "test-mode";

/// HTTP client for the provider's send-message endpoint.
pub struct WhatsAppClient {
    api_base: String,
    access_token: SecretString,
    client: reqwest::Client,
}

impl WhatsAppClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    fn messages_url(&self, api_client_id: &str) -> String {
        format!("{}/{api_client_id}/messages", self.api_base)
    }

    async fn post_message(&self, api_client_id: &str, body: &Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.messages_url(api_client_id))
            .bearer_auth(self.access_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: format!("messages endpoint returned {status}: {err}"),
            });
        }

        Ok(())
    }
}

/// Request body for a template send.
fn template_body(
    recipient: &str,
    template_name: &str,
    params: &[String],
    language: &str,
    is_test_mode: bool,
) -> Value {
    let mut template = json!({
        "name": template_name,
        "language": { "code": language },
    });
    if !params.is_empty() {
        let parameters: Vec<Value> = params
            .iter()
            .map(|p| json!({ "type": "text", "text": p }))
            .collect();
        template["components"] = json!([{ "type": "body", "parameters": parameters }]);
    }

    let mut body = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": recipient,
        "type": "template",
        "template": template,
    });
    if is_test_mode {
        body["biz_opaque_callback_data"] = json!(TEST_MODE_CALLBACK_TAG);
    }
    body
}

/// Request body for a free-text send.
fn text_body(recipient: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": recipient,
        "type": "text",
        "text": { "preview_url": false, "body": body },
    })
}

#[async_trait]
impl OutboundMessenger for WhatsAppClient {
    async fn send_template_message(
        &self,
        recipient: &str,
        api_client_id: &str,
        template_name: &str,
        params: &[String],
        language: &str,
        is_test_mode: bool,
    ) -> Result<(), ChannelError> {
        let body = template_body(recipient, template_name, params, language, is_test_mode);
        self.post_message(api_client_id, &body).await?;
        tracing::info!(
            recipient,
            template = template_name,
            test_mode = is_test_mode,
            "Template message sent"
        );
        Ok(())
    }

    async fn send_text_message(
        &self,
        recipient: &str,
        api_client_id: &str,
        body: &str,
    ) -> Result<(), ChannelError> {
        self.post_message(api_client_id, &text_body(recipient, body))
            .await?;
        tracing::info!(recipient, "Text message sent");
        Ok(())
    }
}
