//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default acknowledgement body sent in production.
pub const DEFAULT_ACK_TEXT: &str =
    "Thank you for your message! We have received it and will get back to you shortly.";

/// Whether outbound acknowledgements go out as real free text or as a test template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Production,
    NonProduction,
}

impl ExecutionMode {
    /// `production` (case-insensitive) selects production; anything else does not.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::NonProduction
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Acknowledgement reply settings.
#[derive(Debug, Clone)]
pub struct AckConfig {
    /// Template sent outside production.
    pub template_name: String,
    /// Template language code.
    pub language: String,
    /// Free-text body sent in production.
    pub text: String,
}

impl Default for AckConfig {
    fn default() -> Self {
        Self {
            template_name: "hello_world".to_string(),
            language: "en_US".to_string(),
            text: DEFAULT_ACK_TEXT.to_string(),
        }
    }
}

/// Provider send-API settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider's Graph-style API.
    pub api_base: String,
    /// Bearer token used for outbound sends.
    pub access_token: SecretString,
    /// Sending account (phone number id) on whose behalf replies go out.
    pub api_client_id: String,
    /// Transport-level timeout for outbound requests.
    pub timeout: Duration,
}

/// Service configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct HookConfig {
    pub port: u16,
    pub db_path: String,
    /// Shared secret every webhook call must present.
    pub auth_token: SecretString,
    /// Token expected during the provider's subscription handshake.
    pub verify_token: Option<SecretString>,
    pub mode: ExecutionMode,
    pub ack: AckConfig,
    pub provider: ProviderConfig,
}

impl HookConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("DELIVERY_HOOK_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DELIVERY_HOOK_PORT".into(),
                message: format!("'{raw}' is not a valid port"),
            })?,
            None => 8080,
        };

        let db_path = lookup("DELIVERY_HOOK_DB_PATH")
            .unwrap_or_else(|| "./data/delivery-hook.db".to_string());

        let auth_token = lookup("DELIVERY_HOOK_AUTH_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("DELIVERY_HOOK_AUTH_TOKEN".into()))?;

        let verify_token = lookup("DELIVERY_HOOK_VERIFY_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let mode = lookup("DELIVERY_HOOK_ENV")
            .map(|s| ExecutionMode::parse(&s))
            .unwrap_or(ExecutionMode::NonProduction);

        let defaults = AckConfig::default();
        let ack = AckConfig {
            template_name: lookup("DELIVERY_HOOK_ACK_TEMPLATE").unwrap_or(defaults.template_name),
            language: lookup("DELIVERY_HOOK_ACK_LANGUAGE").unwrap_or(defaults.language),
            text: lookup("DELIVERY_HOOK_ACK_TEXT").unwrap_or(defaults.text),
        };

        let timeout_secs: u64 = lookup("WHATSAPP_HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let provider = ProviderConfig {
            api_base: lookup("WHATSAPP_API_BASE")
                .unwrap_or_else(|| "https://graph.facebook.com/v21.0".to_string()),
            access_token: lookup("WHATSAPP_ACCESS_TOKEN")
                .map(SecretString::from)
                .ok_or_else(|| ConfigError::MissingEnvVar("WHATSAPP_ACCESS_TOKEN".into()))?,
            api_client_id: lookup("WHATSAPP_PHONE_NUMBER_ID")
                .ok_or_else(|| ConfigError::MissingEnvVar("WHATSAPP_PHONE_NUMBER_ID".into()))?,
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            port,
            db_path,
            auth_token,
            verify_token,
            mode,
            ack,
            provider,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DELIVERY_HOOK_AUTH_TOKEN", "s3cret"),
        ("WHATSAPP_ACCESS_TOKEN", "wa-token"),
        ("WHATSAPP_PHONE_NUMBER_ID", "1234567890"),
    ];

    #[test]
    fn defaults_applied() {
        let config = HookConfig::from_lookup(lookup_from(REQUIRED)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, "./data/delivery-hook.db");
        assert_eq!(config.mode, ExecutionMode::NonProduction);
        assert_eq!(config.ack.template_name, "hello_world");
        assert_eq!(config.ack.language, "en_US");
        assert_eq!(config.provider.api_client_id, "1234567890");
        assert_eq!(config.provider.timeout, Duration::from_secs(10));
        assert_eq!(config.auth_token.expose_secret(), "s3cret");
        assert!(config.verify_token.is_none());
    }

    #[test]
    fn missing_auth_token_fails() {
        let err = HookConfig::from_lookup(lookup_from(&REQUIRED[1..])).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingEnvVar(key) if key == "DELIVERY_HOOK_AUTH_TOKEN")
        );
    }

    #[test]
    fn invalid_port_fails() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DELIVERY_HOOK_PORT", "not-a-port"));
        let err = HookConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn production_mode_parsing() {
        assert_eq!(ExecutionMode::parse("production"), ExecutionMode::Production);
        assert_eq!(ExecutionMode::parse(" Production "), ExecutionMode::Production);
        assert_eq!(ExecutionMode::parse("staging"), ExecutionMode::NonProduction);
        assert_eq!(ExecutionMode::parse(""), ExecutionMode::NonProduction);
    }
}
