use std::sync::Arc;

use delivery_hook::autoreply::AutoReplyEngine;
use delivery_hook::channels::{OutboundMessenger, WhatsAppClient};
use delivery_hook::config::HookConfig;
use delivery_hook::reconcile::StatusReconciler;
use delivery_hook::store::{LibSqlBackend, MessageRecordStore};
use delivery_hook::webhook::{WebhookDispatcher, WebhookState, webhook_routes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = HookConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!(
            "  export DELIVERY_HOOK_AUTH_TOKEN=... WHATSAPP_ACCESS_TOKEN=... WHATSAPP_PHONE_NUMBER_ID=..."
        );
        std::process::exit(1);
    });

    eprintln!("📬 delivery-hook v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Mode: {}",
        if config.mode.is_production() {
            "production"
        } else {
            "non-production (template acks)"
        }
    );

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let store: Arc<dyn MessageRecordStore> = Arc::new(
        LibSqlBackend::new_local(db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path);

    // ── Outbound ─────────────────────────────────────────────────────────
    let messenger: Arc<dyn OutboundMessenger> = Arc::new(WhatsAppClient::new(&config.provider)?);
    eprintln!("   Provider API: {}", config.provider.api_base);

    // ── Webhook ──────────────────────────────────────────────────────────
    let dispatcher = WebhookDispatcher::new(
        StatusReconciler::new(store),
        AutoReplyEngine::new(
            messenger,
            config.mode,
            config.provider.api_client_id.clone(),
            config.ack.clone(),
        ),
    );

    let app = webhook_routes(WebhookState {
        dispatcher: Arc::new(dispatcher),
        auth_token: config.auth_token.clone(),
        verify_token: config.verify_token.clone(),
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook\n", config.port);
    tracing::info!(port = config.port, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
