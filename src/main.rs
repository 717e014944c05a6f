use std::sync::Arc;

use dancelink::config::Config;
use dancelink::conversation::{ConversationEngine, spawn_cleanup_task};
use dancelink::store::{ConversationStore, PoolConfig, UserStore, create_storage, migrations};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("💃 dancelink v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {} ({})", config.db_backend, config.db_mode);
    eprintln!("   Database: {}", config.db_url);
    eprintln!("   Idle timeout: {} min", config.idle_timeout_min);
    eprintln!("   Webhook: http://0.0.0.0:{}/whatsapp\n", config.port);

    // ── Storage ─────────────────────────────────────────────────────────
    let storage = create_storage(
        &config.db_backend,
        &config.db_url,
        &config.db_mode,
        PoolConfig::new(config.pool_size, config.pool_max_overflow),
    )?;
    // Connections are lazy; connect now so an unreachable target fails at
    // startup instead of on the first message.
    storage.connect().await?;
    migrations::run(storage.as_ref()).await?;

    let store = ConversationStore::new(Arc::clone(&storage));
    let users = Arc::new(UserStore::new(Arc::clone(&storage)));

    // ── Engine ──────────────────────────────────────────────────────────
    let engine = Arc::new(ConversationEngine::new(
        store.clone(),
        chrono::Duration::minutes(config.idle_timeout_min as i64),
    ));

    // Sweep long-idle conversations hourly.
    let _cleanup = spawn_cleanup_task(
        store,
        std::time::Duration::from_secs(3600),
        chrono::Duration::hours(config.cleanup_retention_hours as i64),
    );

    // ── Webhook server ──────────────────────────────────────────────────
    let app = dancelink::webhook::webhook_routes(dancelink::webhook::WebhookState {
        engine,
        users,
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
