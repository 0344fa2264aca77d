pub mod api; // HTTP router, endpoints, server lifecycle
pub mod chat; // Conversation lifecycle & message views
pub mod config;
pub mod core_state; // Transport-agnostic state
pub mod db;
pub mod models;
pub mod rag; // Citations, pagination, Gemini client, orchestrator

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Run the service: initialize tracing, open the data directory,
/// bootstrap the active conversation, serve the API until Ctrl-C.
pub async fn run() -> Result<(), String> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    std::fs::create_dir_all(config::app_data_dir())
        .map_err(|e| format!("Cannot create data directory: {e}"))?;

    let core = Arc::new(core_state::CoreState::new());

    // Opening once up front runs migrations and seeds before the first
    // request; a broken database fails the boot instead of a handler.
    {
        let conn = core
            .open_db()
            .map_err(|e| format!("Cannot open database: {e}"))?;
        let active = chat::ensure_active_conversation(&conn)
            .map_err(|e| format!("Cannot bootstrap conversation: {e}"))?;
        tracing::info!(conversation_id = %active, "Active conversation ready");
    }

    let mut server = api::start_server(core, config::bind_addr()).await?;
    tracing::info!(addr = %server.addr(), "Serving API");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Cannot listen for shutdown signal: {e}"))?;

    tracing::info!("Shutdown signal received");
    server.shutdown();
    Ok(())
}
