use std::sync::Arc;

use anyhow::Context;
use server::app;
use server::config::ServerConfig;
use server::db::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (for development)
    // Try loading from current directory first, then from server/ directory
    if dotenvy::dotenv().is_err() {
        dotenvy::from_filename("server/.env").ok();
    }

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting directory server...");
    log::info!("Protocol version: {}", protocol::protocol_version());

    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "server/config/directory.toml".to_string());

    let mut config = ServerConfig::load_from_file(&config_path).with_context(|| {
        format!(
            "failed to load configuration from '{}' (set CONFIG_PATH or run from the workspace root)",
            config_path
        )
    })?;
    config.apply_env_overrides()?;
    log::info!("Loaded configuration with {} users", config.users.len());

    let store = Arc::new(MemoryStore::new(config.users()));
    let server = app::serve(&config, store).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    log::info!("Shutdown signal received");

    server.shutdown().await;
    Ok(())
}
