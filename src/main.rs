//! Battle Royale Server
//!
//! Binds the WebSocket listener and serves rooms until interrupted.

use tracing::info;
use tracing_subscriber::EnvFilter;

use battle_royale::{GameServer, ServerConfig, TICK_RATE, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    info!("Battle Royale Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);
    info!("Max clients per room: {}", config.room.max_clients);

    let server = GameServer::new(config);
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}
