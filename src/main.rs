//! Cube Duel Server
//!
//! Runs the duel engine behind a WebSocket endpoint.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cube_duel::{
    ConnectionRegistry, DuelEngine, DuelServer, EngineConfig, RandomScrambler, ServerConfig,
    VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Cube Duel Server v{}", VERSION);

    let engine_config = EngineConfig::from_env();
    let server_config = ServerConfig::from_env();
    info!("Bind address: {}", server_config.bind_addr);
    info!("Max connections: {}", server_config.max_connections);

    let registry = Arc::new(ConnectionRegistry::new());
    let engine = DuelEngine::start(
        engine_config,
        registry.clone(),
        Box::new(RandomScrambler::from_entropy()),
    );
    let server = DuelServer::new(server_config, registry, engine.events());

    let result = tokio::select! {
        result = server.run() => result.context("Duel server failed"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("Ctrl-C received, shutting down");
            Ok(())
        }
    };

    server.shutdown();
    engine.shutdown().await;
    result
}
