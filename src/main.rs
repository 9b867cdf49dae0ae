// Auction server entry point.
//
// Startup sequence:
// 1. Initialize tracing (stdout)
// 2. Load config
// 3. Load the player catalog
// 4. Load persisted rooms
// 5. Create mpsc channels
// 6. Bind and spawn the WebSocket server task
// 7. Run the application event loop until Ctrl+C

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

use gavel::app;
use gavel::catalog::Catalog;
use gavel::config;
use gavel::room::registry::Registry;
use gavel::store::Store;
use gavel::ws_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Auction server starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: port={}, timer={}s",
        config.port, config.timer_duration
    );

    // 3. Load the player catalog
    let catalog =
        Catalog::load(&config.players_path).context("failed to load player catalog")?;
    info!(
        "Catalog loaded: {} players in {} categories",
        catalog.players.len(),
        catalog.categories.len()
    );

    // 4. Load persisted rooms
    let store = Store::new(&config.storage_path);
    let rooms = store.load().context("failed to load persisted rooms")?;
    let registry = Registry::from_persisted(rooms);
    info!("Restored {} rooms", registry.len());

    // 5. Create mpsc channels
    let (net_tx, net_rx) = mpsc::channel(256);
    let (tick_tx, tick_rx) = mpsc::channel(256);

    // 6. Bind and spawn the WebSocket server task
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(listener, net_tx).await {
            error!("WebSocket server error: {e}");
        }
    });

    // 7. Run the application event loop until Ctrl+C
    let state = app::App::new(registry, store, catalog, tick_tx, config.timer_duration);
    info!("Auction server ready on port {}", config.port);

    tokio::select! {
        _ = app::run(state, net_rx, tick_rx) => {
            error!("Event loop exited unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    // The accept loop runs forever; stop it explicitly.
    ws_handle.abort();

    info!("Auction server shut down cleanly");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gavel=info,warn")),
        )
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
