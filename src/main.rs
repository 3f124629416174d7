use p2p_relay::config::load_config;
use p2p_relay::relay::Relay;
use p2p_relay::transport::start_websocket_server;
use p2p_relay::utils::{Result, logging};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    if let Err(e) = run_server().await {
        // no-op when logging is already up
        logging::init("info");
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let config = load_config()?;
    logging::init(&config.logging.level);

    let addr = config.server.bind_addr();
    let grace = Duration::from_millis(config.server.shutdown_grace_ms);
    let relay = Arc::new(Mutex::new(Relay::new()));

    tokio::select! {
        res = start_websocket_server(addr, relay.clone(), config) => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Closing connections.");
            let closed = match relay.lock() {
                Ok(mut relay) => relay.close_all(),
                Err(poisoned) => poisoned.into_inner().close_all(),
            };
            if closed > 0 {
                tokio::time::sleep(grace).await;
            }
        }
    }

    Ok(())
}
