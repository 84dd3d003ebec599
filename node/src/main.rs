//! Ollama Gate Node Entry Point

use og_node::{api, config, discovery, store, AppState};
use ollama_gate_common::logging;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    logging::init("ollama-gate-node").expect("failed to initialize logging");
    info!("Ollama Gate Node v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_from_env();

    let store: store::SharedStore = match &config.redis_url {
        Some(url) => Arc::new(
            store::RedisStore::connect(url)
                .await
                .expect("Failed to connect to Redis"),
        ),
        None => {
            warn!("OLLAMA_GATE_REDIS_URL not set, registry is kept in memory only");
            Arc::new(store::MemoryStore::new())
        }
    };

    let state = AppState::new(store, config::registry_ttl(&config));
    let router = api::create_router(state);
    let advertiser = discovery::start_advertisement(&config);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");
    info!("Node listening on {}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    if let Some(advertiser) = advertiser {
        advertiser.shutdown();
    }
    info!("Node stopped");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
