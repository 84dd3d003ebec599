//! Ollama Gate Host Entry Point

use og_host::{
    api,
    client::{HostIdentity, NodeClient},
    config, discovery, AppState,
};
use ollama_gate_common::{
    advertise::Advertiser, config::HostConfig, gateway::GatewayClient, logging, net,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    logging::init("ollama-gate-host").expect("failed to initialize logging");
    info!("Ollama Gate Host v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_from_env();
    let engine = GatewayClient::for_engine(config.engine_url.clone())
        .expect("Failed to create engine client");
    info!(engine_url = %engine.base_url(), "Using inference engine");

    let identity = HostIdentity {
        ip_address: net::local_ip_or_loopback(),
        host_name: net::machine_name(),
        host_port: config.port,
    };

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");
    info!("Host listening on {}", bind_addr);

    let advertiser = discovery::start_advertisement(&config, &identity);
    let cancel = CancellationToken::new();
    let registration = tokio::spawn(run_registration(
        config.clone(),
        identity,
        advertiser,
        cancel.clone(),
    ));

    let router = api::create_router(AppState::new(engine));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    cancel.cancel();
    if let Ok(Some(advertiser)) = registration.await {
        advertiser.shutdown();
    }
    info!("Host stopped");
}

/// ノードを見つけて登録を維持する
///
/// ノードURLが設定されていればそこへ登録し、なければLANを探索して
/// 最初に応答したノードへ登録する。
async fn run_registration(
    config: HostConfig,
    identity: HostIdentity,
    advertiser: Option<Advertiser>,
    cancel: CancellationToken,
) -> Option<Advertiser> {
    let node_url = match &config.node_url {
        Some(url) => url.clone(),
        None => loop {
            let summary = discovery::discover_nodes(
                &config,
                identity.clone(),
                advertiser.as_ref(),
                cancel.child_token(),
            )
            .await;
            if let Some(addr) = summary.responsive.first() {
                break format!("http://{}", addr);
            }
            if cancel.is_cancelled() {
                return advertiser;
            }
            warn!("No node answered, probing again in {:?}", config::retry_interval(&config));
            tokio::select! {
                _ = cancel.cancelled() => return advertiser,
                _ = tokio::time::sleep(config::retry_interval(&config)) => {}
            }
        },
    };

    match NodeClient::new(node_url) {
        Ok(client) => {
            client
                .maintain_registration(
                    identity,
                    config::heartbeat_interval(&config),
                    config::retry_interval(&config),
                    cancel,
                )
                .await
        }
        Err(err) => warn!(error = %err, "Failed to create node client"),
    }
    advertiser
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
