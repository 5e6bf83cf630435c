use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use slotmeet::config::ServerConfig;
use slotmeet::engine::OverlapEngine;
use slotmeet::limits::DRAIN_TIMEOUT_SECS;
use slotmeet::request::OverlapService;
use slotmeet::store::InMemoryStore;
use slotmeet::wire;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    slotmeet::observability::init(config.metrics_port)?;

    let store = match &config.seed_file {
        Some(path) => InMemoryStore::load_seed(path)?,
        None => InMemoryStore::new(),
    };
    let service = Arc::new(OverlapService::new(
        Arc::new(store),
        OverlapEngine::default(),
        config.fetch_timeout,
    ));
    let max_connections = config.max_connections;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("slotmeet listening on {addr}");
    info!(
        "  seed: {}",
        config
            .seed_file
            .as_ref()
            .map_or("none".to_string(), |p| p.display().to_string())
    );
    info!("  max_connections: {max_connections}");
    info!("  fetch_timeout: {}ms", config.fetch_timeout.as_millis());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Stop accepting on SIGTERM/ctrl-c, then wait for open connections
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(slotmeet::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(slotmeet::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(slotmeet::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let service = service.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, service).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(slotmeet::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    info!("draining connections...");
    let open = wire::drain_connections(
        &semaphore,
        max_connections,
        Duration::from_secs(DRAIN_TIMEOUT_SECS),
    )
    .await;
    if open > 0 {
        tracing::warn!("drain timeout, {open} connections still open");
    } else {
        info!("all connections drained");
    }

    info!("slotmeet stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("cannot register SIGTERM handler: {e}"),
        }
    }
    tokio::signal::ctrl_c().await.ok();
}
