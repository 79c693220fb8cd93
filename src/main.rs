#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! PeerLinks node entrypoint (systemd-friendly).
//! Loads state, listens for peers and keeps the process alive.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use peerlinks::core::config::NodeConfig;
use peerlinks::protocol::Protocol;
use peerlinks::storage::SledStorage;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn load_config() -> NodeConfig {
    let mut config = match std::env::var("PEERLINKS_CONFIG") {
        Ok(path) => match NodeConfig::load(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path, err = %e, "config load failed; using defaults");
                NodeConfig::default()
            }
        },
        Err(_) => NodeConfig::default(),
    };
    // Env overrides win over file values.
    config.node.data_dir = env("PEERLINKS_DATA_DIR", &config.node.data_dir);
    config.p2p.listen_addr = env("PEERLINKS_LISTEN_ADDR", &config.p2p.listen_addr);
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let config = load_config();
    info!(
        name = %config.node.name,
        data_dir = %config.node.data_dir,
        git = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown"),
        "peerlinks node starting"
    );

    let db_path = format!("{}/db", config.node.data_dir);
    let storage = Arc::new(SledStorage::open(&db_path).context("open storage")?);
    let protocol = Arc::new(Protocol::from_config(storage.clone(), &config).context("protocol")?);
    protocol.load().await.context("load protocol state")?;

    let listener = tokio::net::TcpListener::bind(&config.p2p.listen_addr)
        .await
        .context("bind listen addr")?;
    info!(addr = %config.p2p.listen_addr, peer_id = %protocol.peer_id(), "listening for peers");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, addr)) => {
                        let protocol = protocol.clone();
                        tokio::spawn(async move {
                            if let Err(e) = protocol.connect(socket).await {
                                warn!(addr = %addr, err = %e, "peer session ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(err = %e, "accept failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    protocol.close().await;
    if let Err(e) = storage.flush() {
        warn!(err = %e, "storage flush failed");
    }
    Ok(())
}
