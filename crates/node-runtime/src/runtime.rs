//! # Node Runtime
//!
//! Supervises a running node: binds the peer HTTP listener, spawns the
//! background loops, and turns everything off again through one shutdown
//! signal.

use crate::config::NodeConfig;
use crate::container::NodeContainer;
use crate::{http, loops};
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// The supervising runtime around one [`NodeContainer`].
pub struct NodeRuntime {
    container: Arc<NodeContainer>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl NodeRuntime {
    /// Build the full subsystem graph for `config`.
    pub async fn build(config: NodeConfig) -> Result<Self> {
        let container = NodeContainer::build(config).await?;
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        Ok(Self { container, shutdown_tx, shutdown_rx })
    }

    /// Bind the listener and spawn the HTTP surface and every background
    /// loop. Returns once the node is serving.
    pub async fn start(&self) -> Result<()> {
        let config = self.container.config();
        info!("===========================================");
        info!("  Civic-Ledger Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        info!("Listen: {}", config.node.listen);
        info!("Advertise: {}", config.advertise_addr());
        match &config.node.data_dir {
            Some(dir) => info!("Data dir: {}", dir.display()),
            None => info!("Data dir: none (memory only)"),
        }

        let listener = tokio::net::TcpListener::bind(&config.node.listen)
            .await
            .with_context(|| format!("binding {}", config.node.listen))?;

        let router = http::build_router(self.container.clone());
        let mut http_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            let drained = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown.changed().await;
                    info!("[http] Shutdown signal received");
                })
                .await;
            if let Err(e) = drained {
                error!(error = %e, "HTTP surface stopped");
            }
        });

        self.spawn_loop("rollup", loops::rollup_loop(self.container.clone()));
        self.spawn_loop("sync", loops::sync_loop(self.container.clone()));
        self.spawn_loop("heartbeat", loops::heartbeat_loop(self.container.clone()));
        self.spawn_loop("events", loops::event_loop(self.container.clone()));

        info!("All subsystems running");
        Ok(())
    }

    fn spawn_loop(&self, name: &'static str, task: impl Future<Output = ()> + Send + 'static) {
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = task => {}
                _ = shutdown.changed() => {
                    info!("[{name}] Shutdown signal received");
                }
            }
        });
    }

    /// Stop every task and give in-flight work a moment to settle.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {e}");
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        info!("Shutdown complete");
    }

    /// The assembled container.
    pub fn container(&self) -> Arc<NodeContainer> {
        Arc::clone(&self.container)
    }
}
