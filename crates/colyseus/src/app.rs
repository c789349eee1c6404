//! Application lifecycle: wiring a locator or a node to its RPC server,
//! running until a shutdown signal and stopping everything in order.

use crate::cli::{CliArgs, Role};
use crate::config::AppConfig;
use crate::frame::run_frame_loop;
use crate::logging::display_banner;
use crate::signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent};
use behavior_arena::arena_registry;
use colyseus_core::{NodeId, ShutdownState};
use locator::Locator;
use replication::ReplicationEngine;
use rpc_transport::{LocatorService, RemoteLocator, RemoteReplica, ReplicationService, RpcServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Services started for one role.
enum Running {
    Locator {
        locator: Locator,
        server: JoinHandle<()>,
    },
    Node {
        engine: ReplicationEngine,
        server: JoinHandle<()>,
        frames: JoinHandle<()>,
    },
}

pub struct Application {
    config: AppConfig,
    role: Role,
}

impl Application {
    /// Loads configuration, applies CLI overrides and validates the result.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        Self::apply_overrides(&mut config, &args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner(&args.role.to_string());
        Ok(Self {
            config,
            role: args.role,
        })
    }

    fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
        if let Some(node_id) = args.node_id {
            config.node.id = node_id;
        }

        if let Some(bind_address) = &args.bind_address {
            match args.role {
                Role::Locator => config.locator.bind_address = bind_address.clone(),
                Role::Node => config.node.bind_address = bind_address.clone(),
            }
        }

        if let Some(locator_address) = &args.locator_address {
            config.node.locator_address = locator_address.clone();
        }

        if let Some(log_level) = &args.log_level {
            config.logging.level = log_level.clone();
        }

        if args.json_logs {
            config.logging.json_format = true;
        }
    }

    /// Runs the selected role until a shutdown signal arrives.
    ///
    /// Starts the locator or the node together with its RPC server, waits for
    /// SIGINT or SIGTERM, then stops the background loops and the server. A
    /// second signal during shutdown exits the process at once.
    ///
    /// # Returns
    ///
    /// `Ok(())` after a clean shutdown, or an error if the role could not be
    /// started, for example because its bind address is taken.
    ///
    /// # Lifecycle
    ///
    /// * **Locator**: index cleanup loop and the locator RPC service
    /// * **Node**: publish and cleanup loops, the frame loop and the
    ///   replication RPC service
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.log_configuration_summary();

        let shutdown = ShutdownState::new();
        let running = match self.role {
            Role::Locator => self.start_locator(&shutdown).await?,
            Role::Node => self.start_node(&shutdown).await?,
        };

        info!("✅ Colyseus {} is now running", self.role);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        wait_for_shutdown_signal().await?;

        // second signal: exit immediately
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_signal_silent().await {
                error!("Failed to set up forced shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown signal received again, exiting immediately");
            std::process::exit(1);
        });

        shutdown.initiate_shutdown();
        Self::stop(running).await;

        info!("✅ Colyseus {} shutdown complete", self.role);
        Ok(())
    }

    async fn start_locator(&self, shutdown: &ShutdownState) -> Result<Running, Box<dyn std::error::Error>> {
        let locator = Locator::with_shutdown(self.config.to_locator_config(), shutdown.clone());
        for peer in &self.config.peers {
            locator.connect_node(NodeId(peer.node_id), Arc::new(RemoteReplica::connect(&peer.address)));
        }
        info!("🔗 Locator knows {} node endpoint(s)", locator.node_count());

        let service = LocatorService::new(Arc::new(locator.clone()));
        let server = RpcServer::bind(&self.config.locator.bind_address, Arc::new(service), shutdown.clone()).await?;
        locator.start();

        Ok(Running::Locator {
            locator,
            server: server.spawn(),
        })
    }

    async fn start_node(&self, shutdown: &ShutdownState) -> Result<Running, Box<dyn std::error::Error>> {
        let node_id = self.config.node_id();
        let engine = ReplicationEngine::with_shutdown(
            node_id,
            self.config.replication,
            Arc::new(arena_registry()),
            shutdown.clone(),
        );

        engine.connect_locator(Arc::new(RemoteLocator::connect(&self.config.node.locator_address)));
        for peer in self.config.remote_peers() {
            engine.connect_peer(NodeId(peer.node_id), Arc::new(RemoteReplica::connect(&peer.address)));
        }

        let service = ReplicationService::new(Arc::new(engine.clone()));
        let server = RpcServer::bind(&self.config.node.bind_address, Arc::new(service), shutdown.clone()).await?;
        engine.start();
        let frames = tokio::spawn(run_frame_loop(engine.clone(), shutdown.clone()));

        Ok(Running::Node {
            engine,
            server: server.spawn(),
            frames,
        })
    }

    async fn stop(running: Running) {
        let server = match running {
            Running::Locator { locator, server } => {
                locator.shutdown().await;
                server
            }
            Running::Node { engine, server, frames } => {
                engine.shutdown().await;
                let _ = frames.await;
                server
            }
        };

        match tokio::time::timeout(Duration::from_secs(5), server).await {
            Ok(_) => info!("✅ RPC server stopped"),
            Err(_) => warn!("⏰ RPC server did not stop within timeout"),
        }
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        match self.role {
            Role::Locator => {
                let locator = &self.config.locator;
                info!("  🌐 Bind address: {}", locator.bind_address);
                info!(
                    "  🗺️ Boundary: ({}, {}) {}x{}",
                    locator.boundary.x, locator.boundary.y, locator.boundary.width, locator.boundary.height
                );
                info!("  🌳 Quadtree capacity: {}", locator.capacity);
                info!("  🧹 Cleanup interval: {}ms", locator.cleanup_interval_ms);
            }
            Role::Node => {
                let replication = &self.config.replication;
                info!("  🆔 Node id: {}", self.config.node.id);
                info!("  🌐 Bind address: {}", self.config.node.bind_address);
                info!("  📍 Locator: {}", self.config.node.locator_address);
                info!("  🎞️ Frame rate: {}/s", replication.frame_rate);
                info!(
                    "  🔭 Prediction: {}ms (publish buffer {}ms)",
                    replication.prediction_ms, replication.publish_buffer_ms
                );
                info!(
                    "  ⏱️ Interest TTL: {}ms, cleanup every {}ms",
                    replication.interest_ttl_ms, replication.cleanup_interval_ms
                );
            }
        }
        info!("  👥 Peers: {}", self.config.peers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(config_path: PathBuf) -> CliArgs {
        CliArgs {
            config_path,
            role: Role::Node,
            node_id: Some(4),
            bind_address: Some("127.0.0.1:9104".to_string()),
            locator_address: None,
            log_level: Some("debug".to_string()),
            json_logs: true,
        }
    }

    #[tokio::test]
    async fn test_application_applies_overrides() {
        let dir = tempfile::tempdir().expect("temp dir");
        let app = Application::new(args(dir.path().join("node.toml")))
            .await
            .expect("application should start from defaults");

        assert_eq!(app.config.node.id, 4);
        assert_eq!(app.config.node.bind_address, "127.0.0.1:9104");
        assert_eq!(app.config.locator.bind_address, "127.0.0.1:9000");
        assert_eq!(app.config.logging.level, "debug");
        assert!(app.config.logging.json_format);
    }

    #[tokio::test]
    async fn test_application_rejects_invalid_override() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut args = args(dir.path().join("node.toml"));
        args.log_level = Some("loud".to_string());
        assert!(Application::new(args).await.is_err());
    }

    #[tokio::test]
    async fn test_node_and_locator_start_and_stop() {
        let shutdown = ShutdownState::new();
        let mut config = AppConfig::default();
        config.locator.bind_address = "127.0.0.1:0".to_string();
        config.node.bind_address = "127.0.0.1:0".to_string();

        let locator_app = Application {
            config: config.clone(),
            role: Role::Locator,
        };
        let node_app = Application {
            config,
            role: Role::Node,
        };

        let locator = locator_app.start_locator(&shutdown).await.expect("locator should start");
        let node = node_app.start_node(&shutdown).await.expect("node should start");

        shutdown.initiate_shutdown();
        tokio::time::timeout(Duration::from_secs(5), async {
            Application::stop(node).await;
            Application::stop(locator).await;
        })
        .await
        .expect("services should stop");
    }
}
