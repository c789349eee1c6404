//! # Colyseus - Process Entry Point
//!
//! Runs either the locator or a game node, selected with `--role`.
//!
//! ## Quick Start
//!
//! ```bash
//! # The locator, with node endpoints listed under [[peers]]
//! colyseus --role locator --config cluster.toml
//!
//! # Two nodes sharing the same file
//! colyseus --role node --node-id 1 --bind 127.0.0.1:9001 --config cluster.toml
//! colyseus --role node --node-id 2 --bind 127.0.0.1:9002 --config cluster.toml
//!
//! # JSON logging for production
//! colyseus --role node --json-logs
//! ```
//!
//! ## Configuration
//!
//! The process loads a TOML file (default: `config.toml`). If the file doesn't
//! exist, a default configuration is written there.
//!
//! ## Signal Handling
//!
//! SIGINT and SIGTERM stop the background loops and the RPC server. A second
//! signal exits immediately.

use tracing::error;

mod app;
mod cli;
mod config;
mod frame;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;

pub use cli::Role;
pub use config::{AppConfig, LocatorSettings, LoggingSettings, NodeSettings, PeerSettings};
pub use frame::{run_frame, run_frame_loop};

/// Parses arguments, sets up logging and runs the selected role until shutdown.
///
/// Exits the process with status 1 when startup or the run fails.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging settings come from the file, so load it before anything logs.
    let mut logging = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default()
        .logging;
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}
