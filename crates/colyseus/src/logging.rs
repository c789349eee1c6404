//! Logging system setup.
//!
//! Initializes `tracing-subscriber` with human-readable or JSON output.
//! `RUST_LOG` takes precedence over the configured level when set.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system with the specified configuration.
///
/// Installs a global `tracing-subscriber` registry filtered by `RUST_LOG` or,
/// when that is unset, by the configured level.
///
/// # Arguments
///
/// * `config` - Logging section of the configuration file
/// * `json_format` - Forces JSON output regardless of `config.json_format`
///
/// # Returns
///
/// `Ok(())` once the subscriber is installed, or an error if a global
/// subscriber was already set.
///
/// # Example
///
/// ```rust,ignore
/// let settings = LoggingSettings { level: "debug".to_string(), json_format: false };
/// setup_logging(&settings, false)?;
/// ```
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner(role: &str) {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║              🛰️  COLYSEUS                 ║");
    info!("║    Interest-Scoped Object Replication    ║");
    info!("╚══════════════════════════════════════════╝");
    info!("🚀 Colyseus v{} starting as {}", version, role);
}
