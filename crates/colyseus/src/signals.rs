//! Signal handling for graceful shutdown.

use tokio::signal;
use tracing::info;

/// Waits for a shutdown signal and logs its arrival.
///
/// On Unix this resolves on the first SIGINT or SIGTERM; on Windows on
/// Ctrl+C.
///
/// # Returns
///
/// `Ok(())` once a signal arrives, or an error if the signal handlers could
/// not be installed.
///
/// # Example
///
/// ```rust,ignore
/// wait_for_shutdown_signal().await?;
/// shutdown.initiate_shutdown();
/// ```
pub async fn wait_for_shutdown_signal() -> Result<(), Box<dyn std::error::Error>> {
    wait_for_shutdown_signal_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

/// Same as [`wait_for_shutdown_signal`] without the log line. Used to catch
/// a second signal during shutdown.
pub async fn wait_for_shutdown_signal_silent() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
