use anyhow::Context;
use file_relay::{DirectoryWatcher, Logger, RelayConfig};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env().context("failed to resolve base directory")?;
    config.ensure_directories()?;

    let logger = Logger::init(&config)?;
    logger.install_global()?;

    let mut watcher = DirectoryWatcher::new(config, logger.dispatch().clone());
    let stats = watcher.run_until(shutdown_signal()).await?;
    info!(
        "directory monitoring stopped: {} processed, {} failed",
        stats.processed, stats.failed
    );

    logger.finish()?;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for interrupt: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
