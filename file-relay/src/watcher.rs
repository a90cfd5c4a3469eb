//! Directory watcher that feeds new files to the handler.

use std::future::Future;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, error, info};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::event::{ArrivalFilter, WatchedEvent};
use crate::handler::{EventHandler, HandleOutcome};

/// Events buffered between the notify thread and the dispatch loop. When the
/// buffer is full the notify thread blocks instead of dropping events.
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Lifecycle of a [`DirectoryWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Running,
}

/// Counters for one Running period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStats {
    /// Files copied and archived.
    pub processed: usize,

    /// Files whose copy or move failed.
    pub failed: usize,

    /// Directory events skipped.
    pub ignored: usize,
}

impl WatcherStats {
    fn record(&mut self, outcome: &HandleOutcome) {
        match outcome {
            HandleOutcome::Processed(_) => self.processed += 1,
            HandleOutcome::Failed { .. } => self.failed += 1,
            HandleOutcome::Ignored => self.ignored += 1,
        }
    }
}

/// Resources held while the watcher is running.
struct ActiveWatch {
    watcher: RecommendedWatcher,
    cancel: CancellationToken,
    worker: JoinHandle<WatcherStats>,
}

/// Watches the input directory (non-recursively) and hands every new file to
/// the [`EventHandler`], one at a time.
pub struct DirectoryWatcher {
    config: RelayConfig,
    handler: EventHandler,
    dispatch: Dispatch,
    active: Option<ActiveWatch>,
}

impl DirectoryWatcher {
    /// Create a stopped watcher. All log lines go through `dispatch`.
    pub fn new(config: RelayConfig, dispatch: Dispatch) -> Self {
        Self {
            handler: EventHandler::new(config.clone()),
            config,
            dispatch,
            active: None,
        }
    }

    pub fn state(&self) -> WatcherState {
        if self.active.is_some() {
            WatcherState::Running
        } else {
            WatcherState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == WatcherState::Running
    }

    /// Ensure the directories exist, subscribe to the input directory and
    /// start dispatching. Does nothing if already running.
    pub async fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }

        self.config.ensure_directories()?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let callback_dispatch = self.dispatch.clone();
        let mut arrivals = ArrivalFilter::new();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                tracing::dispatcher::with_default(&callback_dispatch, || match res {
                    Ok(event) => {
                        for arrival in arrivals.arrivals(&event) {
                            if event_tx.blocking_send(arrival).is_err() {
                                debug!("Dispatch loop closed, dropping event");
                            }
                        }
                    }
                    Err(e) => {
                        error!("watch error: {e}");
                    }
                });
            },
        )?;
        watcher.watch(&self.config.input_dir, RecursiveMode::NonRecursive)?;

        self.log(|| info!("starting directory monitoring"));

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(
            dispatch_loop(self.handler.clone(), event_rx, cancel.clone())
                .with_subscriber(self.dispatch.clone()),
        );

        self.active = Some(ActiveWatch {
            watcher,
            cancel,
            worker,
        });

        Ok(())
    }

    /// Unsubscribe, let the in-flight file finish and wait for the dispatch
    /// loop to exit. Events still queued are not handled.
    pub async fn stop(&mut self) -> WatcherStats {
        let Some(ActiveWatch {
            mut watcher,
            cancel,
            worker,
        }) = self.active.take()
        else {
            return WatcherStats::default();
        };

        if let Err(e) = watcher.unwatch(&self.config.input_dir) {
            self.log(|| debug!("Unwatch failed for {}: {e}", self.config.input_dir.display()));
        }
        drop(watcher);
        cancel.cancel();

        match worker.await {
            Ok(stats) => {
                self.log(|| debug!("Directory monitoring stopped: {stats:?}"));
                stats
            }
            Err(e) => {
                self.log(|| error!("dispatch loop ended abnormally: {e}"));
                WatcherStats::default()
            }
        }
    }

    /// Run until `shutdown` resolves, then stop.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<WatcherStats>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        Ok(self.stop().await)
    }

    fn log(&self, f: impl FnOnce()) {
        tracing::dispatcher::with_default(&self.dispatch, f);
    }
}

async fn dispatch_loop(
    handler: EventHandler,
    mut events: mpsc::Receiver<WatchedEvent>,
    cancel: CancellationToken,
) -> WatcherStats {
    let mut stats = WatcherStats::default();

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        // Not raced against `cancel`: a file that has started is finished.
        let outcome = handler.on_file_created(&event).await;
        stats.record(&outcome);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Logger;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn quiet(temp_dir: &TempDir) -> (RelayConfig, Logger) {
        let config = RelayConfig::from_base_dir(temp_dir.path()).with_console(false);
        let logger = Logger::init(&config).unwrap();
        (config, logger)
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let (config, logger) = quiet(&temp_dir);

        let watcher = DirectoryWatcher::new(config, logger.dispatch().clone());
        assert_eq!(watcher.state(), WatcherState::Stopped);
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_start_creates_directories_and_logs() {
        let temp_dir = TempDir::new().unwrap();
        let (config, logger) = quiet(&temp_dir);
        let mut watcher = DirectoryWatcher::new(config.clone(), logger.dispatch().clone());

        watcher.start().await.unwrap();
        assert!(watcher.is_running());
        for dir in config.directories() {
            assert!(dir.is_dir());
        }

        // Second start is a no-op.
        watcher.start().await.unwrap();

        let stats = watcher.stop().await;
        assert_eq!(watcher.state(), WatcherState::Stopped);
        assert_eq!(stats, WatcherStats::default());

        let log = std::fs::read_to_string(&config.log_file).unwrap();
        assert_eq!(log.matches("starting directory monitoring").count(), 1);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let (config, logger) = quiet(&temp_dir);
        let mut watcher = DirectoryWatcher::new(config, logger.dispatch().clone());

        assert_eq!(watcher.stop().await, WatcherStats::default());
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[tokio::test]
    async fn test_dispatch_loop_drains_until_sender_closes() {
        let temp_dir = TempDir::new().unwrap();
        let (config, logger) = quiet(&temp_dir);
        config.ensure_directories().unwrap();

        let file = config.input_dir.join("queued.txt");
        std::fs::write(&file, "queued").unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(WatchedEvent::file(&file)).await.unwrap();
        tx.send(WatchedEvent::directory(&config.output_dir)).await.unwrap();
        drop(tx);

        let stats = dispatch_loop(EventHandler::new(config.clone()), rx, CancellationToken::new())
            .with_subscriber(logger.dispatch().clone())
            .await;

        assert_eq!(
            stats,
            WatcherStats {
                processed: 1,
                failed: 0,
                ignored: 1,
            }
        );
        assert!(config.processed_dir.join("queued.txt").exists());
    }

    #[tokio::test]
    async fn test_cancelled_loop_skips_queued_events() {
        let temp_dir = TempDir::new().unwrap();
        let (config, logger) = quiet(&temp_dir);
        config.ensure_directories().unwrap();

        let file = config.input_dir.join("late.txt");
        std::fs::write(&file, "late").unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(WatchedEvent::file(&file)).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = dispatch_loop(EventHandler::new(config.clone()), rx, cancel)
            .with_subscriber(logger.dispatch().clone())
            .await;

        assert_eq!(stats, WatcherStats::default());
        assert!(file.exists());
    }
}
