//! # File Relay
//!
//! Watches an input directory and, for every file that appears in it, drops a
//! prefixed copy into an output directory and moves the original into an
//! archive. Each step is written to an append-only log.
//!
//! ## Layout
//!
//! ```text
//! <base>/
//! ├── Entrada/           watched, non-recursive
//! ├── Saida/             copia_<name>
//! ├── processed_files/   <name>
//! └── logfile.txt        "<timestamp> - <LEVEL> - <message>"
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          File Relay                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  notify ──► ArrivalFilter ──► mpsc ──► dispatch loop            │
//! │                                            │                    │
//! │                                            ▼                    │
//! │  RelayConfig ─────────────────────────► EventHandler            │
//! │                                          copy ─► move           │
//! │                                            │                    │
//! │  Logger (file + stderr) ◄──────────────────┘                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod logging;
pub mod watcher;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use event::{ArrivalFilter, WatchedEvent};
pub use handler::{EventHandler, HandleOutcome, ProcessedFile};
pub use logging::{Logger, RUN_SEPARATOR_WIDTH, run_separator};
pub use watcher::{DirectoryWatcher, WatcherState, WatcherStats};
