//! Run log shared by the watcher and the handler.
//!
//! Every line goes to the log file and, unless disabled, to stderr, using the
//! same layout for both sinks:
//!
//! ```text
//! 2026-10-15 09:41:07,512 - INFO - new file detected: report.txt
//! ```
//!
//! The logger is built once per process and handed to the components that
//! need it as a [`Dispatch`]. `RUST_LOG` overrides the default `info` filter
//! for other crates; this crate's own INFO lines are always kept.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::combinator::Or;
use tracing_subscriber::filter::{EnvFilter, FilterExt, LevelFilter, Targets};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Number of `=` characters in the line closing a run.
pub const RUN_SEPARATOR_WIDTH: usize = 50;

/// `2026-10-15 09:41:07,512`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Filter used when `RUST_LOG` is unset or does not parse.
const DEFAULT_DIRECTIVES: &str = "info";

/// The line written between two runs.
pub fn run_separator() -> String {
    "=".repeat(RUN_SEPARATOR_WIDTH)
}

/// `timestamp - LEVEL - message` event layout.
struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        write!(writer, "{timestamp} - {} - ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `directives` (or `info`) for everything, but never quieter than INFO for
/// this crate.
fn level_filter<S>(directives: Option<&str>) -> Or<EnvFilter, Targets, S>
where
    S: Subscriber,
{
    let env = directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES));
    let own = Targets::new().with_target(env!("CARGO_CRATE_NAME"), LevelFilter::INFO);
    env.or(own)
}

/// File and console sinks for one process.
pub struct Logger {
    path: PathBuf,
    file: Arc<File>,
    dispatch: Dispatch,
}

impl Logger {
    /// Open (or create) the log file in append mode and build the dispatch.
    pub fn init(config: &RelayConfig) -> Result<Self> {
        let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        Self::build(config, directives.as_deref())
    }

    fn build(config: &RelayConfig, directives: Option<&str>) -> Result<Self> {
        let path = config.log_file.clone();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| RelayError::LogFile {
                path: path.clone(),
                source,
            })?;
        let file = Arc::new(file);

        let file_layer = tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_ansi(false)
            .with_writer(Arc::clone(&file))
            .with_filter(level_filter(directives));

        let console_layer = config.console.then(|| {
            tracing_subscriber::fmt::layer()
                .event_format(LineFormat)
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .with_filter(level_filter(directives))
        });

        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer);

        Ok(Self {
            path,
            file,
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle to pass to components that emit log lines.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Make this logger the process-wide default.
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| RelayError::Subscriber(e.to_string()))
    }

    /// Run `f` with this logger as the current thread's default.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Close the run by appending the separator line.
    pub fn finish(self) -> Result<()> {
        let separator = format!("\n{}\n", run_separator());
        let mut file = &*self.file;
        file.write_all(separator.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| RelayError::LogFile {
                path: self.path.clone(),
                source,
            })
    }
}
