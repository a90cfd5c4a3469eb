//! Error types for the file relay.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while relaying files.
///
/// Startup variants (`CreateDir`, `LogFile`, `Subscriber`, and `Notify` when
/// subscribing) abort the process. Per-file variants are logged by the
/// handler and never escape it.
#[derive(Error, Debug)]
pub enum RelayError {
    /// A working directory could not be created.
    #[error("could not create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The log file could not be opened for appending.
    #[error("could not open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Building the log dispatch failed.
    #[error("could not install log subscriber: {0}")]
    Subscriber(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// Copying into the output directory failed.
    #[error("copy {} -> {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Moving the original into the archive failed.
    #[error("move {} -> {}: {source}", from.display(), to.display())]
    Archive {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The event path has no file name component.
    #[error("path has no file name: {}", .0.display())]
    InvalidPath(PathBuf),
}
