//! Copy-then-archive handling for a single new file.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::event::WatchedEvent;

/// Where a handled file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    /// Prefixed copy in the output directory.
    pub copy: PathBuf,

    /// Original, now in the processed directory.
    pub archive: PathBuf,
}

/// Result of handling one event.
#[derive(Debug)]
pub enum HandleOutcome {
    /// Directory event; nothing was done.
    Ignored,

    /// Copied and archived.
    Processed(ProcessedFile),

    /// A step failed. Whatever completed before the failure stays on disk.
    Failed { filename: String, error: RelayError },
}

impl HandleOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed(_))
    }
}

/// Reacts to new files in the input directory.
#[derive(Debug, Clone)]
pub struct EventHandler {
    config: RelayConfig,
}

impl EventHandler {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Copy the new file to the output directory, then move the original to
    /// the processed directory.
    ///
    /// Failures are logged at error level and reported in the outcome; they
    /// are never returned as errors so the watch loop keeps going.
    pub async fn on_file_created(&self, event: &WatchedEvent) -> HandleOutcome {
        if event.is_directory {
            return HandleOutcome::Ignored;
        }

        let Some(filename) = event.filename() else {
            let error = RelayError::InvalidPath(event.source_path.clone());
            let filename = event.source_path.display().to_string();
            error!("failed to process file {filename}: {error}");
            return HandleOutcome::Failed { filename, error };
        };
        let display_name = filename.to_string_lossy().into_owned();

        info!("new file detected: {display_name}");

        match self.relay(&event.source_path, filename).await {
            Ok(processed) => HandleOutcome::Processed(processed),
            Err(error) => {
                error!("failed to process file {display_name}: {error}");
                HandleOutcome::Failed {
                    filename: display_name,
                    error,
                }
            }
        }
    }

    async fn relay(&self, source: &Path, filename: &OsStr) -> Result<ProcessedFile> {
        let copy = self.config.copy_path(filename);
        copy_file(source, &copy).await?;
        info!("file copied to: {}", copy.display());

        let archive = self.config.archive_path(filename);
        move_file(source, &archive).await?;
        info!("file moved to: {}", archive.display());

        Ok(ProcessedFile { copy, archive })
    }
}

/// Copy contents and permissions, replacing any existing destination.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .await
        .map(|_| ())
        .map_err(|source| RelayError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
}

/// Rename `from` to `to`, replacing any existing destination. Falls back to
/// copy and delete when the two paths are on different filesystems.
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    let moved = match fs::rename(from, to).await {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            match fs::copy(from, to).await {
                Ok(_) => fs::remove_file(from).await,
                Err(e) => Err(e),
            }
        }
        other => other,
    };

    moved.map_err(|source| RelayError::Archive {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}
