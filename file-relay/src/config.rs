//! Directory layout for a relay run.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RelayError, Result};

/// Environment variable that overrides the base directory.
pub const BASE_DIR_ENV: &str = "FILE_RELAY_BASE_DIR";

/// Directory watched for new files.
pub const INPUT_DIR_NAME: &str = "Entrada";

/// Directory receiving the prefixed copies.
pub const OUTPUT_DIR_NAME: &str = "Saida";

/// Directory receiving the originals after handling.
pub const PROCESSED_DIR_NAME: &str = "processed_files";

/// Append-only log file.
pub const LOG_FILE_NAME: &str = "logfile.txt";

/// Prefix given to copies in the output directory.
pub const COPY_PREFIX: &str = "copia_";

/// Paths and switches for a relay run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Directory every other path is derived from.
    pub base_dir: PathBuf,

    /// Watched directory.
    pub input_dir: PathBuf,

    /// Where copies land.
    pub output_dir: PathBuf,

    /// Where originals are archived.
    pub processed_dir: PathBuf,

    /// Log file path.
    pub log_file: PathBuf,

    /// Whether log lines are mirrored to stderr.
    pub console: bool,
}

impl RelayConfig {
    /// Derive the standard layout under `base_dir`.
    pub fn from_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();

        Self {
            input_dir: base_dir.join(INPUT_DIR_NAME),
            output_dir: base_dir.join(OUTPUT_DIR_NAME),
            processed_dir: base_dir.join(PROCESSED_DIR_NAME),
            log_file: base_dir.join(LOG_FILE_NAME),
            base_dir,
            console: true,
        }
    }

    /// Resolve the base directory from `FILE_RELAY_BASE_DIR`, falling back to
    /// the current working directory.
    pub fn from_env() -> std::io::Result<Self> {
        let base_dir = match std::env::var_os(BASE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::current_dir()?,
        };
        Ok(Self::from_base_dir(base_dir))
    }

    /// Toggle the console sink.
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// The three directories the relay needs, in creation order.
    pub fn directories(&self) -> [&Path; 3] {
        [&self.input_dir, &self.output_dir, &self.processed_dir]
    }

    /// Create the input, output and processed directories if they are
    /// missing. Existing directories are left untouched.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in self.directories() {
            std::fs::create_dir_all(dir).map_err(|source| RelayError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
            debug!("Directory ready: {}", dir.display());
        }
        Ok(())
    }

    /// Destination of the copy for `filename`.
    pub fn copy_path(&self, filename: impl AsRef<OsStr>) -> PathBuf {
        let mut name = OsString::from(COPY_PREFIX);
        name.push(filename);
        self.output_dir.join(name)
    }

    /// Destination of the archived original for `filename`.
    pub fn archive_path(&self, filename: impl AsRef<OsStr>) -> PathBuf {
        self.processed_dir.join(filename.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_layout_from_base_dir() {
        let config = RelayConfig::from_base_dir("/srv/relay");

        assert_eq!(config.input_dir, Path::new("/srv/relay/Entrada"));
        assert_eq!(config.output_dir, Path::new("/srv/relay/Saida"));
        assert_eq!(config.processed_dir, Path::new("/srv/relay/processed_files"));
        assert_eq!(config.log_file, Path::new("/srv/relay/logfile.txt"));
        assert!(config.console);
    }

    #[test]
    fn test_destination_paths() {
        let config = RelayConfig::from_base_dir("/srv/relay");

        assert_eq!(
            config.copy_path("report.txt"),
            Path::new("/srv/relay/Saida/copia_report.txt")
        );
        assert_eq!(
            config.archive_path("report.txt"),
            Path::new("/srv/relay/processed_files/report.txt")
        );
    }

    #[test]
    fn test_ensure_directories_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let config = RelayConfig::from_base_dir(temp_dir.path());

        config.ensure_directories().unwrap();
        std::fs::write(config.input_dir.join("keep.txt"), "x").unwrap();
        config.ensure_directories().unwrap();

        for dir in config.directories() {
            assert!(dir.is_dir(), "{} should exist", dir.display());
        }
        assert!(config.input_dir.join("keep.txt").exists());
        assert!(!config.log_file.exists());
    }

    #[test]
    fn test_ensure_directories_reports_failing_path() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let config = RelayConfig::from_base_dir(&blocker);
        let err = config.ensure_directories().unwrap_err();

        match err {
            RelayError::CreateDir { path, .. } => assert_eq!(path, config.input_dir),
            other => panic!("unexpected error: {other}"),
        }
    }
}
