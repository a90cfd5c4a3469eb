//! Creation events extracted from file system notifications.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};

/// Whether a file created in place is held back until its writer closes it.
/// Only inotify reports the close of a written file.
const WAIT_FOR_CLOSE: bool = cfg!(target_os = "linux");

/// A new entry that appeared in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedEvent {
    /// Path of the new entry.
    pub source_path: PathBuf,

    /// Whether the entry is a directory.
    pub is_directory: bool,
}

impl WatchedEvent {
    /// Create a new event.
    pub fn new(source_path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            source_path: source_path.into(),
            is_directory,
        }
    }

    /// Event for a new regular file.
    pub fn file(source_path: impl Into<PathBuf>) -> Self {
        Self::new(source_path, false)
    }

    /// Event for a new directory.
    pub fn directory(source_path: impl Into<PathBuf>) -> Self {
        Self::new(source_path, true)
    }

    /// Base name of the new entry.
    pub fn filename(&self) -> Option<&OsStr> {
        self.source_path.file_name()
    }
}

/// Turns raw notifications into [`WatchedEvent`]s.
///
/// A file counts as new when it is created in the directory or renamed into
/// it from somewhere else.
///
/// The create notification fires when the file is opened, before any data is
/// written. On Linux a created file is therefore held until inotify reports
/// the writer closed it; a file renamed in is complete and is released at
/// once. Other platforms release created files immediately.
///
/// Renames that stay inside the directory show up as a `From`/`To` pair
/// sharing a tracker, reported back to back, so remembering the last `From`
/// is enough to recognise them. Only inotify attaches trackers: on other
/// backends every `To` counts as an arrival, including renames inside the
/// directory.
#[derive(Debug, Default)]
pub struct ArrivalFilter {
    /// Tracker of the last `From`, and whether that path was still being written.
    last_rename_from: Option<(usize, bool)>,

    /// Created files whose writer has not closed them yet.
    being_written: HashSet<PathBuf>,
}

impl ArrivalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arrivals carried by `event`, if any.
    pub fn arrivals(&mut self, event: &notify::Event) -> Vec<WatchedEvent> {
        match event.kind {
            EventKind::Create(kind) => {
                let mut ready = Vec::new();
                for path in &event.paths {
                    let is_directory = is_directory(kind, path);
                    if WAIT_FOR_CLOSE && !is_directory {
                        self.being_written.insert(path.clone());
                    } else {
                        ready.push(WatchedEvent::new(path, is_directory));
                    }
                }
                ready
            }
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => event
                .paths
                .iter()
                .filter(|path| self.being_written.remove(*path))
                .map(WatchedEvent::file)
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                let was_being_written = event
                    .paths
                    .iter()
                    .any(|path| self.being_written.remove(path));
                self.last_rename_from = event
                    .tracker()
                    .map(|tracker| (tracker, was_being_written));
                Vec::new()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let tracker = event.tracker();
                if let Some((from_tracker, was_being_written)) = self.last_rename_from.take() {
                    if tracker == Some(from_tracker) {
                        // Renamed inside the directory: not new, but a file
                        // still being written keeps waiting under its new name.
                        if was_being_written {
                            self.being_written.extend(event.paths.iter().cloned());
                        }
                        return Vec::new();
                    }
                }
                event
                    .paths
                    .iter()
                    .map(|path| WatchedEvent::new(path, path.is_dir()))
                    .collect()
            }
            EventKind::Remove(_) => {
                for path in &event.paths {
                    self.being_written.remove(path);
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.being_written.len()
    }
}

fn is_directory(kind: CreateKind, path: &Path) -> bool {
    match kind {
        CreateKind::Folder => true,
        CreateKind::File => false,
        _ => path.is_dir(),
    }
}
