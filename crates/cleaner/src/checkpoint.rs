//! Traversal checkpoint
//!
//! The position is the parent path of the last version history the walker
//! reached. It lives in a single file; no file means "start from the
//! beginning".

use std::path::{Path, PathBuf};

/// File name of the checkpoint inside the state directory
pub const CHECKPOINT_FILE: &str = "lastPosition.txt";

/// Loads and saves the traversal checkpoint
///
/// Storage problems disable persistence instead of failing the run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    file: Option<PathBuf>,
}

impl CheckpointStore {
    /// Checkpoint kept in `state_dir`
    pub fn open(state_dir: &Path) -> Self {
        match std::fs::create_dir_all(state_dir) {
            Ok(()) => Self {
                file: Some(state_dir.join(CHECKPOINT_FILE)),
            },
            Err(e) => {
                tracing::warn!(
                    dir = %state_dir.display(),
                    "Impossible to create the checkpoint directory, positions will not be saved: {}",
                    e
                );
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Saved position, if any
    pub fn load(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        match std::fs::read_to_string(file) {
            Ok(content) => content
                .lines()
                .next()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(file = %file.display(), "Impossible to read the last position: {}", e);
                None
            }
        }
    }

    /// Persist `position`, or clear the checkpoint with `None`
    pub fn save(&self, position: Option<&str>) {
        let file = match &self.file {
            Some(file) => file,
            None => return,
        };
        let result = match position {
            Some(position) => write_atomically(file, position),
            None => match std::fs::remove_file(file) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            tracing::warn!(file = %file.display(), "Impossible to save the last position: {}", e);
        }
    }
}

fn write_atomically(file: &Path, content: &str) -> std::io::Result<()> {
    let tmp = file.with_extension("txt.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, file)
}

/// Resume bookkeeping for one walk
///
/// While a saved position is being searched for, histories are suppressed
/// until one whose parent path equals it comes up. Siblings ahead of the
/// match under other parents are not revisited.
#[derive(Debug, Clone, Default)]
pub struct TraversalPosition {
    current: Option<String>,
    saved: Option<String>,
    searching: bool,
}

impl TraversalPosition {
    /// Position that processes everything
    pub fn start() -> Self {
        Self::default()
    }

    /// Position that skips ahead to `saved`
    pub fn resume_from(saved: Option<String>) -> Self {
        let searching = saved.is_some();
        Self {
            current: None,
            saved,
            searching,
        }
    }

    /// Record a history under `parent`; true when it must be processed
    pub fn visit(&mut self, parent: &str) -> bool {
        self.current = Some(parent.to_string());
        if !self.searching {
            return true;
        }
        if self.saved.as_deref() == Some(parent) {
            tracing::info!(position = parent, "Reached last saved position, resuming processing");
            self.searching = false;
            true
        } else {
            false
        }
    }

    /// Parent path of the last visited history
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn saved(&self) -> Option<&str> {
        self.saved.as_deref()
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }
}
