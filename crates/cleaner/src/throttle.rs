//! Inter-deletion pause with a live override
//!
//! Operators slow a running job down by writing a number of milliseconds to
//! `<state_dir>/pause-ms`. The file is re-read before every pause, so the
//! override applies without restarting; removing it restores the configured
//! value.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the pause override inside the state directory
pub const PAUSE_MARKER: &str = "pause-ms";

#[derive(Debug, Clone, Default)]
pub struct Throttle {
    configured: Option<Duration>,
    override_file: Option<PathBuf>,
}

impl Throttle {
    pub fn new(configured: Option<Duration>, state_dir: Option<&Path>) -> Self {
        Self {
            configured,
            override_file: state_dir.map(|dir| dir.join(PAUSE_MARKER)),
        }
    }

    /// Pause that applies right now
    pub fn current_pause(&self) -> Option<Duration> {
        let file = match &self.override_file {
            Some(file) => file,
            None => return self.configured,
        };
        match std::fs::read_to_string(file) {
            Ok(content) => match content.trim().parse::<i64>() {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms as u64)),
                Ok(_) => None,
                Err(_) => {
                    tracing::warn!(file = %file.display(), "Ignoring unparsable pause override");
                    self.configured
                }
            },
            Err(_) => self.configured,
        }
    }

    /// Sleep for the current pause, if any
    pub fn pause(&self) {
        if let Some(duration) = self.current_pause() {
            std::thread::sleep(duration);
        }
    }
}

/// Write a live pause override for a run using `state_dir`
pub fn set_pause_override(state_dir: &Path, millis: i64) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(state_dir)?;
    let file = state_dir.join(PAUSE_MARKER);
    std::fs::write(&file, millis.to_string())?;
    Ok(file)
}

/// Remove the override; returns whether one was present
pub fn clear_pause_override(state_dir: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(state_dir.join(PAUSE_MARKER)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn read_pause_override(state_dir: &Path) -> Option<i64> {
    std::fs::read_to_string(state_dir.join(PAUSE_MARKER))
        .ok()
        .and_then(|content| content.trim().parse().ok())
}
