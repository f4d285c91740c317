//! Cooperative cancellation
//!
//! A run stops when its shared flag is raised, when the one-shot marker file
//! appears in the state directory, or when the wall-clock budget runs out.
//! Once stopped, a run never resumes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// File name of the interruption marker inside the state directory
pub const INTERRUPT_MARKER: &str = "interrupt";

/// Shared cancellation flag, settable from outside the run
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Decides, at every suspension point, whether the run may go on
#[derive(Debug)]
pub struct InterruptionController {
    handle: InterruptHandle,
    started: Instant,
    budget: Option<Duration>,
    marker: Option<PathBuf>,
}

impl InterruptionController {
    /// `budget` is measured from now; `marker` is watched when given
    pub fn new(handle: InterruptHandle, budget: Option<Duration>, marker: Option<PathBuf>) -> Self {
        Self {
            handle,
            started: Instant::now(),
            budget,
            marker,
        }
    }

    /// Controller with no budget and no marker
    pub fn unbounded(handle: InterruptHandle) -> Self {
        Self::new(handle, None, None)
    }

    pub fn handle(&self) -> &InterruptHandle {
        &self.handle
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True once an interruption was requested
    ///
    /// A marker file is consumed when observed.
    pub fn needs_to_interrupt(&self) -> bool {
        if self.handle.is_interrupted() {
            return true;
        }
        if let Some(marker) = &self.marker {
            if marker.exists() {
                tracing::info!(marker = %marker.display(), "Interrupting the process");
                if let Err(e) = std::fs::remove_file(marker) {
                    tracing::warn!(marker = %marker.display(), "Failed to clear interruption marker: {}", e);
                }
                self.handle.interrupt();
                return true;
            }
        }
        false
    }

    /// False when interrupted or past the deadline
    pub fn can_continue(&self) -> bool {
        if self.needs_to_interrupt() {
            return false;
        }
        if let Some(budget) = self.budget {
            if self.started.elapsed() >= budget {
                tracing::info!(budget_ms = budget.as_millis() as u64, "Maximum execution time reached");
                self.handle.interrupt();
                return false;
            }
        }
        true
    }
}

pub fn marker_path(state_dir: &Path) -> PathBuf {
    state_dir.join(INTERRUPT_MARKER)
}

/// Drop the interruption marker for a run watching `state_dir`
pub fn request_interrupt(state_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(state_dir)?;
    let marker = marker_path(state_dir);
    std::fs::write(&marker, b"")?;
    Ok(marker)
}
