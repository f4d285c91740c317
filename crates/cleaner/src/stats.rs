//! Run statistics

use crate::util::format_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters for one run, split between orphaned and retained histories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub deleted_versions: u64,
    pub deleted_histories: u64,
    pub deleted_orphan_versions: u64,
    pub deleted_orphan_histories: u64,
    pub processed_histories: u64,
    pub dangling_references: u64,
    pub repaired_references: u64,
    /// The run stopped early (interruption or deadline)
    pub interrupted: bool,
    pub elapsed_ms: u64,
}

impl RunStatistics {
    pub fn track_deleted_versions(&mut self, count: u64, orphan: bool) {
        if orphan {
            self.deleted_orphan_versions += count;
        } else {
            self.deleted_versions += count;
        }
    }

    pub fn track_deleted_history(&mut self, orphan: bool) {
        if orphan {
            self.deleted_orphan_histories += 1;
        } else {
            self.deleted_histories += 1;
        }
    }

    pub fn total_deleted_versions(&self) -> u64 {
        self.deleted_versions + self.deleted_orphan_versions
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            processed_histories = self.processed_histories,
            deleted_versions = self.deleted_versions,
            deleted_histories = self.deleted_histories,
            deleted_orphan_versions = self.deleted_orphan_versions,
            deleted_orphan_histories = self.deleted_orphan_histories,
            interrupted = self.interrupted,
            "Cleanup {} in {}",
            if self.interrupted { "interrupted" } else { "completed" },
            format_duration(self.elapsed())
        );
        if self.dangling_references > 0 {
            tracing::info!(
                dangling = self.dangling_references,
                repaired = self.repaired_references,
                "Dangling references found"
            );
        }
    }
}
