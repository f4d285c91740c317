//! Optional reindex of the edit workspace before cleaning

use crate::interrupt::InterruptionController;
use crate::util::format_duration;
use crate::Result;
use std::time::{Duration, Instant};
use store::SearchIndex;

/// Start a reindex of `workspace` and wait for it
///
/// Returns false when interrupted before or while waiting.
pub fn reindex_workspace(
    index: &dyn SearchIndex,
    workspace: &str,
    controller: &InterruptionController,
    poll_interval: Duration,
) -> Result<bool> {
    if !controller.can_continue() {
        return Ok(false);
    }

    tracing::info!(workspace = workspace, "Starting to reindex workspace");
    let start = Instant::now();
    index.start_reindex(workspace)?;

    while index.reindex_in_progress(workspace)? {
        if !controller.can_continue() {
            tracing::info!(workspace = workspace, "Stopped waiting for reindexing");
            return Ok(false);
        }
        std::thread::sleep(poll_interval);
    }

    tracing::info!(
        workspace = workspace,
        "Finished reindexing workspace in {}",
        format_duration(start.elapsed())
    );
    Ok(true)
}
