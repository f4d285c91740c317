//! Per-history processing: integrity pass, classification, dispatch

use crate::context::CleanerContext;
use crate::integrity;
use crate::orphan::{self, Classification};
use crate::retention;
use crate::Result;
use store::Node;

/// Process one version history
///
/// Errors abort this history only; the walker logs them and moves on.
pub fn process_history(ctx: &mut CleanerContext, history: &Node) -> Result<()> {
    if ctx.config.check_integrity && integrity::check_and_count(ctx, history).node_removed {
        return Ok(());
    }

    if !ctx.config.delete_orphaned_versions && !ctx.config.deletes_retained_versions() {
        return Ok(());
    }
    if !ctx.can_continue() {
        return Ok(());
    }

    match orphan::classify_history(ctx, history)? {
        Classification::Orphaned => {
            tracing::debug!(history = %history.path, "Orphaned history");
            orphan::purge(ctx, history)
        }
        Classification::Retained => retention::keep_last_n(ctx, history).map(|_| ()),
    }
}
