//! Depth-first walk of the version namespace

use crate::context::CleanerContext;
use crate::policy::process_history;
use crate::Result;
use store::{types, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Reached the end of the tree
    Completed,
    /// Stopped early; the position is kept for the next run
    Interrupted,
}

/// Walk the tree under `root`, processing every version history
///
/// Only an unreadable root is an error. The checkpoint is cleared on
/// completion and saved otherwise.
pub fn walk(ctx: &mut CleanerContext, root: &str) -> Result<WalkOutcome> {
    let root_node = ctx.edit.get_node(root)?;
    tracing::info!(root = %root_node.path, "Scanning version histories");

    let completed = if !ctx.can_continue() {
        false
    } else if ctx.is_skipped(&root_node.path) {
        tracing::info!(path = %root_node.path, "Skipping node");
        true
    } else if root_node.is_node_type(types::VERSION_HISTORY) {
        visit_history(ctx, &root_node)
    } else {
        visit_children(ctx, &root_node.path)
    };

    ctx.finish_traversal(completed);
    Ok(if completed {
        WalkOutcome::Completed
    } else {
        WalkOutcome::Interrupted
    })
}

/// Returns false once the run must stop
fn visit_children(ctx: &mut CleanerContext, path: &str) -> bool {
    let children = match ctx.edit.get_children(path) {
        Ok(children) => children,
        Err(e) => {
            tracing::warn!(path = path, "Failed to list children: {}", e);
            return true;
        }
    };

    for child in children {
        if !ctx.can_continue() {
            return false;
        }
        if ctx.is_skipped(&child.path) {
            tracing::info!(path = %child.path, "Skipping node");
            continue;
        }
        let keep_going = if child.is_node_type(types::VERSION_HISTORY) {
            visit_history(ctx, &child)
        } else {
            visit_children(ctx, &child.path)
        };
        if !keep_going {
            return false;
        }
    }
    true
}

fn visit_history(ctx: &mut CleanerContext, history: &Node) -> bool {
    if !ctx.can_continue() {
        return false;
    }
    if !ctx.can_process(&history.path) {
        tracing::debug!(history = %history.path, "Already processed in a previous run");
        return true;
    }
    if let Err(e) = process_history(ctx, history) {
        tracing::error!(history = %history.path, "Failed to process version history: {}", e);
    }
    ctx.history_processed();
    !ctx.needs_to_interrupt()
}
