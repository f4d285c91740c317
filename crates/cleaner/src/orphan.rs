//! Orphaned history detection and purge

use crate::context::CleanerContext;
use crate::deletion::delete_versions;
use crate::versions::{open_versions, VersionIterator};
use crate::Result;
use store::{Node, NodeId, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The source object is gone from every inspected workspace
    Orphaned,
    Retained,
}

/// Classify a history by its source object
///
/// Only the first non-root version carrying a source identifier is
/// looked at; histories without one are retained.
pub fn classify(
    versions: &mut dyn VersionIterator,
    edit: &dyn Session,
    live: &dyn Session,
) -> Result<Classification> {
    let source = versions
        .filter(|v| !v.is_root())
        .find_map(|v| v.frozen_uuid);

    match source {
        Some(source) if !resolves(&source, edit, live)? => Ok(Classification::Orphaned),
        _ => Ok(Classification::Retained),
    }
}

fn resolves(id: &NodeId, edit: &dyn Session, live: &dyn Session) -> Result<bool> {
    if edit.find_node_by_id(id)?.is_some() {
        return Ok(true);
    }
    Ok(live.find_node_by_id(id)?.is_some())
}

pub fn classify_history(ctx: &CleanerContext, history: &Node) -> Result<Classification> {
    let mut versions = open_versions(ctx.edit.as_ref(), history, ctx.config.use_versioning_api)?;
    classify(versions.as_mut(), ctx.edit.as_ref(), ctx.live.as_ref())
}

/// Remove an orphaned history
///
/// Histories above the long-history threshold are first thinned version by
/// version, and only bulk purged once small enough. Partial progress stays
/// durable; a later run picks the rest up.
pub fn purge(ctx: &mut CleanerContext, history: &Node) -> Result<()> {
    if !ctx.config.delete_orphaned_versions {
        return Ok(());
    }
    let threshold = ctx.config.long_history_threshold as usize;
    let use_api = ctx.config.use_versioning_api;

    let size = open_versions(ctx.edit.as_ref(), history, use_api)?.size();
    if size > threshold {
        tracing::info!(history = %history.path, versions = size, "Long orphaned history, deleting versions one by one");
        let names: Vec<String> = open_versions(ctx.edit.as_ref(), history, use_api)?
            .filter(|v| !v.is_root())
            .map(|v| v.name)
            .collect();
        let summary = delete_versions(
            ctx.edit.as_ref(),
            history,
            names,
            &ctx.controller,
            &ctx.throttle,
        );
        ctx.stats.track_deleted_versions(summary.deleted, true);
        if summary.interrupted {
            return Ok(());
        }

        let remaining = open_versions(ctx.edit.as_ref(), history, use_api)?.size();
        if remaining > threshold {
            tracing::info!(history = %history.path, remaining, "Orphaned history still too long, leaving it for a later run");
            return Ok(());
        }
    }

    let counts = ctx.edit.purge_histories(&[history.id])?;
    if counts.total() > 0 {
        tracing::info!(
            history = %history.path,
            versions = counts.versions_removed,
            "Purged orphaned history"
        );
        ctx.stats.track_deleted_versions(counts.versions_removed, true);
        ctx.stats.track_deleted_history(true);
    } else {
        tracing::debug!(history = %history.path, "Orphaned history not purged");
    }
    Ok(())
}
