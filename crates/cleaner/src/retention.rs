//! Keep-last-N retention

use crate::context::CleanerContext;
use crate::deletion::delete_versions;
use crate::integrity;
use crate::versions::{open_versions, VersionIterator};
use crate::Result;
use store::Node;

/// Names of the oldest versions beyond `keep`, root excluded
///
/// `iter.size()` counts the root sentinel, which is always retained on top
/// of the `keep` newest versions.
pub fn select_candidates(iter: &mut dyn VersionIterator, keep: i64) -> Result<Vec<String>> {
    if keep < 0 {
        return Ok(Vec::new());
    }
    let total = iter.size() as u64;
    let keep = keep as u64;
    if total.saturating_sub(1) <= keep {
        return Ok(Vec::new());
    }

    let wanted = (total - 1 - keep) as usize;
    let mut candidates = Vec::with_capacity(wanted);
    while candidates.len() < wanted {
        let version = iter.next_version()?;
        if version.is_root() {
            continue;
        }
        candidates.push(version.name);
    }
    Ok(candidates)
}

/// Apply the keep-last-N policy to a retained history
///
/// Returns the number of versions deleted.
pub fn keep_last_n(ctx: &mut CleanerContext, history: &Node) -> Result<u64> {
    if !ctx.config.deletes_retained_versions() {
        return Ok(0);
    }
    let candidates = {
        let mut versions = open_versions(ctx.edit.as_ref(), history, ctx.config.use_versioning_api)?;
        select_candidates(versions.as_mut(), ctx.config.keep_last)?
    };
    if candidates.is_empty() {
        return Ok(0);
    }
    tracing::debug!(history = %history.path, candidates = candidates.len(), "Pruning old versions");
    if ctx.config.check_integrity {
        check_versions(ctx, history, &candidates);
    }

    let summary = delete_versions(
        ctx.edit.as_ref(),
        history,
        candidates,
        &ctx.controller,
        &ctx.throttle,
    );
    ctx.stats.track_deleted_versions(summary.deleted, false);
    Ok(summary.deleted)
}

/// Integrity pass over the versions about to be deleted
fn check_versions(ctx: &mut CleanerContext, history: &Node, names: &[String]) {
    for name in names {
        let version = ctx
            .edit
            .get_version(&history.id, name)
            .and_then(|version| ctx.edit.find_node_by_id(&version.id));
        match version {
            Ok(Some(node)) => {
                integrity::check_and_count(ctx, &node);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(history = %history.path, version = %name, "Failed to load version for integrity check: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::ApiVersionIterator;
    use store::{MemoryRepository, Session, EDIT_WORKSPACE, VERSION_STORAGE_PATH};

    fn iterator(versions: usize) -> ApiVersionIterator {
        let repo = MemoryRepository::new();
        repo.add_simple_history("/h", None, versions);
        let session = repo.session(EDIT_WORKSPACE);
        let node = session
            .get_node(&format!("{}/h", VERSION_STORAGE_PATH))
            .unwrap();
        ApiVersionIterator::open(&session, &node).unwrap()
    }

    #[test]
    fn test_oldest_versions_selected() {
        // root + 4 versions, keep 2
        let candidates = select_candidates(&mut iterator(4), 2).unwrap();
        assert_eq!(candidates, vec!["1.0".to_string(), "1.1".to_string()]);
    }

    #[test]
    fn test_nothing_selected_within_budget() {
        assert!(select_candidates(&mut iterator(2), 2).unwrap().is_empty());
        assert!(select_candidates(&mut iterator(3), -1).unwrap().is_empty());
        assert!(select_candidates(&mut iterator(0), 0).unwrap().is_empty());
    }

    #[test]
    fn test_huge_keep_selects_nothing() {
        assert!(select_candidates(&mut iterator(3), i64::MAX).unwrap().is_empty());
        assert!(select_candidates(&mut iterator(0), i64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_keep_zero_selects_every_non_root_version() {
        let candidates = select_candidates(&mut iterator(3), 0).unwrap();
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|name| name != store::ROOT_VERSION));
    }
}
