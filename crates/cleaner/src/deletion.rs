//! Reference-safe deletion of versions
//!
//! A version can only go once nothing references it. Candidates still
//! referenced are deferred to the next pass; references held by other
//! candidates disappear as those are deleted, so repeating passes reaches a
//! fixed point in at most `|candidates|` passes.

use crate::interrupt::InterruptionController;
use crate::throttle::Throttle;
use store::{Node, Session, StoreError};

/// Result of a single pass over a candidate list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub deleted: Vec<String>,
    /// Still referenced (or not reached before interruption), retry later
    pub skipped: Vec<String>,
    /// Could not be looked up or deleted, never retried
    pub failed: Vec<String>,
    pub interrupted: bool,
}

/// Try every candidate once
pub fn delete_pass(
    session: &dyn Session,
    history: &Node,
    candidates: &[String],
    controller: &InterruptionController,
    throttle: &Throttle,
) -> PassOutcome {
    let mut outcome = PassOutcome::default();

    for (i, name) in candidates.iter().enumerate() {
        if !controller.can_continue() {
            outcome.interrupted = true;
            outcome.skipped.extend(candidates[i..].iter().cloned());
            break;
        }

        if let Err(e) = session.get_version(&history.id, name) {
            tracing::warn!(history = %history.path, version = %name, "Failed to load version: {}", e);
            outcome.failed.push(name.clone());
            continue;
        }

        match session.version_reference_count(&history.id, name) {
            Ok(0) => {}
            Ok(count) => {
                tracing::debug!(history = %history.path, version = %name, references = count, "Version still referenced, deferring");
                outcome.skipped.push(name.clone());
                continue;
            }
            Err(e) => {
                tracing::warn!(history = %history.path, version = %name, "Failed to count references: {}", e);
                outcome.failed.push(name.clone());
                continue;
            }
        }

        match session.remove_version(&history.id, name) {
            Ok(()) => {
                tracing::debug!(history = %history.path, version = %name, "Deleted version");
                outcome.deleted.push(name.clone());
                throttle.pause();
            }
            Err(StoreError::ReferentialIntegrity { count, .. }) => {
                tracing::debug!(history = %history.path, version = %name, references = count, "Version referenced at deletion time, deferring");
                outcome.skipped.push(name.clone());
            }
            Err(e) => {
                tracing::warn!(history = %history.path, version = %name, "Failed to delete version: {}", e);
                outcome.failed.push(name.clone());
            }
        }
    }

    outcome
}

/// Totals of a full deletion loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    pub deleted: u64,
    pub passes: usize,
    /// Candidates left referenced at the fixed point
    pub remaining: Vec<String>,
    pub failed: Vec<String>,
    pub interrupted: bool,
}

/// Repeat passes until nothing more can be deleted
pub fn delete_versions(
    session: &dyn Session,
    history: &Node,
    candidates: Vec<String>,
    controller: &InterruptionController,
    throttle: &Throttle,
) -> DeletionSummary {
    let mut summary = DeletionSummary::default();
    let mut working = candidates;

    while !working.is_empty() {
        if !controller.can_continue() {
            summary.interrupted = true;
            break;
        }

        let outcome = delete_pass(session, history, &working, controller, throttle);
        summary.passes += 1;
        summary.deleted += outcome.deleted.len() as u64;
        summary.failed.extend(outcome.failed);
        let progressed = !outcome.deleted.is_empty();
        working = outcome.skipped;

        if outcome.interrupted {
            summary.interrupted = true;
            break;
        }
        if !progressed {
            break;
        }
    }
    summary.remaining = working;

    if summary.deleted > 0 || !summary.remaining.is_empty() {
        tracing::info!(
            history = %history.path,
            deleted = summary.deleted,
            still_referenced = summary.remaining.len(),
            passes = summary.passes,
            "Deleted versions"
        );
    }
    summary
}
