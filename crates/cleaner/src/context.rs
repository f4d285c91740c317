//! Per-run state shared by every component
//!
//! The context is created once per run and handed down by `&mut` through the
//! walk; there is no ambient state.

use crate::checkpoint::{CheckpointStore, TraversalPosition};
use crate::config::CleanerConfig;
use crate::interrupt::{marker_path, InterruptHandle, InterruptionController};
use crate::stats::RunStatistics;
use crate::throttle::Throttle;
use std::collections::HashSet;
use std::sync::Arc;
use store::{parent_path, ExternalMappings, SearchIndex, Session};

/// Store-side collaborators of a run
#[derive(Clone)]
pub struct Collaborators {
    /// Session on the edit workspace; all mutations go through it
    pub edit: Arc<dyn Session>,
    /// Session on the live workspace, read only
    pub live: Arc<dyn Session>,
    /// Lookup of external mappings, needed by the integrity check
    pub mappings: Option<Arc<dyn ExternalMappings>>,
    /// Search index, needed by the reindex pre-pass
    pub index: Option<Arc<dyn SearchIndex>>,
}

impl Collaborators {
    pub fn new(edit: Arc<dyn Session>, live: Arc<dyn Session>) -> Self {
        Self {
            edit,
            live,
            mappings: None,
            index: None,
        }
    }

    pub fn with_mappings(mut self, mappings: Arc<dyn ExternalMappings>) -> Self {
        self.mappings = Some(mappings);
        self
    }

    pub fn with_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.index = Some(index);
        self
    }
}

pub struct CleanerContext {
    pub config: CleanerConfig,
    pub edit: Arc<dyn Session>,
    pub live: Arc<dyn Session>,
    pub mappings: Option<Arc<dyn ExternalMappings>>,
    pub controller: InterruptionController,
    pub throttle: Throttle,
    pub stats: RunStatistics,
    checkpoint: CheckpointStore,
    position: TraversalPosition,
    skipped: HashSet<String>,
    processed_since_refresh: u64,
}

impl CleanerContext {
    /// Context for a run; loads the checkpoint when resuming is enabled
    pub fn new(config: CleanerConfig, collaborators: &Collaborators, handle: InterruptHandle) -> Self {
        let state_dir = config.state_dir();
        let checkpoint = CheckpointStore::open(&state_dir);
        let position = if config.restart_from_last_position {
            let saved = checkpoint.load();
            if let Some(saved) = &saved {
                tracing::info!(position = %saved, "Restarting from last saved position");
            }
            TraversalPosition::resume_from(saved)
        } else {
            TraversalPosition::start()
        };

        Self {
            controller: InterruptionController::new(
                handle,
                config.max_execution_time(),
                Some(marker_path(&state_dir)),
            ),
            throttle: Throttle::new(config.pause(), Some(&state_dir)),
            skipped: config.skipped_path_set(),
            edit: Arc::clone(&collaborators.edit),
            live: Arc::clone(&collaborators.live),
            mappings: collaborators.mappings.clone(),
            stats: RunStatistics::default(),
            checkpoint,
            position,
            processed_since_refresh: 0,
            config,
        }
    }

    pub fn can_continue(&self) -> bool {
        self.controller.can_continue()
    }

    pub fn needs_to_interrupt(&self) -> bool {
        self.controller.needs_to_interrupt()
    }

    pub fn is_skipped(&self, path: &str) -> bool {
        self.skipped.contains(path)
    }

    /// Whether the history at `path` is processed or suppressed by resume
    pub fn can_process(&mut self, history_path: &str) -> bool {
        let parent = parent_path(history_path).unwrap_or("/");
        self.position.visit(parent)
    }

    pub fn position(&self) -> &TraversalPosition {
        &self.position
    }

    /// Count a processed history and refresh sessions when due
    pub fn history_processed(&mut self) {
        self.stats.processed_histories += 1;
        self.processed_since_refresh += 1;
        if self.processed_since_refresh >= self.config.session_refresh_interval {
            self.refresh_sessions();
        }
    }

    /// Drop session caches and flush the checkpoint
    pub fn refresh_sessions(&mut self) {
        self.processed_since_refresh = 0;
        for session in [&self.edit, &self.live] {
            if let Err(e) = session.refresh(false) {
                tracing::warn!(workspace = session.workspace(), "Failed to refresh session: {}", e);
            }
        }
        self.save_position();
    }

    /// Persist the current traversal position
    pub fn save_position(&self) {
        if let Some(current) = self.position.current() {
            self.checkpoint.save(Some(current));
        }
    }

    /// Flush the checkpoint at the end of a walk
    ///
    /// A complete traversal clears it so the next run starts over.
    pub fn finish_traversal(&self, completed: bool) {
        if completed {
            tracing::debug!("Traversal completed, clearing last position");
            self.checkpoint.save(None);
        } else {
            self.save_position();
        }
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }
}
