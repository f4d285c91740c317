//! Shared fixtures for cleaner integration tests

#![allow(dead_code)]

use cleaner::{Cleaner, CleanerConfig, Collaborators, RunStatistics};
use std::sync::Arc;
use store::{
    MemoryMappings, MemoryRepository, MemorySession, Node, NodeId, Session, EDIT_WORKSPACE,
    LIVE_WORKSPACE, VERSION_STORAGE_PATH,
};
use tempfile::TempDir;

/// Repository plus a private state directory
pub struct TestStore {
    pub repo: MemoryRepository,
    pub edit: Arc<MemorySession>,
    pub live: Arc<MemorySession>,
    pub mappings: Arc<MemoryMappings>,
    pub state_dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        let repo = MemoryRepository::new();
        Self {
            edit: Arc::new(repo.session(EDIT_WORKSPACE)),
            live: Arc::new(repo.session(LIVE_WORKSPACE)),
            mappings: Arc::new(MemoryMappings::new()),
            state_dir: TempDir::new().expect("temp dir"),
            repo,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(self.edit.clone(), self.live.clone()).with_mappings(self.mappings.clone())
    }

    /// Configuration pointing at this store's state directory
    pub fn config(&self) -> CleanerConfig {
        CleanerConfig {
            state_dir: Some(self.state_dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    pub fn cleaner(&self, config: CleanerConfig) -> Cleaner {
        Cleaner::new(config, self.collaborators()).expect("valid config")
    }

    pub fn run(&self, config: CleanerConfig) -> RunStatistics {
        self.cleaner(config).run().expect("run succeeds")
    }

    /// Content node in the edit workspace, used as a version source
    pub fn source(&self, path: &str) -> NodeId {
        self.repo.add_node(EDIT_WORKSPACE, path, &["jnt:page"])
    }

    /// History of `count` versions (root excluded) frozen from `source`
    pub fn history(&self, path: &str, source: Option<NodeId>, count: usize) -> NodeId {
        self.repo.add_simple_history(path, source, count)
    }

    pub fn names(&self, history: &NodeId) -> Vec<String> {
        self.repo.version_names(history).unwrap_or_default()
    }

    pub fn history_node(&self, path: &str) -> Node {
        self.edit.get_node(&storage_path(path)).expect("history node")
    }

    pub fn saved_position(&self) -> Option<String> {
        std::fs::read_to_string(self.state_dir.path().join(cleaner::checkpoint::CHECKPOINT_FILE))
            .ok()
            .map(|s| s.trim().to_string())
    }
}

/// Absolute path of `relative` inside the version namespace
pub fn storage_path(relative: &str) -> String {
    format!("{}{}", VERSION_STORAGE_PATH, relative)
}

pub fn version_names(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("1.{}", i)).collect()
}
