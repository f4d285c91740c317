//! Cleanup run configuration
//!
//! One `CleanerConfig` is owned by a run and shared read-only by every
//! component. It is (de)serialisable so it can live in a TOML file.

use crate::{CleanerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use store::{join_path, types, VERSION_STORAGE_PATH};

/// Name of the default state directory under the system temp dir
pub const STATE_DIR_NAME: &str = "versions-cleaner";

/// Policy knobs for one cleanup run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Trigger and wait for a reindex of the edit workspace first (default: false)
    pub reindex_default_workspace: bool,

    /// Check reference properties of each history before cleaning it (default: false)
    pub check_integrity: bool,

    /// Repair dangling references found by the integrity check (default: true)
    pub repair_integrity: bool,

    /// Number of versions to keep per history; negative disables pruning (default: -1)
    pub keep_last: i64,

    /// Wall-clock budget in milliseconds, 0 = unbounded (default: 0)
    pub max_execution_time_ms: u64,

    /// Purge histories whose source object no longer exists (default: false)
    pub delete_orphaned_versions: bool,

    /// Only walk this part of the version namespace (default: whole namespace)
    pub subtree_path: Option<String>,

    /// Pause between two deletions in milliseconds, <= 0 = none (default: -1)
    pub pause_ms: i64,

    /// Subtrees never visited
    pub skipped_paths: Vec<String>,

    /// Resume from the saved traversal position (default: true)
    pub restart_from_last_position: bool,

    /// Run on a background thread and return immediately (default: false)
    pub run_asynchronously: bool,

    /// Orphaned histories above this many versions are deleted version by
    /// version before the bulk purge (default: 1000)
    pub long_history_threshold: u64,

    /// Iterate versions through the versioning API instead of raw child
    /// nodes (default: false)
    pub use_versioning_api: bool,

    /// Refresh sessions every this many histories (default: 100)
    pub session_refresh_interval: u64,

    /// Node types deleted outright when they hold a dangling reference
    pub cascade_delete_types: Vec<String>,

    /// Poll interval while waiting for a reindex (default: 1000)
    pub reindex_poll_interval_ms: u64,

    /// Checkpoint and marker directory (default: `<temp>/versions-cleaner`)
    pub state_dir: Option<PathBuf>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            reindex_default_workspace: false,
            check_integrity: false,
            repair_integrity: true,
            keep_last: -1,
            max_execution_time_ms: 0,
            delete_orphaned_versions: false,
            subtree_path: None,
            pause_ms: -1,
            skipped_paths: Vec::new(),
            restart_from_last_position: true,
            run_asynchronously: false,
            long_history_threshold: 1000,
            use_versioning_api: false,
            session_refresh_interval: 100,
            cascade_delete_types: vec![
                types::HIERARCHY_NODE.to_string(),
                types::MEMBER.to_string(),
                types::REFERENCE.to_string(),
            ],
            reindex_poll_interval_ms: 1000,
            state_dir: None,
        }
    }
}

impl CleanerConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.long_history_threshold == 0 {
            return Err(CleanerError::Config(
                "long_history_threshold must be greater than 0".to_string(),
            ));
        }
        if self.session_refresh_interval == 0 {
            return Err(CleanerError::Config(
                "session_refresh_interval must be greater than 0".to_string(),
            ));
        }
        if let Some(subtree) = &self.subtree_path {
            if !subtree.starts_with('/') {
                return Err(CleanerError::Config(format!(
                    "subtree_path must be absolute: {}",
                    subtree
                )));
            }
        }
        if let Some(path) = self.skipped_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(CleanerError::Config(format!(
                "skipped paths must be absolute: {}",
                path
            )));
        }
        Ok(())
    }

    pub fn deletes_retained_versions(&self) -> bool {
        self.keep_last >= 0
    }

    /// Whether there is anything to do in the version namespace
    pub fn scans_versions_tree(&self) -> bool {
        self.delete_orphaned_versions || self.deletes_retained_versions() || self.check_integrity
    }

    pub fn max_execution_time(&self) -> Option<Duration> {
        (self.max_execution_time_ms > 0).then(|| Duration::from_millis(self.max_execution_time_ms))
    }

    pub fn pause(&self) -> Option<Duration> {
        (self.pause_ms > 0).then(|| Duration::from_millis(self.pause_ms as u64))
    }

    /// Absolute path the walk starts from
    pub fn root_path(&self) -> String {
        match &self.subtree_path {
            Some(subtree) => in_version_storage(subtree),
            None => VERSION_STORAGE_PATH.to_string(),
        }
    }

    /// Skip list resolved to absolute version namespace paths
    pub fn skipped_path_set(&self) -> HashSet<String> {
        self.skipped_paths.iter().map(|p| in_version_storage(p)).collect()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(STATE_DIR_NAME))
    }

    /// One-line rendering for the debug log
    pub fn describe(&self) -> String {
        format!(
            "reindexDefaultWorkspace: {}, checkIntegrity: {}, repairIntegrity: {}, keepLast: {}, \
             maxExecutionTimeInMs: {}, deleteOrphanedVersions: {}, subtreePath: {:?}, \
             pauseDuration: {}, skippedPaths: {:?}, restartFromLastPosition: {}, \
             runAsynchronously: {}, longHistoryThreshold: {}, useVersioningApi: {}, \
             sessionRefreshInterval: {}",
            self.reindex_default_workspace,
            self.check_integrity,
            self.repair_integrity,
            self.keep_last,
            self.max_execution_time_ms,
            self.delete_orphaned_versions,
            self.subtree_path,
            self.pause_ms,
            self.skipped_paths,
            self.restart_from_last_position,
            self.run_asynchronously,
            self.long_history_threshold,
            self.use_versioning_api,
            self.session_refresh_interval,
        )
    }
}

/// Paths are accepted both absolute and relative to the version namespace
fn in_version_storage(path: &str) -> String {
    if path == VERSION_STORAGE_PATH || path.starts_with(&format!("{}/", VERSION_STORAGE_PATH)) {
        path.trim_end_matches('/').to_string()
    } else {
        let relative = path.trim_matches('/');
        if relative.is_empty() {
            VERSION_STORAGE_PATH.to_string()
        } else {
            join_path(VERSION_STORAGE_PATH, relative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CleanerConfig::default();

        assert!(!config.deletes_retained_versions());
        assert!(!config.scans_versions_tree());
        assert!(config.restart_from_last_position);
        assert_eq!(config.long_history_threshold, 1000);
        assert_eq!(config.session_refresh_interval, 100);
        assert_eq!(config.max_execution_time(), None);
        assert_eq!(config.pause(), None);
        assert_eq!(config.root_path(), VERSION_STORAGE_PATH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_paths_resolve_into_version_storage() {
        let config = CleanerConfig {
            subtree_path: Some("/aa/bb".to_string()),
            skipped_paths: vec![
                "/cc".to_string(),
                format!("{}/dd", VERSION_STORAGE_PATH),
            ],
            ..Default::default()
        };

        assert_eq!(config.root_path(), format!("{}/aa/bb", VERSION_STORAGE_PATH));
        let skipped = config.skipped_path_set();
        assert!(skipped.contains(&format!("{}/cc", VERSION_STORAGE_PATH)));
        assert!(skipped.contains(&format!("{}/dd", VERSION_STORAGE_PATH)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_threshold = CleanerConfig {
            long_history_threshold: 0,
            ..Default::default()
        };
        assert!(zero_threshold.validate().is_err());

        let relative_subtree = CleanerConfig {
            subtree_path: Some("aa".to_string()),
            ..Default::default()
        };
        assert!(relative_subtree.validate().is_err());

        let relative_skip = CleanerConfig {
            skipped_paths: vec!["aa".to_string()],
            ..Default::default()
        };
        assert!(relative_skip.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = CleanerConfig {
            max_execution_time_ms: 1500,
            pause_ms: 20,
            ..Default::default()
        };
        assert_eq!(config.max_execution_time(), Some(Duration::from_millis(1500)));
        assert_eq!(config.pause(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_config_serialization() {
        let config = CleanerConfig {
            keep_last: 2,
            delete_orphaned_versions: true,
            ..Default::default()
        };
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: CleanerConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.keep_last, 2);
        assert!(parsed.delete_orphaned_versions);
        assert_eq!(parsed.cascade_delete_types, config.cascade_delete_types);

        // Missing keys fall back to defaults
        let partial: CleanerConfig = toml::from_str("keep_last = 5").unwrap();
        assert_eq!(partial.keep_last, 5);
        assert_eq!(partial.long_history_threshold, 1000);
    }
}
