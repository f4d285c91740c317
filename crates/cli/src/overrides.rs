//! Command-line overrides of the configuration file
//!
//! Every option is optional: only flags that were given replace the value
//! loaded from the file. Boolean flags can only switch a behaviour on (or,
//! for the `--no-*`/`--report-only` flags, off).

use cleaner::CleanerConfig;
use clap::Args;

#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Versions to keep per history; negative disables pruning
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub keep_last: Option<i64>,

    /// Purge histories whose source object no longer exists
    #[arg(long)]
    pub delete_orphans: bool,

    /// Check reference properties of every history
    #[arg(long)]
    pub check_integrity: bool,

    /// Report dangling references without repairing them
    #[arg(long)]
    pub report_only: bool,

    /// Reindex the edit workspace before cleaning
    #[arg(long)]
    pub reindex: bool,

    /// Stop after this many milliseconds (0 = no limit)
    #[arg(long, value_name = "MS")]
    pub max_time: Option<u64>,

    /// Only walk this part of the version namespace
    #[arg(long, value_name = "PATH")]
    pub subtree: Option<String>,

    /// Pause between deletions in milliseconds (<= 0 = none)
    #[arg(long, value_name = "MS", allow_negative_numbers = true)]
    pub pause: Option<i64>,

    /// Subtree never visited (repeatable)
    #[arg(long = "skip", value_name = "PATH")]
    pub skipped_paths: Vec<String>,

    /// Ignore the saved traversal position and start from the beginning
    #[arg(long)]
    pub no_resume: bool,

    /// Run the cleanup on a background worker
    #[arg(long)]
    pub background: bool,

    /// Orphaned histories longer than this are thinned before purging
    #[arg(long, value_name = "N")]
    pub long_history_threshold: Option<u64>,

    /// Iterate versions through the versioning API
    #[arg(long)]
    pub versioning_api: bool,

    /// Refresh sessions every N histories
    #[arg(long, value_name = "N")]
    pub refresh_interval: Option<u64>,
}

impl ConfigOverrides {
    /// Apply the given flags on top of `config`
    pub fn apply(&self, config: &mut CleanerConfig) {
        if let Some(keep_last) = self.keep_last {
            config.keep_last = keep_last;
        }
        if self.delete_orphans {
            config.delete_orphaned_versions = true;
        }
        if self.check_integrity {
            config.check_integrity = true;
        }
        if self.report_only {
            config.repair_integrity = false;
        }
        if self.reindex {
            config.reindex_default_workspace = true;
        }
        if let Some(max_time) = self.max_time {
            config.max_execution_time_ms = max_time;
        }
        if let Some(subtree) = &self.subtree {
            config.subtree_path = Some(subtree.clone());
        }
        if let Some(pause) = self.pause {
            config.pause_ms = pause;
        }
        for path in &self.skipped_paths {
            if !config.skipped_paths.contains(path) {
                config.skipped_paths.push(path.clone());
            }
        }
        if self.no_resume {
            config.restart_from_last_position = false;
        }
        if self.background {
            config.run_asynchronously = true;
        }
        if let Some(threshold) = self.long_history_threshold {
            config.long_history_threshold = threshold;
        }
        if self.versioning_api {
            config.use_versioning_api = true;
        }
        if let Some(interval) = self.refresh_interval {
            config.session_refresh_interval = interval;
        }
    }
}
