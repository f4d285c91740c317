//! Run orchestration
//!
//! `Cleaner` owns the configuration, the collaborators and the interruption
//! handle. A run takes the exclusivity lock, optionally reindexes, walks the
//! version namespace and reports its statistics.

use crate::context::{CleanerContext, Collaborators};
use crate::interrupt::InterruptHandle;
use crate::lock::RunLock;
use crate::reindex::reindex_workspace;
use crate::stats::RunStatistics;
use crate::walker::{walk, WalkOutcome};
use crate::{CleanerConfig, CleanerError, Result};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct Cleaner {
    config: CleanerConfig,
    collaborators: Collaborators,
    handle: InterruptHandle,
}

/// What `Cleaner::execute` produced
pub enum Execution {
    Finished(RunStatistics),
    Background(RunHandle),
}

/// A run executing on a background thread
pub struct RunHandle {
    handle: InterruptHandle,
    thread: JoinHandle<Result<RunStatistics>>,
}

impl RunHandle {
    /// Ask the run to stop at its next suspension point
    pub fn interrupt(&self) {
        self.handle.interrupt();
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.handle.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run to end
    pub fn join(self) -> Result<RunStatistics> {
        self.thread
            .join()
            .map_err(|_| CleanerError::Worker("cleanup thread panicked".to_string()))?
    }
}

impl Cleaner {
    /// Validate the configuration and bind the collaborators
    pub fn new(config: CleanerConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            collaborators,
            handle: InterruptHandle::new(),
        })
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Handle that interrupts this cleaner's runs
    ///
    /// Once raised it stays raised; later runs stop immediately.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.handle.clone()
    }

    /// Run synchronously
    pub fn run(&self) -> Result<RunStatistics> {
        self.check_preconditions()?;
        let _lock = RunLock::acquire(&self.config.state_dir())?;
        tracing::debug!(config = %self.config.describe(), "Starting cleanup");

        let mut ctx = CleanerContext::new(self.config.clone(), &self.collaborators, self.handle.clone());
        let mut interrupted = false;

        if self.config.reindex_default_workspace {
            if let Some(index) = &self.collaborators.index {
                let finished = reindex_workspace(
                    index.as_ref(),
                    ctx.edit.workspace(),
                    &ctx.controller,
                    Duration::from_millis(self.config.reindex_poll_interval_ms),
                )?;
                interrupted |= !finished;
            }
        }

        if !interrupted {
            if self.config.scans_versions_tree() {
                interrupted = walk(&mut ctx, &self.config.root_path())? == WalkOutcome::Interrupted;
            } else {
                tracing::info!("Nothing to do: no retention, orphan deletion or integrity check requested");
            }
        }

        let mut stats = ctx.stats;
        stats.interrupted = interrupted;
        stats.elapsed_ms = ctx.controller.elapsed().as_millis() as u64;
        stats.log_summary();
        Ok(stats)
    }

    /// Run on a background thread
    pub fn spawn(self) -> Result<RunHandle> {
        let handle = self.handle.clone();
        let thread = std::thread::Builder::new()
            .name("versions-cleaner".to_string())
            .spawn(move || self.run())?;
        Ok(RunHandle { handle, thread })
    }

    /// Run in the foreground or the background, as configured
    pub fn execute(self) -> Result<Execution> {
        if self.config.run_asynchronously {
            tracing::info!("Running cleanup asynchronously");
            Ok(Execution::Background(self.spawn()?))
        } else {
            Ok(Execution::Finished(self.run()?))
        }
    }

    /// Configuration errors abort before the store is touched
    fn check_preconditions(&self) -> Result<()> {
        if self.config.check_integrity && self.collaborators.mappings.is_none() {
            return Err(CleanerError::MissingExternalMappings);
        }
        if self.config.reindex_default_workspace && self.collaborators.index.is_none() {
            return Err(CleanerError::Config(
                "reindexing requested but no search index is configured".to_string(),
            ));
        }
        Ok(())
    }
}
