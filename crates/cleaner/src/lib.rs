//! Version history garbage collection
//!
//! This crate provides:
//! - Resumable depth-first walk of the version namespace
//! - Keep-last-N retention and orphaned history purge
//! - Reference-safe version deletion loop
//! - Reference integrity check & repair
//! - Checkpointing, cooperative interruption and run exclusivity

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod deletion;
pub mod error;
pub mod integrity;
pub mod interrupt;
pub mod lock;
pub mod orphan;
pub mod policy;
pub mod reindex;
pub mod retention;
pub mod runner;
pub mod stats;
pub mod throttle;
pub mod util;
pub mod versions;
pub mod walker;

// Re-exports
pub use checkpoint::{CheckpointStore, TraversalPosition};
pub use config::CleanerConfig;
pub use context::{CleanerContext, Collaborators};
pub use error::CleanerError;
pub use interrupt::{InterruptHandle, InterruptionController};
pub use runner::{Cleaner, Execution, RunHandle};
pub use stats::RunStatistics;

/// Result type for cleaner operations
pub type Result<T> = std::result::Result<T, CleanerError>;
