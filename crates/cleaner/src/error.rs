//! Cleaner error types

use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Integrity checking needs the external mapping lookup
    #[error("integrity check requested but no external mapping lookup is configured")]
    MissingExternalMappings,

    /// A version iterator yielded fewer versions than it announced
    #[error("version iterator of {history} exhausted at position {position} (size {size})")]
    IteratorExhausted {
        history: String,
        position: usize,
        size: usize,
    },

    #[error("another cleanup run is already in progress")]
    AlreadyRunning,

    #[error("cleanup worker failed: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
