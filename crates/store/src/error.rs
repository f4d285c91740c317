//! Store error taxonomy

use thiserror::Error;

/// Errors reported by a store session or one of its side collaborators
#[derive(Debug, Error)]
pub enum StoreError {
    /// No node carries the given identifier
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// No node lives at the given path
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The history has no version with that name
    #[error("version {name} not found in history {history}")]
    VersionNotFound { history: String, name: String },

    /// The version is still referenced and cannot be removed
    #[error("version {name} in history {history} is still referenced ({count} references)")]
    ReferentialIntegrity {
        history: String,
        name: String,
        count: usize,
    },

    /// The node (or its parent) must be checked out first
    #[error("node {0} is checked in")]
    CheckedIn(String),

    /// Node type or property definition forbids the operation
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A backing subsystem (database, index) cannot be reached
    #[error("subsystem unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the error only says "this thing does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ItemNotFound(_)
                | StoreError::PathNotFound(_)
                | StoreError::VersionNotFound { .. }
        )
    }
}
