//! Versioned object store interface
//!
//! This crate provides:
//! - Node, property and version value types
//! - The `Session` collaborator trait (node access + versioning API)
//! - External reference lookup and search index traits
//! - An in-memory reference store (`MemoryRepository`)

pub mod error;
pub mod memory;
pub mod node;
pub mod session;

// Re-exports
pub use error::StoreError;
pub use memory::{MemoryIndex, MemoryMappings, MemoryRepository, MemorySession, VersionSpec};
pub use node::{Node, NodeId, Property, PropertyData, Value, Version};
pub use session::{ExternalMappings, PurgeCounts, SearchIndex, Session};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Name of the editable workspace
pub const EDIT_WORKSPACE: &str = "default";
/// Name of the published workspace
pub const LIVE_WORKSPACE: &str = "live";

/// Root of the version namespace, shared by every workspace
pub const VERSION_STORAGE_PATH: &str = "/jcr:system/jcr:versionStorage";

/// Name of the sentinel version every history starts with
pub const ROOT_VERSION: &str = "jcr:rootVersion";
/// Name of the label index child found under raw history nodes
pub const VERSION_LABELS: &str = "jcr:versionLabels";

/// Property names the cleaner reads or restores
pub mod props {
    pub const LAST_MODIFIED: &str = "jcr:lastModified";
    pub const FROZEN_UUID: &str = "jcr:frozenUuid";
    pub const CREATED: &str = "jcr:created";
}

/// Node type names the cleaner tests against
pub mod types {
    pub const VERSION_HISTORY: &str = "nt:versionHistory";
    pub const VERSION: &str = "nt:version";
    pub const VERSION_LABELS: &str = "nt:versionLabels";
    pub const VERSION_STORAGE_FOLDER: &str = "rep:versionStorage";
    pub const HIERARCHY_NODE: &str = "nt:hierarchyNode";
    pub const UNSTRUCTURED: &str = "nt:unstructured";
    pub const MEMBER: &str = "jnt:member";
    pub const REFERENCE: &str = "jnt:reference";
}

/// Join a parent path and a child name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Parent of a path (`None` for the root)
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "a"), "/a");
        assert_eq!(join_path("/a", "b"), "/a/b");
        assert_eq!(join_path("/a/", "b"), "/a/b");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/"), None);
        assert_eq!(parent_path("/a"), Some("/"));
        assert_eq!(parent_path("/a/b/c"), Some("/a/b"));
        assert_eq!(parent_path("relative"), None);
    }
}
