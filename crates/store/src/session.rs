//! Collaborator traits consumed by the cleaner

use crate::node::{Node, NodeId, PropertyData, Version};
use crate::Result;

/// Counts reported by a bulk purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub versions_removed: u64,
    pub histories_removed: u64,
}

impl PurgeCounts {
    pub fn total(&self) -> u64 {
        self.versions_removed + self.histories_removed
    }
}

/// A session bound to one workspace of the store
///
/// The version namespace is shared, so versioning calls behave the same
/// whichever workspace the session was opened on.
pub trait Session: Send + Sync {
    /// Workspace this session reads and writes
    fn workspace(&self) -> &str;

    /// Node at `path`
    fn get_node(&self, path: &str) -> Result<Node>;

    /// Node carrying `id`, `None` when it does not resolve
    fn find_node_by_id(&self, id: &NodeId) -> Result<Option<Node>>;

    /// Direct children of the node at `path`, in document order
    fn get_children(&self, path: &str) -> Result<Vec<Node>>;

    /// Set (or with `None` remove) a property; takes effect on `save`
    fn set_property(&self, id: &NodeId, name: &str, data: Option<PropertyData>) -> Result<()>;

    fn is_checked_out(&self, id: &NodeId) -> Result<bool>;

    fn checkout(&self, id: &NodeId) -> Result<()>;

    /// Remove a node and its subtree; the parent must be checked out
    fn remove_node(&self, id: &NodeId) -> Result<()>;

    /// Persist pending changes
    fn save(&self) -> Result<()>;

    /// Drop cached state (and pending changes unless `keep_changes`)
    fn refresh(&self, keep_changes: bool) -> Result<()>;

    /// Every version of a history in creation order, root sentinel first
    fn all_versions(&self, history: &NodeId) -> Result<Vec<Version>>;

    /// One version by name
    fn get_version(&self, history: &NodeId, name: &str) -> Result<Version>;

    /// Number of store entries still pointing at the version
    fn version_reference_count(&self, history: &NodeId, name: &str) -> Result<usize>;

    /// Remove a single version; fails while it is referenced
    fn remove_version(&self, history: &NodeId, name: &str) -> Result<()>;

    /// Atomically remove whole histories
    fn purge_histories(&self, histories: &[NodeId]) -> Result<PurgeCounts>;
}

/// Read-only lookup of identifiers mapped to external systems
pub trait ExternalMappings: Send + Sync {
    /// External identifier `id` maps to, if any
    fn external_id(&self, id: &NodeId) -> Result<Option<String>>;
}

/// Search infrastructure able to rebuild one workspace index
pub trait SearchIndex: Send + Sync {
    fn start_reindex(&self, workspace: &str) -> Result<()>;

    fn reindex_in_progress(&self, workspace: &str) -> Result<bool>;
}
