//! Version iteration over a history
//!
//! Two backings: the versioning API, whose size is authoritative, and the
//! raw child nodes of the history node, which also contain the label
//! container that must not be counted.

use crate::{CleanerError, Result};
use chrono::{DateTime, Utc};
use store::{props, types, Node, NodeId, Session, Version};

/// Ordered versions of one history, root sentinel first
pub trait VersionIterator: Iterator<Item = Version> {
    /// Number of versions, root included
    fn size(&self) -> usize;

    /// Number of versions consumed so far
    fn consumed(&self) -> usize;

    /// Path of the history being iterated
    fn history(&self) -> &str;

    /// Next version; errors once the iterator is exhausted
    fn next_version(&mut self) -> Result<Version> {
        let history = self.history().to_string();
        let (position, size) = (self.consumed(), self.size());
        self.next()
            .ok_or(CleanerError::IteratorExhausted { history, position, size })
    }
}

/// Iterator backed by `Session::all_versions`
pub struct ApiVersionIterator {
    history: String,
    versions: std::vec::IntoIter<Version>,
    size: usize,
    position: usize,
}

impl ApiVersionIterator {
    pub fn open(session: &dyn Session, history: &Node) -> Result<Self> {
        let versions = session.all_versions(&history.id)?;
        Ok(Self {
            history: history.path.clone(),
            size: versions.len(),
            versions: versions.into_iter(),
            position: 0,
        })
    }
}

impl Iterator for ApiVersionIterator {
    type Item = Version;

    fn next(&mut self) -> Option<Version> {
        let version = self.versions.next()?;
        self.position += 1;
        Some(version)
    }
}

impl VersionIterator for ApiVersionIterator {
    fn size(&self) -> usize {
        self.size
    }

    fn consumed(&self) -> usize {
        self.position
    }

    fn history(&self) -> &str {
        &self.history
    }
}

/// Iterator over the raw child nodes of a history node
pub struct RawVersionIterator {
    history: String,
    children: std::vec::IntoIter<Node>,
    size: usize,
    position: usize,
}

impl RawVersionIterator {
    pub fn open(session: &dyn Session, history: &Node) -> Result<Self> {
        let children = session.get_children(&history.path)?;
        let has_labels = children.iter().any(|c| c.is_node_type(types::VERSION_LABELS));
        let size = if has_labels {
            children.len().saturating_sub(1)
        } else {
            children.len()
        };
        Ok(Self {
            history: history.path.clone(),
            children: children.into_iter(),
            size,
            position: 0,
        })
    }
}

impl Iterator for RawVersionIterator {
    type Item = Version;

    fn next(&mut self) -> Option<Version> {
        for child in self.children.by_ref() {
            if !child.is_node_type(types::VERSION) {
                continue;
            }
            self.position += 1;
            return Some(version_from_node(child));
        }
        None
    }
}

impl VersionIterator for RawVersionIterator {
    fn size(&self) -> usize {
        self.size
    }

    fn consumed(&self) -> usize {
        self.position
    }

    fn history(&self) -> &str {
        &self.history
    }
}

fn version_from_node(node: Node) -> Version {
    let created = node
        .property(props::CREATED)
        .and_then(|p| p.data.values().first().and_then(|v| v.as_date()))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let frozen_uuid = node
        .property(props::FROZEN_UUID)
        .and_then(|p| p.data.values().first().and_then(|v| v.as_str()))
        .and_then(|s| s.parse::<NodeId>().ok());
    Version {
        id: node.id,
        name: node.name().to_string(),
        created,
        frozen_uuid,
    }
}

/// Open the iterator selected by `use_api`
pub fn open_versions(
    session: &dyn Session,
    history: &Node,
    use_api: bool,
) -> Result<Box<dyn VersionIterator>> {
    if use_api {
        Ok(Box::new(ApiVersionIterator::open(session, history)?))
    } else {
        Ok(Box::new(RawVersionIterator::open(session, history)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{MemoryRepository, ROOT_VERSION, EDIT_WORKSPACE, VERSION_STORAGE_PATH};

    fn fixture() -> (MemoryRepository, Node, NodeId) {
        let repo = MemoryRepository::new();
        let source = repo.add_node(EDIT_WORKSPACE, "/sites/a", &["jnt:page"]);
        repo.add_simple_history("/aa/h1", Some(source), 3);
        let node = repo
            .session(EDIT_WORKSPACE)
            .get_node(&format!("{}/aa/h1", VERSION_STORAGE_PATH))
            .unwrap();
        (repo, node, source)
    }

    #[test]
    fn test_both_backings_agree() {
        let (repo, history, source) = fixture();
        let session = repo.session(EDIT_WORKSPACE);

        let api: Vec<Version> = open_versions(&session, &history, true).unwrap().collect();
        let raw: Vec<Version> = open_versions(&session, &history, false).unwrap().collect();

        assert_eq!(api.len(), 4);
        assert_eq!(api, raw);
        assert_eq!(raw[0].name, ROOT_VERSION);
        assert_eq!(raw[1].frozen_uuid, Some(source));
    }

    #[test]
    fn test_raw_size_excludes_label_container() {
        let (repo, history, _) = fixture();
        let session = repo.session(EDIT_WORKSPACE);

        assert_eq!(session.get_children(&history.path).unwrap().len(), 5);
        assert_eq!(RawVersionIterator::open(&session, &history).unwrap().size(), 4);
        assert_eq!(ApiVersionIterator::open(&session, &history).unwrap().size(), 4);
    }

    #[test]
    fn test_exhausted_iterator_is_an_error() {
        let (repo, history, _) = fixture();
        let session = repo.session(EDIT_WORKSPACE);
        let mut it = open_versions(&session, &history, false).unwrap();

        for _ in 0..4 {
            it.next_version().unwrap();
        }
        assert_eq!(it.consumed(), 4);
        assert!(matches!(
            it.next_version(),
            Err(CleanerError::IteratorExhausted { position: 4, size: 4, .. })
        ));
    }
}
