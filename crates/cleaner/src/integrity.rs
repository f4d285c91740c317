//! Reference integrity check and repair
//!
//! Every reference value of a node must resolve in the edit or the live
//! workspace. Unresolvable values either map to an external system (logged,
//! never touched) or are dangling. Dangling values are repaired on request:
//! nodes of a cascade-delete type are removed, anything else loses the bad
//! value. Repairs keep the last-modified timestamp they found.

use crate::context::CleanerContext;
use chrono::{DateTime, Utc};
use store::{parent_path, props, ExternalMappings, Node, NodeId, PropertyData, Session, Value};

/// One unresolvable reference value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub property: String,
    pub target: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub dangling: Vec<DanglingReference>,
    /// Unresolvable values known to point at an external system
    pub external: usize,
    pub repaired: usize,
    /// The node itself was deleted by a cascade repair
    pub node_removed: bool,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty()
    }
}

/// Check `node` with the run's collaborators and add the outcome to the run statistics
pub fn check_and_count(ctx: &mut CleanerContext, node: &Node) -> IntegrityReport {
    let report = {
        let checker = IntegrityChecker::new(
            ctx.edit.as_ref(),
            ctx.live.as_ref(),
            ctx.mappings.as_deref(),
            &ctx.config.cascade_delete_types,
        );
        checker.check(node, ctx.config.repair_integrity)
    };
    ctx.stats.dangling_references += report.dangling.len() as u64;
    ctx.stats.repaired_references += report.repaired as u64;
    report
}

pub struct IntegrityChecker<'a> {
    edit: &'a dyn Session,
    live: &'a dyn Session,
    mappings: Option<&'a dyn ExternalMappings>,
    cascade_types: &'a [String],
}

impl<'a> IntegrityChecker<'a> {
    /// Repairs are written through `edit`
    pub fn new(
        edit: &'a dyn Session,
        live: &'a dyn Session,
        mappings: Option<&'a dyn ExternalMappings>,
        cascade_types: &'a [String],
    ) -> Self {
        Self {
            edit,
            live,
            mappings,
            cascade_types,
        }
    }

    /// Inspect every reference value of `node`, repairing when `fix` is set
    ///
    /// Repair failures are logged and reported as unrepaired.
    pub fn check(&self, node: &Node, fix: bool) -> IntegrityReport {
        let mut report = IntegrityReport::default();

        for property in &node.properties {
            for value in property.data.values() {
                let target = match value.as_reference() {
                    Some(target) => target,
                    None => continue,
                };
                match self.resolves(&target) {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(node = %node.path, property = %property.name, target = %target, "Failed to resolve reference: {}", e);
                        continue;
                    }
                }
                if self.is_external(&target, node, &property.name, fix) {
                    report.external += 1;
                    continue;
                }

                tracing::info!(
                    node = %node.path,
                    property = %property.name,
                    target = %target,
                    "Couldn't find referenced node"
                );
                report.dangling.push(DanglingReference {
                    property: property.name.clone(),
                    target,
                });
                if !fix {
                    continue;
                }

                if self.must_remove(node) {
                    match self.remove_node(node) {
                        Ok(()) => {
                            report.repaired += 1;
                            report.node_removed = true;
                        }
                        Err(e) => {
                            tracing::warn!(node = %node.path, "Failed to remove node holding an invalid reference: {}", e);
                        }
                    }
                    // Nothing left to inspect either way
                    return report;
                }
                match self.clear_value(node, &property.name, &target) {
                    Ok(()) => report.repaired += 1,
                    Err(e) => {
                        tracing::warn!(node = %node.path, property = %property.name, "Failed to fix invalid reference: {}", e);
                    }
                }
            }
        }
        report
    }

    fn resolves(&self, id: &NodeId) -> store::Result<bool> {
        if self.edit.find_node_by_id(id)?.is_some() {
            return Ok(true);
        }
        Ok(self.live.find_node_by_id(id)?.is_some())
    }

    /// Best effort: an unavailable lookup means "not external"
    fn is_external(&self, target: &NodeId, node: &Node, property: &str, fix: bool) -> bool {
        let mappings = match self.mappings {
            Some(mappings) => mappings,
            None => return false,
        };
        match mappings.external_id(target) {
            Ok(Some(external)) => {
                tracing::info!(
                    node = %node.path,
                    property = property,
                    external = %external,
                    "Mapping found towards an external reference not available at this time, check mount points and external providers"
                );
                if fix {
                    tracing::info!(node = %node.path, property = property, "External references are not fixed automatically");
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(target = %target, "External mapping lookup unavailable: {}", e);
                false
            }
        }
    }

    fn must_remove(&self, node: &Node) -> bool {
        self.cascade_types.iter().any(|t| node.is_node_type(t))
    }

    /// Drop `target` from the property, keeping the node timestamp
    fn clear_value(&self, node: &Node, property: &str, target: &NodeId) -> store::Result<()> {
        tracing::info!(node = %node.path, property = property, "Fixing invalid reference by clearing the property value");
        let current = self.edit.get_node(&node.path)?;
        let original = current.last_modified();

        let replacement = match current.property(property).map(|p| &p.data) {
            Some(PropertyData::Multiple(values)) => Some(PropertyData::Multiple(
                values
                    .iter()
                    .filter(|v| v.as_reference() != Some(*target))
                    .cloned()
                    .collect(),
            )),
            _ => None,
        };
        self.edit.set_property(&node.id, property, replacement)?;
        self.edit.save()?;
        self.restore_last_modified(&node.id, original)
    }

    /// Delete the node, keeping the parent timestamp
    fn remove_node(&self, node: &Node) -> store::Result<()> {
        tracing::info!(node = %node.path, "Fixing invalid reference by removing the node");
        let parent = parent_path(&node.path)
            .map(|p| self.edit.get_node(p))
            .transpose()?;
        let original = parent.as_ref().and_then(|p| p.last_modified());

        if let Some(parent) = &parent {
            if !self.edit.is_checked_out(&parent.id)? {
                self.edit.checkout(&parent.id)?;
            }
        }
        self.edit.remove_node(&node.id)?;
        self.edit.save()?;

        match parent {
            Some(parent) => self.restore_last_modified(&parent.id, original),
            None => Ok(()),
        }
    }

    /// Put `original` back if a save changed it (absence included)
    fn restore_last_modified(&self, id: &NodeId, original: Option<DateTime<Utc>>) -> store::Result<()> {
        let reloaded = self
            .edit
            .find_node_by_id(id)?
            .ok_or_else(|| store::StoreError::ItemNotFound(id.to_string()))?;
        if reloaded.last_modified() == original {
            return Ok(());
        }
        self.edit.set_property(
            id,
            props::LAST_MODIFIED,
            original.map(|date| PropertyData::Single(Value::Date(date))),
        )?;
        self.edit.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::memory::fixed_time;
    use store::{MemoryMappings, MemoryRepository, Property, EDIT_WORKSPACE, LIVE_WORKSPACE};

    fn cascade() -> Vec<String> {
        vec![store::types::REFERENCE.to_string()]
    }

    #[test]
    fn test_clean_node_reports_nothing() {
        let repo = MemoryRepository::new();
        let target = repo.add_node(LIVE_WORKSPACE, "/sites/target", &["jnt:page"]);
        let id = repo.add_node(EDIT_WORKSPACE, "/sites/a", &["jnt:text"]);
        repo.put_property(EDIT_WORKSPACE, &id, Property::single("link", Value::Reference(target)));
        let (edit, live) = (repo.session(EDIT_WORKSPACE), repo.session(LIVE_WORKSPACE));
        let types = cascade();
        let checker = IntegrityChecker::new(&edit, &live, None, &types);

        let report = checker.check(&edit.get_node("/sites/a").unwrap(), true);
        assert!(report.is_clean());
        assert_eq!(report, IntegrityReport::default());
    }

    #[test]
    fn test_report_only_without_fix() {
        let repo = MemoryRepository::new();
        let id = repo.add_node(EDIT_WORKSPACE, "/sites/a", &["jnt:text"]);
        repo.put_property(EDIT_WORKSPACE, &id, Property::single("link", Value::WeakReference(NodeId::new())));
        let (edit, live) = (repo.session(EDIT_WORKSPACE), repo.session(LIVE_WORKSPACE));
        let types = cascade();
        let checker = IntegrityChecker::new(&edit, &live, None, &types);

        let report = checker.check(&edit.get_node("/sites/a").unwrap(), false);
        assert_eq!(report.dangling.len(), 1);
        assert_eq!(report.repaired, 0);
        assert!(repo.node(EDIT_WORKSPACE, "/sites/a").unwrap().property("link").is_some());
    }

    #[test]
    fn test_multi_valued_repair_keeps_timestamp() {
        let repo = MemoryRepository::new();
        let kept = repo.add_node(EDIT_WORKSPACE, "/sites/kept", &["jnt:page"]);
        let missing = NodeId::new();
        let id = repo.add_node(EDIT_WORKSPACE, "/sites/a", &["jnt:text"]);
        let original = fixed_time(2021, 3, 4);
        repo.put_property(EDIT_WORKSPACE, &id, Property::single(props::LAST_MODIFIED, Value::Date(original)));
        repo.put_property(
            EDIT_WORKSPACE,
            &id,
            Property::multiple("links", vec![Value::Reference(missing), Value::Reference(kept)]),
        );
        let (edit, live) = (repo.session(EDIT_WORKSPACE), repo.session(LIVE_WORKSPACE));
        let types = cascade();
        let checker = IntegrityChecker::new(&edit, &live, None, &types);

        let report = checker.check(&edit.get_node("/sites/a").unwrap(), true);
        assert_eq!(report.repaired, 1);

        let node = repo.node(EDIT_WORKSPACE, "/sites/a").unwrap();
        let values = node.property("links").unwrap().data.values();
        assert_eq!(values, vec![&Value::Reference(kept)]);
        assert_eq!(node.last_modified(), Some(original));
    }

    #[test]
    fn test_absent_timestamp_stays_absent() {
        let repo = MemoryRepository::new();
        let id = repo.add_node(EDIT_WORKSPACE, "/sites/a", &["jnt:text"]);
        repo.put_property(EDIT_WORKSPACE, &id, Property::single("link", Value::Reference(NodeId::new())));
        let (edit, live) = (repo.session(EDIT_WORKSPACE), repo.session(LIVE_WORKSPACE));
        let types = cascade();
        let checker = IntegrityChecker::new(&edit, &live, None, &types);

        checker.check(&edit.get_node("/sites/a").unwrap(), true);

        let node = repo.node(EDIT_WORKSPACE, "/sites/a").unwrap();
        assert!(node.property("link").is_none());
        assert_eq!(node.last_modified(), None);
    }

    #[test]
    fn test_cascade_type_removes_node() {
        let repo = MemoryRepository::new();
        let parent = repo.add_node(EDIT_WORKSPACE, "/sites/list", &["jnt:contentList"]);
        let original = fixed_time(2020, 6, 1);
        repo.put_property(EDIT_WORKSPACE, &parent, Property::single(props::LAST_MODIFIED, Value::Date(original)));
        repo.check_in(EDIT_WORKSPACE, &parent);
        let id = repo.add_node(EDIT_WORKSPACE, "/sites/list/ref", &[store::types::REFERENCE]);
        repo.put_property(EDIT_WORKSPACE, &id, Property::single("a", Value::Reference(NodeId::new())));
        repo.put_property(EDIT_WORKSPACE, &id, Property::single("b", Value::Reference(NodeId::new())));
        let (edit, live) = (repo.session(EDIT_WORKSPACE), repo.session(LIVE_WORKSPACE));
        let types = cascade();
        let checker = IntegrityChecker::new(&edit, &live, None, &types);

        let report = checker.check(&edit.get_node("/sites/list/ref").unwrap(), true);

        assert!(report.node_removed);
        // Processing stops with the first dangling value
        assert_eq!(report.dangling.len(), 1);
        assert!(repo.node(EDIT_WORKSPACE, "/sites/list/ref").is_none());
        assert_eq!(
            repo.node(EDIT_WORKSPACE, "/sites/list").unwrap().last_modified(),
            Some(original)
        );
    }

    #[test]
    fn test_external_mapping_is_never_repaired() {
        let repo = MemoryRepository::new();
        let external = NodeId::new();
        let id = repo.add_node(EDIT_WORKSPACE, "/sites/a", &["jnt:text"]);
        repo.put_property(EDIT_WORKSPACE, &id, Property::single("link", Value::Reference(external)));
        let mappings = MemoryMappings::new();
        mappings.insert(external, "provider:42");
        let (edit, live) = (repo.session(EDIT_WORKSPACE), repo.session(LIVE_WORKSPACE));
        let types = cascade();
        let checker = IntegrityChecker::new(&edit, &live, Some(&mappings), &types);

        let report = checker.check(&edit.get_node("/sites/a").unwrap(), true);
        assert_eq!(report.external, 1);
        assert!(report.is_clean());
        assert!(repo.node(EDIT_WORKSPACE, "/sites/a").unwrap().property("link").is_some());

        // Lookup down: treated as a true dangling reference
        mappings.set_unavailable(true);
        let report = checker.check(&edit.get_node("/sites/a").unwrap(), true);
        assert_eq!(report.external, 0);
        assert_eq!(report.repaired, 1);
        assert!(repo.node(EDIT_WORKSPACE, "/sites/a").unwrap().property("link").is_none());
    }
}
