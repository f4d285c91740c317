//! In-memory reference store
//!
//! Models two workspaces sharing one version namespace:
//! ```text
//! workspaces/
//!   default/      (edit)
//!   live/         (published)
//! version_storage/
//!   /jcr:system/jcr:versionStorage/<folders>/<history>
//! histories/      history id -> ordered versions
//! references/     version id -> referrers
//! ```
//! Property writes are staged per session and applied on `save`, which also
//! stamps `jcr:lastModified` unless the staged change set sets it explicitly.
//! The whole state is JSON-persistable.

use crate::node::{Node, NodeId, Property, PropertyData, Value, Version};
use crate::session::{ExternalMappings, PurgeCounts, SearchIndex, Session};
use crate::{
    join_path, parent_path, props, types, Result, StoreError, EDIT_WORKSPACE, LIVE_WORKSPACE,
    ROOT_VERSION, VERSION_LABELS, VERSION_STORAGE_PATH,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

const SYSTEM_PREFIX: &str = "/jcr:system";

/// Stored form of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    id: NodeId,
    node_types: Vec<String>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyData>,
    #[serde(default = "default_checked_out")]
    checked_out: bool,
}

fn default_checked_out() -> bool {
    true
}

impl NodeRecord {
    fn new(id: NodeId, node_types: &[&str]) -> Self {
        Self {
            id,
            node_types: node_types.iter().map(|t| t.to_string()).collect(),
            properties: BTreeMap::new(),
            checked_out: true,
        }
    }

    fn to_node(&self, path: &str, staged: Option<&BTreeMap<String, Option<PropertyData>>>) -> Node {
        let mut properties = self.properties.clone();
        if let Some(changes) = staged {
            apply_changes(&mut properties, changes);
        }
        Node {
            id: self.id,
            path: path.to_string(),
            node_types: self.node_types.clone(),
            properties: properties
                .into_iter()
                .map(|(name, data)| Property { name, data })
                .collect(),
        }
    }
}

fn apply_changes(
    properties: &mut BTreeMap<String, PropertyData>,
    changes: &BTreeMap<String, Option<PropertyData>>,
) {
    for (name, change) in changes {
        match change {
            Some(data) => {
                properties.insert(name.clone(), data.clone());
            }
            None => {
                properties.remove(name);
            }
        }
    }
}

/// Path-keyed node table with an identifier index
#[derive(Debug, Default, Serialize, Deserialize)]
struct NodeTree {
    nodes: BTreeMap<String, NodeRecord>,
    #[serde(skip)]
    index: HashMap<NodeId, String>,
}

impl NodeTree {
    fn rebuild_index(&mut self) {
        self.index = self
            .nodes
            .iter()
            .map(|(path, record)| (record.id, path.clone()))
            .collect();
    }

    fn insert(&mut self, path: String, record: NodeRecord) {
        self.index.insert(record.id, path.clone());
        self.nodes.insert(path, record);
    }

    fn path_of(&self, id: &NodeId) -> Option<&String> {
        self.index.get(id)
    }

    /// Direct children of `path`, sorted by path
    fn children(&self, path: &str) -> Vec<(&String, &NodeRecord)> {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| p.len() > prefix.len() && !p[prefix.len()..].contains('/'))
            .collect()
    }

    /// Remove `path` and its whole subtree, returning removed identifiers
    fn remove_subtree(&mut self, path: &str) -> Vec<NodeId> {
        let prefix = format!("{}/", path);
        let mut doomed: Vec<String> = self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .map(|(p, _)| p.clone())
            .collect();
        doomed.push(path.to_string());
        let mut removed = Vec::with_capacity(doomed.len());
        for p in doomed {
            if let Some(record) = self.nodes.remove(&p) {
                self.index.remove(&record.id);
                removed.push(record.id);
            }
        }
        removed
    }

    /// Create missing ancestors of `path` with the given type
    fn ensure_parents(&mut self, path: &str, folder_type: &str) {
        let mut missing = Vec::new();
        let mut current = parent_path(path);
        while let Some(p) = current {
            if self.nodes.contains_key(p) {
                break;
            }
            missing.push(p.to_string());
            current = parent_path(p);
        }
        for p in missing.into_iter().rev() {
            self.insert(p, NodeRecord::new(NodeId::new(), &[folder_type]));
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryRecord {
    path: String,
    versions: Vec<Version>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RepositoryState {
    workspaces: BTreeMap<String, NodeTree>,
    version_storage: NodeTree,
    histories: BTreeMap<NodeId, HistoryRecord>,
    /// Referenced version id -> referrer ids
    references: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// Frozen properties carried by version nodes
    #[serde(default)]
    version_properties: BTreeMap<NodeId, BTreeMap<String, PropertyData>>,
    #[serde(skip)]
    version_index: HashMap<NodeId, NodeId>,
}

impl RepositoryState {
    fn new() -> Self {
        let mut state = Self::default();
        for workspace in [EDIT_WORKSPACE, LIVE_WORKSPACE] {
            let mut tree = NodeTree::default();
            tree.insert("/".to_string(), NodeRecord::new(NodeId::new(), &["rep:root"]));
            state.workspaces.insert(workspace.to_string(), tree);
        }
        state.version_storage.insert(
            "/".to_string(),
            NodeRecord::new(NodeId::new(), &["rep:root"]),
        );
        state.version_storage.ensure_parents(
            &join_path(VERSION_STORAGE_PATH, "_"),
            types::VERSION_STORAGE_FOLDER,
        );
        state
    }

    fn rebuild_indexes(&mut self) {
        for tree in self.workspaces.values_mut() {
            tree.rebuild_index();
        }
        self.version_storage.rebuild_index();
        self.version_index = self
            .histories
            .iter()
            .flat_map(|(history, record)| record.versions.iter().map(move |v| (v.id, *history)))
            .collect();
    }

    fn tree(&self, workspace: &str) -> Result<&NodeTree> {
        self.workspaces
            .get(workspace)
            .ok_or_else(|| StoreError::PathNotFound(format!("workspace {}", workspace)))
    }

    fn tree_mut(&mut self, workspace: &str) -> Result<&mut NodeTree> {
        self.workspaces
            .get_mut(workspace)
            .ok_or_else(|| StoreError::PathNotFound(format!("workspace {}", workspace)))
    }

    fn history(&self, id: &NodeId) -> Result<&HistoryRecord> {
        self.histories
            .get(id)
            .ok_or_else(|| StoreError::ItemNotFound(id.to_string()))
    }

    /// History id whose node lives at `path`
    fn history_at(&self, path: &str) -> Option<NodeId> {
        let record = self.version_storage.nodes.get(path)?;
        self.histories.contains_key(&record.id).then_some(record.id)
    }

    fn version_node(
        &self,
        history_path: &str,
        version: &Version,
        staged: Option<&BTreeMap<String, Option<PropertyData>>>,
    ) -> Node {
        let mut stored = self
            .version_properties
            .get(&version.id)
            .cloned()
            .unwrap_or_default();
        if let Some(changes) = staged {
            apply_changes(&mut stored, changes);
        }
        let mut properties = vec![Property::single(props::CREATED, Value::Date(version.created))];
        if let Some(frozen) = version.frozen_uuid {
            properties.push(Property::single(
                props::FROZEN_UUID,
                Value::String(frozen.to_string()),
            ));
        }
        properties.extend(
            stored
                .into_iter()
                .filter(|(name, _)| name != props::CREATED && name != props::FROZEN_UUID)
                .map(|(name, data)| Property { name, data }),
        );
        Node {
            id: version.id,
            path: join_path(history_path, &version.name),
            node_types: vec![types::VERSION.to_string()],
            properties,
        }
    }

    fn labels_node(history_path: &str) -> Node {
        Node {
            id: NodeId::from_uuid(uuid::Uuid::new_v5(
                &uuid::Uuid::NAMESPACE_URL,
                history_path.as_bytes(),
            )),
            path: join_path(history_path, VERSION_LABELS),
            node_types: vec![types::VERSION_LABELS.to_string()],
            properties: Vec::new(),
        }
    }

    /// Forget `ids` as referrers and as reference targets
    fn drop_references(&mut self, ids: &[NodeId]) {
        let doomed: BTreeSet<NodeId> = ids.iter().copied().collect();
        self.version_properties.retain(|id, _| !doomed.contains(id));
        self.references.retain(|target, referrers| {
            referrers.retain(|r| !doomed.contains(r));
            !doomed.contains(target) && !referrers.is_empty()
        });
    }

    fn reference_count(&self, version: &NodeId) -> usize {
        self.references.get(version).map(|r| r.len()).unwrap_or(0)
    }
}

/// Description of one version for fixture building
#[derive(Debug, Clone)]
pub struct VersionSpec {
    pub name: String,
    pub frozen_uuid: Option<NodeId>,
}

impl VersionSpec {
    pub fn new(name: impl Into<String>, frozen_uuid: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            frozen_uuid,
        }
    }
}

/// In-memory store shared by any number of sessions
#[derive(Clone)]
pub struct MemoryRepository {
    state: Arc<RwLock<RepositoryState>>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// Create an empty repository with both workspaces and the version namespace
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RepositoryState::new())),
        }
    }

    /// Load a repository previously written by `save_to`
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut state: RepositoryState = serde_json::from_str(&content)?;
        state.rebuild_indexes();
        tracing::debug!(path = %path.display(), histories = state.histories.len(), "Loaded repository");
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Write the repository as JSON (temp file + rename)
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&*self.state.read())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Open a session on `workspace`
    pub fn session(&self, workspace: &str) -> MemorySession {
        MemorySession {
            state: Arc::clone(&self.state),
            workspace: workspace.to_string(),
            staged: Mutex::new(BTreeMap::new()),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Add a content node (missing ancestors become `nt:unstructured`)
    pub fn add_node(&self, workspace: &str, path: &str, node_types: &[&str]) -> NodeId {
        self.add_node_with_id(workspace, path, node_types, NodeId::new())
    }

    /// Add a content node with a chosen identifier
    ///
    /// The same identifier may be added to both workspaces, as published
    /// content shares identity with its edit counterpart.
    pub fn add_node_with_id(
        &self,
        workspace: &str,
        path: &str,
        node_types: &[&str],
        id: NodeId,
    ) -> NodeId {
        let mut state = self.state.write();
        let tree = state
            .workspaces
            .entry(workspace.to_string())
            .or_insert_with(|| {
                let mut tree = NodeTree::default();
                tree.insert("/".to_string(), NodeRecord::new(NodeId::new(), &["rep:root"]));
                tree
            });
        tree.ensure_parents(path, types::UNSTRUCTURED);
        tree.insert(path.to_string(), NodeRecord::new(id, node_types));
        id
    }

    /// Write a property directly, bypassing staging and timestamp stamping
    ///
    /// Nodes of the version namespace (history nodes, folders, versions) are
    /// found whatever the workspace.
    pub fn put_property(&self, workspace: &str, id: &NodeId, property: Property) {
        let mut state = self.state.write();
        if state.version_index.contains_key(id) {
            state
                .version_properties
                .entry(*id)
                .or_default()
                .insert(property.name, property.data);
            return;
        }
        let in_workspace = state
            .tree(workspace)
            .map(|tree| tree.path_of(id).is_some())
            .unwrap_or(false);
        let tree = if in_workspace {
            match state.tree_mut(workspace) {
                Ok(tree) => tree,
                Err(_) => return,
            }
        } else {
            &mut state.version_storage
        };
        if let Some(path) = tree.path_of(id).cloned() {
            if let Some(record) = tree.nodes.get_mut(&path) {
                record.properties.insert(property.name, property.data);
            }
        }
    }

    /// Mark a content node checked in
    pub fn check_in(&self, workspace: &str, id: &NodeId) {
        let mut state = self.state.write();
        if let Ok(tree) = state.tree_mut(workspace) {
            if let Some(path) = tree.path_of(id).cloned() {
                if let Some(record) = tree.nodes.get_mut(&path) {
                    record.checked_out = false;
                }
            }
        }
    }

    /// Add a history at `path` (relative to the version namespace) holding
    /// the root sentinel followed by `versions`
    pub fn add_history(&self, path: &str, versions: &[VersionSpec]) -> NodeId {
        let full_path = join_path(VERSION_STORAGE_PATH, path.trim_start_matches('/'));
        let id = NodeId::new();
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);

        let mut all = Vec::with_capacity(versions.len() + 1);
        all.push(Version {
            id: NodeId::new(),
            name: ROOT_VERSION.to_string(),
            created: base,
            frozen_uuid: None,
        });
        for (i, spec) in versions.iter().enumerate() {
            all.push(Version {
                id: NodeId::new(),
                name: spec.name.clone(),
                created: base + Duration::seconds(i as i64 + 1),
                frozen_uuid: spec.frozen_uuid,
            });
        }

        let mut state = self.state.write();
        state
            .version_storage
            .ensure_parents(&full_path, types::VERSION_STORAGE_FOLDER);
        state.version_storage.insert(
            full_path.clone(),
            NodeRecord::new(id, &[types::VERSION_HISTORY]),
        );
        for version in &all {
            state.version_index.insert(version.id, id);
        }
        state.histories.insert(
            id,
            HistoryRecord {
                path: full_path,
                versions: all,
            },
        );
        id
    }

    /// Add a history of `count` versions named `1.0 .. 1.<count-1>`, all frozen from `source`
    pub fn add_simple_history(&self, path: &str, source: Option<NodeId>, count: usize) -> NodeId {
        let specs: Vec<VersionSpec> = (0..count)
            .map(|i| VersionSpec::new(format!("1.{}", i), source))
            .collect();
        self.add_history(path, &specs)
    }

    /// Record that `referrer` points at a version
    pub fn add_version_reference(&self, referrer: NodeId, history: &NodeId, name: &str) -> bool {
        let mut state = self.state.write();
        let target = match state
            .histories
            .get(history)
            .and_then(|h| h.versions.iter().find(|v| v.name == name))
        {
            Some(version) => version.id,
            None => return false,
        };
        state.references.entry(target).or_default().insert(referrer);
        true
    }

    /// Identifier of a version, for wiring references between versions
    pub fn version_id(&self, history: &NodeId, name: &str) -> Option<NodeId> {
        let state = self.state.read();
        state
            .histories
            .get(history)?
            .versions
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.id)
    }

    /// Version names of a history, root first; `None` once purged
    pub fn version_names(&self, history: &NodeId) -> Option<Vec<String>> {
        let state = self.state.read();
        state
            .histories
            .get(history)
            .map(|h| h.versions.iter().map(|v| v.name.clone()).collect())
    }

    pub fn has_history(&self, history: &NodeId) -> bool {
        self.state.read().histories.contains_key(history)
    }

    pub fn history_count(&self) -> usize {
        self.state.read().histories.len()
    }

    /// Node at `path` in `workspace`, with saved state only
    pub fn node(&self, workspace: &str, path: &str) -> Option<Node> {
        let state = self.state.read();
        let tree = state.tree(workspace).ok()?;
        tree.nodes.get(path).map(|record| record.to_node(path, None))
    }
}

type StagedChanges = BTreeMap<NodeId, BTreeMap<String, Option<PropertyData>>>;

/// Session over a `MemoryRepository` workspace
pub struct MemorySession {
    state: Arc<RwLock<RepositoryState>>,
    workspace: String,
    staged: Mutex<StagedChanges>,
    refreshes: AtomicU64,
}

impl MemorySession {
    /// How many times `refresh` was called
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    fn is_system_path(path: &str) -> bool {
        path == SYSTEM_PREFIX || path.starts_with(&format!("{}/", SYSTEM_PREFIX))
    }

    fn find_version(state: &RepositoryState, history: &NodeId, name: &str) -> Result<Version> {
        state
            .history(history)?
            .versions
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .ok_or_else(|| StoreError::VersionNotFound {
                history: history.to_string(),
                name: name.to_string(),
            })
    }
}

impl Session for MemorySession {
    fn workspace(&self) -> &str {
        &self.workspace
    }

    fn get_node(&self, path: &str) -> Result<Node> {
        let state = self.state.read();
        let staged = self.staged.lock();

        if Self::is_system_path(path) {
            if let Some(record) = state.version_storage.nodes.get(path) {
                return Ok(record.to_node(path, staged.get(&record.id)));
            }
            // Raw version nodes live under their history node
            if let Some(parent) = parent_path(path) {
                if let Some(history) = state.history_at(parent) {
                    let name = path.rsplit('/').next().unwrap_or("");
                    if name == VERSION_LABELS {
                        return Ok(RepositoryState::labels_node(parent));
                    }
                    if let Some(version) =
                        state.history(&history)?.versions.iter().find(|v| v.name == name)
                    {
                        return Ok(state.version_node(parent, version, staged.get(&version.id)));
                    }
                }
            }
            return Err(StoreError::PathNotFound(path.to_string()));
        }

        let tree = state.tree(&self.workspace)?;
        tree.nodes
            .get(path)
            .map(|record| record.to_node(path, staged.get(&record.id)))
            .ok_or_else(|| StoreError::PathNotFound(path.to_string()))
    }

    fn find_node_by_id(&self, id: &NodeId) -> Result<Option<Node>> {
        let state = self.state.read();
        let staged = self.staged.lock();

        let tree = state.tree(&self.workspace)?;
        if let Some(path) = tree.path_of(id) {
            return Ok(tree.nodes.get(path).map(|r| r.to_node(path, staged.get(id))));
        }
        if let Some(path) = state.version_storage.path_of(id) {
            return Ok(state
                .version_storage
                .nodes
                .get(path)
                .map(|r| r.to_node(path, staged.get(id))));
        }
        if let Some(history) = state.version_index.get(id) {
            let record = state.history(history)?;
            return Ok(record
                .versions
                .iter()
                .find(|v| v.id == *id)
                .map(|v| state.version_node(&record.path, v, staged.get(id))));
        }
        Ok(None)
    }

    fn get_children(&self, path: &str) -> Result<Vec<Node>> {
        let state = self.state.read();
        let staged = self.staged.lock();

        if Self::is_system_path(path) {
            if let Some(history) = state.history_at(path) {
                let record = state.history(&history)?;
                let mut children: Vec<Node> = record
                    .versions
                    .iter()
                    .map(|v| state.version_node(path, v, staged.get(&v.id)))
                    .collect();
                children.push(RepositoryState::labels_node(path));
                return Ok(children);
            }
            if !state.version_storage.nodes.contains_key(path) {
                return Err(StoreError::PathNotFound(path.to_string()));
            }
            return Ok(state
                .version_storage
                .children(path)
                .into_iter()
                .map(|(p, r)| r.to_node(p, staged.get(&r.id)))
                .collect());
        }

        let tree = state.tree(&self.workspace)?;
        if !tree.nodes.contains_key(path) {
            return Err(StoreError::PathNotFound(path.to_string()));
        }
        Ok(tree
            .children(path)
            .into_iter()
            .map(|(p, r)| r.to_node(p, staged.get(&r.id)))
            .collect())
    }

    fn set_property(&self, id: &NodeId, name: &str, data: Option<PropertyData>) -> Result<()> {
        {
            let state = self.state.read();
            let known = state.tree(&self.workspace)?.path_of(id).is_some()
                || state.version_storage.path_of(id).is_some()
                || state.version_index.contains_key(id);
            if !known {
                return Err(StoreError::ItemNotFound(id.to_string()));
            }
        }
        self.staged
            .lock()
            .entry(*id)
            .or_default()
            .insert(name.to_string(), data);
        Ok(())
    }

    fn is_checked_out(&self, id: &NodeId) -> Result<bool> {
        let state = self.state.read();
        let tree = state.tree(&self.workspace)?;
        let path = tree
            .path_of(id)
            .ok_or_else(|| StoreError::ItemNotFound(id.to_string()))?;
        Ok(tree.nodes.get(path).map(|r| r.checked_out).unwrap_or(false))
    }

    fn checkout(&self, id: &NodeId) -> Result<()> {
        let mut state = self.state.write();
        let tree = state.tree_mut(&self.workspace)?;
        let path = tree
            .path_of(id)
            .cloned()
            .ok_or_else(|| StoreError::ItemNotFound(id.to_string()))?;
        if let Some(record) = tree.nodes.get_mut(&path) {
            record.checked_out = true;
        }
        Ok(())
    }

    fn remove_node(&self, id: &NodeId) -> Result<()> {
        let mut state = self.state.write();
        if state.version_index.contains_key(id) {
            return Err(StoreError::ConstraintViolation(
                "versions can only be removed through the versioning API".to_string(),
            ));
        }
        let workspace = self.workspace.clone();
        let tree = state.tree_mut(&workspace)?;
        let path = tree
            .path_of(id)
            .cloned()
            .ok_or_else(|| StoreError::ItemNotFound(id.to_string()))?;
        let mut parent_id = None;
        if let Some(parent) = parent_path(&path) {
            if let Some(parent_record) = tree.nodes.get(parent) {
                if !parent_record.checked_out {
                    return Err(StoreError::CheckedIn(parent.to_string()));
                }
                parent_id = Some(parent_record.id);
            }
        }
        let removed = tree.remove_subtree(&path);
        state.drop_references(&removed);

        let mut staged = self.staged.lock();
        for id in &removed {
            staged.remove(id);
        }
        // Child removal modifies the parent
        if let Some(parent_id) = parent_id {
            staged.entry(parent_id).or_default();
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let changes = std::mem::take(&mut *self.staged.lock());
        if changes.is_empty() {
            return Ok(());
        }
        let now = Value::Date(Utc::now());
        let mut state = self.state.write();
        let workspace = self.workspace.clone();

        for (id, mut props_changed) in changes {
            if !props_changed.contains_key(props::LAST_MODIFIED) {
                props_changed.insert(
                    props::LAST_MODIFIED.to_string(),
                    Some(PropertyData::Single(now.clone())),
                );
            }
            let tree = state.tree_mut(&workspace)?;
            if let Some(path) = tree.path_of(&id).cloned() {
                if let Some(record) = tree.nodes.get_mut(&path) {
                    apply_changes(&mut record.properties, &props_changed);
                }
                continue;
            }
            if let Some(path) = state.version_storage.path_of(&id).cloned() {
                if let Some(record) = state.version_storage.nodes.get_mut(&path) {
                    apply_changes(&mut record.properties, &props_changed);
                }
                continue;
            }
            if state.version_index.contains_key(&id) {
                let stored = state.version_properties.entry(id).or_default();
                apply_changes(stored, &props_changed);
            }
        }
        Ok(())
    }

    fn refresh(&self, keep_changes: bool) -> Result<()> {
        if !keep_changes {
            self.staged.lock().clear();
        }
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn all_versions(&self, history: &NodeId) -> Result<Vec<Version>> {
        Ok(self.state.read().history(history)?.versions.clone())
    }

    fn get_version(&self, history: &NodeId, name: &str) -> Result<Version> {
        Self::find_version(&self.state.read(), history, name)
    }

    fn version_reference_count(&self, history: &NodeId, name: &str) -> Result<usize> {
        let state = self.state.read();
        let version = Self::find_version(&state, history, name)?;
        Ok(state.reference_count(&version.id))
    }

    fn remove_version(&self, history: &NodeId, name: &str) -> Result<()> {
        if name == ROOT_VERSION {
            return Err(StoreError::ConstraintViolation(
                "the root version cannot be removed".to_string(),
            ));
        }
        let mut state = self.state.write();
        let version = Self::find_version(&state, history, name)?;
        let count = state.reference_count(&version.id);
        if count > 0 {
            return Err(StoreError::ReferentialIntegrity {
                history: history.to_string(),
                name: name.to_string(),
                count,
            });
        }
        if let Some(record) = state.histories.get_mut(history) {
            record.versions.retain(|v| v.id != version.id);
        }
        state.version_index.remove(&version.id);
        state.drop_references(&[version.id]);
        Ok(())
    }

    fn purge_histories(&self, histories: &[NodeId]) -> Result<PurgeCounts> {
        let mut state = self.state.write();
        let mut counts = PurgeCounts::default();

        for history in histories {
            let record = match state.histories.get(history) {
                Some(record) => record.clone(),
                None => continue,
            };
            let own: BTreeSet<NodeId> = record.versions.iter().map(|v| v.id).collect();
            // Only unused histories go: nothing outside the history may point in
            let referenced_from_outside = record.versions.iter().any(|v| {
                state
                    .references
                    .get(&v.id)
                    .map(|referrers| referrers.iter().any(|r| !own.contains(r)))
                    .unwrap_or(false)
            });
            if referenced_from_outside {
                tracing::debug!(history = %record.path, "Purge skipped, history still referenced");
                continue;
            }

            let ids: Vec<NodeId> = own.iter().copied().collect();
            for id in &ids {
                state.version_index.remove(id);
            }
            state.drop_references(&ids);
            state.histories.remove(history);
            state.version_storage.remove_subtree(&record.path);

            counts.versions_removed += record.versions.len() as u64;
            counts.histories_removed += 1;
        }
        Ok(counts)
    }
}

/// External-mapping table backed by a map
#[derive(Default)]
pub struct MemoryMappings {
    entries: RwLock<HashMap<NodeId, String>>,
    unavailable: AtomicBool,
}

impl MemoryMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: NodeId, external_id: impl Into<String>) {
        self.entries.write().insert(id, external_id.into());
    }

    /// Simulate the backing database going away
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }
}

impl ExternalMappings for MemoryMappings {
    fn external_id(&self, id: &NodeId) -> Result<Option<String>> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("external mapping table".to_string()));
        }
        Ok(self.entries.read().get(id).cloned())
    }
}

/// Search index whose reindex finishes after a fixed number of polls
pub struct MemoryIndex {
    polls_per_reindex: u32,
    remaining: AtomicU32,
    started: Mutex<Vec<String>>,
}

impl MemoryIndex {
    pub fn new(polls_per_reindex: u32) -> Self {
        Self {
            polls_per_reindex,
            remaining: AtomicU32::new(0),
            started: Mutex::new(Vec::new()),
        }
    }

    /// Workspaces a reindex was started for
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }
}

impl SearchIndex for MemoryIndex {
    fn start_reindex(&self, workspace: &str) -> Result<()> {
        self.started.lock().push(workspace.to_string());
        self.remaining.store(self.polls_per_reindex, Ordering::SeqCst);
        Ok(())
    }

    fn reindex_in_progress(&self, _workspace: &str) -> Result<bool> {
        let previous = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| Some(r.saturating_sub(1)))
            .unwrap_or(0);
        Ok(previous > 0)
    }
}

/// Timestamp helper for fixtures
pub fn fixed_time(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
