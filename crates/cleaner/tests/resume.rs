//! Interruption, checkpointing and resumption across runs

mod common;

use cleaner::interrupt::request_interrupt;
use cleaner::{CleanerConfig, CleanerError, Collaborators, InterruptHandle};
use common::{storage_path, TestStore};
use parking_lot::Mutex;
use std::sync::Arc;
use store::{
    MemorySession, Node, NodeId, PropertyData, PurgeCounts, Session, Version, ROOT_VERSION,
};

/// Session that raises an interruption when a given path is listed
struct TrippingSession {
    inner: Arc<MemorySession>,
    trigger: String,
    handle: Mutex<Option<InterruptHandle>>,
}

impl TrippingSession {
    fn new(inner: Arc<MemorySession>, trigger: String) -> Self {
        Self {
            inner,
            trigger,
            handle: Mutex::new(None),
        }
    }

    fn arm(&self, handle: InterruptHandle) {
        *self.handle.lock() = Some(handle);
    }
}

impl Session for TrippingSession {
    fn workspace(&self) -> &str {
        self.inner.workspace()
    }

    fn get_node(&self, path: &str) -> store::Result<Node> {
        self.inner.get_node(path)
    }

    fn find_node_by_id(&self, id: &NodeId) -> store::Result<Option<Node>> {
        self.inner.find_node_by_id(id)
    }

    fn get_children(&self, path: &str) -> store::Result<Vec<Node>> {
        if path == self.trigger {
            if let Some(handle) = self.handle.lock().as_ref() {
                handle.interrupt();
            }
        }
        self.inner.get_children(path)
    }

    fn set_property(&self, id: &NodeId, name: &str, data: Option<PropertyData>) -> store::Result<()> {
        self.inner.set_property(id, name, data)
    }

    fn is_checked_out(&self, id: &NodeId) -> store::Result<bool> {
        self.inner.is_checked_out(id)
    }

    fn checkout(&self, id: &NodeId) -> store::Result<()> {
        self.inner.checkout(id)
    }

    fn remove_node(&self, id: &NodeId) -> store::Result<()> {
        self.inner.remove_node(id)
    }

    fn save(&self) -> store::Result<()> {
        self.inner.save()
    }

    fn refresh(&self, keep_changes: bool) -> store::Result<()> {
        self.inner.refresh(keep_changes)
    }

    fn all_versions(&self, history: &NodeId) -> store::Result<Vec<Version>> {
        self.inner.all_versions(history)
    }

    fn get_version(&self, history: &NodeId, name: &str) -> store::Result<Version> {
        self.inner.get_version(history, name)
    }

    fn version_reference_count(&self, history: &NodeId, name: &str) -> store::Result<usize> {
        self.inner.version_reference_count(history, name)
    }

    fn remove_version(&self, history: &NodeId, name: &str) -> store::Result<()> {
        self.inner.remove_version(history, name)
    }

    fn purge_histories(&self, histories: &[NodeId]) -> store::Result<PurgeCounts> {
        self.inner.purge_histories(histories)
    }
}

fn pruning(store: &TestStore) -> CleanerConfig {
    CleanerConfig {
        keep_last: 0,
        ..store.config()
    }
}

#[test]
fn interrupt_marker_before_run_changes_nothing() {
    let store = TestStore::new();
    let source = store.source("/sites/a");
    let history = store.history("/aa/h1", Some(source), 3);
    let marker = request_interrupt(store.state_dir.path()).unwrap();

    let stats = store.run(pruning(&store));

    assert!(stats.interrupted);
    assert!(!marker.exists(), "marker is consumed once observed");
    assert_eq!(store.names(&history).len(), 4);
    assert_eq!(stats.processed_histories, 0);
    assert_eq!(store.saved_position(), None);
}

#[test]
fn interrupt_handle_is_sticky_for_the_cleaner() {
    let store = TestStore::new();
    let source = store.source("/sites/a");
    let history = store.history("/aa/h1", Some(source), 3);
    let cleaner = store.cleaner(pruning(&store));

    cleaner.interrupt_handle().interrupt();
    assert!(cleaner.run().unwrap().interrupted);
    assert!(cleaner.run().unwrap().interrupted);
    assert_eq!(store.names(&history).len(), 4);
}

#[test]
fn interruption_mid_walk_then_resume() {
    let store = TestStore::new();
    let source = store.source("/sites/a");
    let first = store.history("/aa/h1", Some(source), 3);
    let second = store.history("/bb/h2", Some(source), 3);
    let third = store.history("/cc/h3", Some(source), 3);

    // Trip while the second history is being read
    let edit = Arc::new(TrippingSession::new(store.edit.clone(), storage_path("/bb/h2")));
    let collaborators = Collaborators::new(edit.clone(), store.live.clone())
        .with_mappings(store.mappings.clone());
    let cleaner = cleaner::Cleaner::new(pruning(&store), collaborators).unwrap();
    edit.arm(cleaner.interrupt_handle());

    let stats = cleaner.run().unwrap();

    assert!(stats.interrupted);
    assert_eq!(store.names(&first), vec![ROOT_VERSION]);
    assert_eq!(store.names(&second).len(), 4, "interrupted history left intact");
    assert_eq!(store.names(&third).len(), 4);
    assert_eq!(store.saved_position(), Some(storage_path("/bb")));

    // A fresh run resumes at the saved parent and completes
    let stats = store.run(pruning(&store));

    assert!(!stats.interrupted);
    assert_eq!(stats.processed_histories, 2);
    assert_eq!(store.names(&second), vec![ROOT_VERSION]);
    assert_eq!(store.names(&third), vec![ROOT_VERSION]);
    assert_eq!(store.saved_position(), None);
}

#[test]
fn resume_skips_histories_before_saved_parent() {
    let store = TestStore::new();
    let source = store.source("/sites/a");
    let before = store.history("/aa/h1", Some(source), 2);
    let at = store.history("/bb/h2", Some(source), 2);
    let after = store.history("/cc/h3", Some(source), 2);
    cleaner::CheckpointStore::open(store.state_dir.path()).save(Some(&storage_path("/bb")));

    let stats = store.run(pruning(&store));

    assert_eq!(store.names(&before).len(), 3);
    assert_eq!(store.names(&at), vec![ROOT_VERSION]);
    assert_eq!(store.names(&after), vec![ROOT_VERSION]);
    assert_eq!(stats.processed_histories, 2);
    assert_eq!(store.saved_position(), None);

    // Next run starts from the beginning
    store.run(pruning(&store));
    assert_eq!(store.names(&before), vec![ROOT_VERSION]);
}

#[test]
fn restart_disabled_ignores_checkpoint() {
    let store = TestStore::new();
    let source = store.source("/sites/a");
    let before = store.history("/aa/h1", Some(source), 2);
    cleaner::CheckpointStore::open(store.state_dir.path()).save(Some(&storage_path("/zz")));

    store.run(CleanerConfig {
        restart_from_last_position: false,
        ..pruning(&store)
    });

    assert_eq!(store.names(&before), vec![ROOT_VERSION]);
}

#[test]
fn deadline_stops_the_run() {
    let store = TestStore::new();
    let source = store.source("/sites/a");
    let history = store.history("/aa/h1", Some(source), 20);

    let stats = store.run(CleanerConfig {
        max_execution_time_ms: 50,
        pause_ms: 20,
        ..pruning(&store)
    });

    assert!(stats.interrupted);
    let remaining = store.names(&history).len();
    assert!(remaining > 1 && remaining < 21, "partial progress, got {}", remaining);
    assert_eq!(store.saved_position(), Some(storage_path("/aa")));
}

#[test]
fn concurrent_runs_are_refused() {
    let store = TestStore::new();
    let source = store.source("/sites/a");
    store.history("/aa/h1", Some(source), 200);

    let slow = store.cleaner(CleanerConfig {
        pause_ms: 5,
        run_asynchronously: true,
        ..pruning(&store)
    });
    let handle = slow.spawn().unwrap();

    // Wait for the background run to take the lock
    while cleaner::lock::current_owner(store.state_dir.path()).is_none() && !handle.is_finished() {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    let second = store.cleaner(pruning(&store)).run();
    handle.interrupt();
    let stats = handle.join().unwrap();

    assert!(matches!(second, Err(CleanerError::AlreadyRunning)));
    assert!(stats.interrupted);
}
