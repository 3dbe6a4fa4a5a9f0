//! StateStore — redb-backed persistence for [`ClusterState`].
//!
//! A save replaces both tables inside one write transaction, so a reader
//! never observes a node set from one cycle paired with a greylist from
//! another.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use greyline_core::{Node, epoch_secs};

use crate::cluster::ClusterState;
use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Node record with its position in evaluation order.
#[derive(Debug, Serialize, Deserialize)]
struct StoredNode {
    position: u64,
    node: Node,
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(GREYLIST).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Replace the persisted state with `state`.
    pub fn save_cluster(&self, state: &ClusterState) -> StateResult<()> {
        let now = epoch_secs();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            nodes.retain(|_, _| false).map_err(map_err!(Write))?;
            for (position, node) in state.nodes().iter().enumerate() {
                let record = StoredNode {
                    position: position as u64,
                    node: node.clone(),
                };
                let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
                nodes
                    .insert(node.id.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }

            let mut greylist = txn.open_table(GREYLIST).map_err(map_err!(Table))?;
            let mut since = HashMap::new();
            for entry in greylist.iter().map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                since.insert(key.value().to_string(), value.value());
            }
            greylist.retain(|_, _| false).map_err(map_err!(Write))?;
            for id in state.greylisted() {
                let first_seen = since.get(id).copied().unwrap_or(now);
                greylist.insert(id, first_seen).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(nodes = state.len(), "cluster state saved");
        Ok(())
    }

    /// Unix time at which `node_id` was first saved as greylisted, if it is
    /// greylisted in the persisted state.
    pub fn greylisted_since(&self, node_id: &str) -> StateResult<Option<u64>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(GREYLIST).map_err(map_err!(Table))?;
        let value = table.get(node_id).map_err(map_err!(Read))?;
        Ok(value.map(|v| v.value()))
    }

    /// Load the persisted state, or `None` if nothing has been saved.
    ///
    /// Greylist entries without a matching node are dropped.
    pub fn load_cluster(&self) -> StateResult<Option<ClusterState>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;

        let nodes_table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut records = Vec::new();
        for entry in nodes_table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: StoredNode =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            records.push(record);
        }
        if records.is_empty() {
            return Ok(None);
        }
        records.sort_by_key(|r| r.position);

        let mut state = ClusterState::new(records.into_iter().map(|r| r.node))?;

        let greylist_table = txn.open_table(GREYLIST).map_err(map_err!(Table))?;
        for entry in greylist_table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            let id = key.value();
            if state.greylist(id).is_err() {
                warn!(node_id = %id, "dropping persisted greylist entry for unknown node");
            }
        }

        debug!(nodes = state.len(), "cluster state loaded");
        Ok(Some(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> ClusterState {
        let mut state = ClusterState::new([
            Node::new("node-1", "10.0.0.1"),
            Node::new("node-2", "10.0.0.2"),
            Node::new("node-4-unstable", "10.0.0.4"),
        ])
        .unwrap();
        state.greylist("node-4-unstable").unwrap();
        state
    }

    #[test]
    fn empty_store_loads_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.load_cluster().unwrap().is_none());
    }

    #[test]
    fn save_and_load_preserves_order_and_greylist() {
        let store = StateStore::open_in_memory().unwrap();
        let state = test_state();

        store.save_cluster(&state).unwrap();
        let loaded = store.load_cluster().unwrap().unwrap();

        assert_eq!(loaded, state);
        assert!(loaded.is_greylisted("node-4-unstable"));
    }

    #[test]
    fn save_replaces_previous_contents() {
        let store = StateStore::open_in_memory().unwrap();
        let mut state = test_state();
        store.save_cluster(&state).unwrap();

        state.remove_node("node-4-unstable").unwrap();
        state.add_node(Node::new("node-new-1", "10.0.1.1")).unwrap();
        store.save_cluster(&state).unwrap();

        let loaded = store.load_cluster().unwrap().unwrap();
        let ids: Vec<_> = loaded.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["node-1", "node-2", "node-new-1"]);
        assert_eq!(loaded.greylisted().count(), 0);
    }

    #[test]
    fn greylist_keeps_first_saved_time() {
        let store = StateStore::open_in_memory().unwrap();
        let mut state = test_state();
        store.save_cluster(&state).unwrap();
        assert!(store.greylisted_since("node-4-unstable").unwrap().unwrap() > 0);

        // pretend the entry was written long ago
        let txn = store.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(GREYLIST).unwrap();
            table.insert("node-4-unstable", 42u64).unwrap();
        }
        txn.commit().unwrap();

        state.greylist("node-2").unwrap();
        store.save_cluster(&state).unwrap();
        assert_eq!(store.greylisted_since("node-4-unstable").unwrap(), Some(42));
        assert!(store.greylisted_since("node-2").unwrap().unwrap() > 42);

        state.ungreylist("node-4-unstable");
        store.save_cluster(&state).unwrap();
        assert_eq!(store.greylisted_since("node-4-unstable").unwrap(), None);
        assert_eq!(store.greylisted_since("node-1").unwrap(), None);
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.redb");

        {
            let store = StateStore::open(&path).unwrap();
            store.save_cluster(&test_state()).unwrap();
        }

        let store = StateStore::open(&path).unwrap();
        let loaded = store.load_cluster().unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded.is_greylisted("node-4-unstable"));
    }
}
