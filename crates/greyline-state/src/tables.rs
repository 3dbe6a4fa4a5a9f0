//! redb table definitions for persisted cluster state.

use redb::TableDefinition;

/// Member nodes keyed by node ID. Values are JSON `StoredNode` records.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Greylisted node IDs. The value is the Unix time the node was first
/// saved as greylisted; later saves keep it.
pub const GREYLIST: TableDefinition<&str, u64> = TableDefinition::new("greylist");
