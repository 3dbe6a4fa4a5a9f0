//! In-memory cluster membership and greylist.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use greyline_core::{Node, NodeId};

use crate::error::{StateError, StateResult};

/// Live membership as the controller sees it.
///
/// Nodes keep insertion order, so reports are fetched and evaluated in a
/// stable order: initial nodes first, then nodes added by remediation.
///
/// Invariant: every greylisted ID is a member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterState {
    nodes: Vec<Node>,
    greylist: BTreeSet<NodeId>,
}

impl ClusterState {
    /// Build state from an initial node list. Node IDs must be unique.
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> StateResult<Self> {
        let mut state = Self::default();
        for node in nodes {
            state.add_node(node)?;
        }
        Ok(state)
    }

    /// Rebuild state from persisted parts, checking the greylist invariant.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        greylist: impl IntoIterator<Item = NodeId>,
    ) -> StateResult<Self> {
        let mut state = Self::new(nodes)?;
        for id in greylist {
            state.greylist(&id)?;
        }
        Ok(state)
    }

    /// Add a new member. Fails if a node with the same ID already exists.
    pub fn add_node(&mut self, node: Node) -> StateResult<()> {
        if self.contains(&node.id) {
            return Err(StateError::DuplicateNode(node.id));
        }
        debug!(node_id = %node.id, address = %node.address, "node added");
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a member, dropping any greylist entry for it.
    pub fn remove_node(&mut self, node_id: &str) -> StateResult<Node> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| StateError::UnknownNode(node_id.to_string()))?;
        self.greylist.remove(node_id);
        let node = self.nodes.remove(pos);
        debug!(%node_id, "node removed");
        Ok(node)
    }

    /// Flag a member as suspect. Returns `true` if it was not already flagged.
    pub fn greylist(&mut self, node_id: &str) -> StateResult<bool> {
        if !self.contains(node_id) {
            return Err(StateError::UnknownNode(node_id.to_string()));
        }
        Ok(self.greylist.insert(node_id.to_string()))
    }

    /// Clear a node's suspect flag. Returns `true` if it was flagged.
    pub fn ungreylist(&mut self, node_id: &str) -> bool {
        self.greylist.remove(node_id)
    }

    pub fn get(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.get(node_id).is_some()
    }

    pub fn is_greylisted(&self, node_id: &str) -> bool {
        self.greylist.contains(node_id)
    }

    /// Members in evaluation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Greylisted IDs in sorted order.
    pub fn greylisted(&self) -> impl Iterator<Item = &str> {
        self.greylist.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `greylist ⊆ nodes` holds.
    pub fn is_consistent(&self) -> bool {
        self.greylist.iter().all(|id| self.contains(id))
    }

    /// Read-only copy for reporting.
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeView {
                    node: n.clone(),
                    greylisted: self.greylist.contains(&n.id),
                })
                .collect(),
        }
    }
}

/// Point-in-time view of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub nodes: Vec<NodeView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub node: Node,
    pub greylisted: bool,
}

impl ClusterSnapshot {
    pub fn greylisted_count(&self) -> usize {
        self.nodes.iter().filter(|v| v.greylisted).count()
    }
}

impl fmt::Display for ClusterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, view) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "  - {}", view.node)?;
            if view.greylisted {
                f.write_str(" [GREYLISTED]")?;
            }
        }
        Ok(())
    }
}
