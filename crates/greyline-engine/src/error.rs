//! Remediation failure types.

use thiserror::Error;

use greyline_core::{Node, NodeId};
use greyline_healer::{MembershipError, ProvisioningError};
use greyline_state::StateError;

use crate::engine::Action;

/// Which step of a remediation failed.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("provisioning failed: {0}")]
    Provision(#[source] ProvisioningError),

    #[error("joining {address} failed: {source}")]
    Join {
        address: String,
        #[source]
        source: MembershipError,
    },

    #[error("removing {address} failed: {source}")]
    Leave {
        address: String,
        #[source]
        source: MembershipError,
    },

    #[error("cluster state update failed: {0}")]
    State(#[from] StateError),

    #[error("node {0} is not a cluster member")]
    UnknownNode(NodeId),
}

/// A remediation that did not complete.
///
/// `committed` holds a node that was added to cluster state despite the
/// failure; it is only set when a replacement joined but the failing node
/// could not be removed.
#[derive(Debug, Error)]
#[error("{action:?} for {node_id} failed: {cause}")]
pub struct ApplyError {
    pub action: Action,
    pub node_id: NodeId,
    #[source]
    pub cause: RemediationError,
    pub committed: Option<Node>,
}
