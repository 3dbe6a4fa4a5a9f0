//! Node provisioning.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::info;

use greyline_core::Node;

use crate::error::ProvisioningError;

/// Monotonic counter used to name provisioned nodes.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    last: AtomicU64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering after `last`.
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    /// Start numbering after the highest `{prefix}-{n}` among `nodes`, so a
    /// restarted controller never reuses a name it handed out before.
    pub fn resume<'a>(prefix: &str, nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let stem = format!("{prefix}-");
        let last = nodes
            .into_iter()
            .filter_map(|n| n.id.strip_prefix(&stem)?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self::starting_after(last)
    }

    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Creates new nodes named `{id_prefix}-{n}` at `address_template` with
/// `{i}` replaced by `n`.
#[derive(Debug, Clone)]
pub struct Provisioner {
    sequence: Arc<SequenceGenerator>,
    id_prefix: String,
    address_template: String,
    delay: Duration,
}

impl Provisioner {
    pub fn new(
        sequence: Arc<SequenceGenerator>,
        id_prefix: impl Into<String>,
        address_template: impl Into<String>,
    ) -> Self {
        Self {
            sequence,
            id_prefix: id_prefix.into(),
            address_template: address_template.into(),
            delay: Duration::ZERO,
        }
    }

    /// Simulated time to bring a node up.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn provision(&self) -> Result<Node, ProvisioningError> {
        let n = self.sequence.next();
        let node = Node::new(
            format!("{}-{n}", self.id_prefix),
            self.address_template.replace("{i}", &n.to_string()),
        );
        info!(node_id = %node.id, address = %node.address, "provisioning replacement node");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        info!(node_id = %node.id, "node ready");
        Ok(node)
    }
}
