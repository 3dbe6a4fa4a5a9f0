//! Fixed metrics source for dry runs and tests.
//!
//! Returns the healthy baseline for every node unless a report has been
//! pinned for it. Nodes marked missing get no report at all.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use greyline_core::{HealthReport, Node, NodeId};

use crate::{FetchFuture, MetricsSource};

#[derive(Debug, Default)]
pub struct StaticMetricsSource {
    pinned: Mutex<HashMap<NodeId, HealthReport>>,
    missing: Mutex<HashSet<NodeId>>,
}

impl StaticMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `report` for its node until replaced or cleared.
    pub fn pin(&self, report: HealthReport) {
        if let Ok(mut pinned) = self.pinned.lock() {
            pinned.insert(report.node_id.clone(), report);
        }
    }

    /// Go back to the healthy baseline for `node_id`.
    pub fn clear(&self, node_id: &str) {
        if let Ok(mut pinned) = self.pinned.lock() {
            pinned.remove(node_id);
        }
        if let Ok(mut missing) = self.missing.lock() {
            missing.remove(node_id);
        }
    }

    /// Produce no report for `node_id`.
    pub fn omit(&self, node_id: &str) {
        if let Ok(mut missing) = self.missing.lock() {
            missing.insert(node_id.to_string());
        }
    }

    fn collect(&self, nodes: &[Node]) -> anyhow::Result<Vec<HealthReport>> {
        let pinned = self
            .pinned
            .lock()
            .map_err(|_| anyhow::anyhow!("pinned reports lock poisoned"))?;
        let missing = self
            .missing
            .lock()
            .map_err(|_| anyhow::anyhow!("missing set lock poisoned"))?;

        Ok(nodes
            .iter()
            .filter(|n| !missing.contains(&n.id))
            .map(|n| {
                pinned
                    .get(&n.id)
                    .cloned()
                    .unwrap_or_else(|| HealthReport::healthy(n.id.clone()))
            })
            .collect())
    }
}

impl MetricsSource for StaticMetricsSource {
    fn fetch_all<'a>(&'a self, nodes: &'a [Node]) -> FetchFuture<'a> {
        let result = self.collect(nodes);
        Box::pin(async move { result })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
