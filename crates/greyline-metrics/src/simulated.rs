//! Simulated metrics for demos.
//!
//! Every node reports a healthy baseline with a little jitter. Nodes whose
//! ID contains the unstable marker show anomalies 60% of the time (with
//! S.M.A.R.T. warnings in 40% of those); any other node has a 5% chance of
//! a latency glitch.

use rand::Rng;
use tracing::debug;

use greyline_core::{HealthReport, Node, epoch_secs};

use crate::{FetchFuture, MetricsSource};

#[derive(Debug, Clone)]
pub struct SimulatedMetricsSource {
    unstable_marker: String,
}

impl SimulatedMetricsSource {
    pub fn new(unstable_marker: impl Into<String>) -> Self {
        Self {
            unstable_marker: unstable_marker.into(),
        }
    }

    /// Generate one report for `node`.
    pub fn sample<R: Rng + ?Sized>(&self, node: &Node, rng: &mut R) -> HealthReport {
        let mut report = HealthReport {
            node_id: node.id.clone(),
            timestamp: epoch_secs(),
            disk_io_errors: 0,
            network_packet_loss_rate: rng.gen_range(0.0..0.01),
            latency_p99_ms: rng.gen_range(10..=50),
            smart_warnings: 0,
            checksum_mismatch_rate: rng.gen_range(0.0..0.001),
            raft_term_changes_per_hour: rng.gen_range(0..=2),
            available_disk_gb: rng.gen_range(500..=4000),
        };

        let unstable = node.id.contains(&self.unstable_marker);
        if unstable && rng.gen_bool(0.6) {
            report.disk_io_errors = rng.gen_range(1..=10);
            report.latency_p99_ms = rng.gen_range(200..=1000);
            report.checksum_mismatch_rate = rng.gen_range(0.05..0.2);
            if rng.gen_bool(0.4) {
                report.smart_warnings = rng.gen_range(1..=5);
            }
        } else if rng.gen_bool(0.05) {
            report.latency_p99_ms = rng.gen_range(100..=300);
        }

        report
    }
}

impl MetricsSource for SimulatedMetricsSource {
    fn fetch_all<'a>(&'a self, nodes: &'a [Node]) -> FetchFuture<'a> {
        let reports: Vec<HealthReport> = {
            let mut rng = rand::thread_rng();
            nodes.iter().map(|n| self.sample(n, &mut rng)).collect()
        };
        debug!(count = reports.len(), "simulated health reports collected");
        Box::pin(async move { Ok(reports) })
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
