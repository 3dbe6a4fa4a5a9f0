//! Scripted classifier for demos and dry runs.
//!
//! Nodes whose ID contains the unstable marker walk through
//! None → Warning → Critical as the classifier's own call counter reaches
//! `warning_after` and `critical_after`. Every call counts, across all
//! nodes. Every other node is always healthy.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use greyline_core::{Classification, HealthReport};

use crate::{Classifier, ClassifyFuture};

#[derive(Debug)]
pub struct ScriptedClassifier {
    warning_after: u64,
    critical_after: u64,
    unstable_marker: String,
    calls: AtomicU64,
}

impl ScriptedClassifier {
    pub fn new(
        warning_after: u64,
        critical_after: u64,
        unstable_marker: impl Into<String>,
    ) -> Self {
        Self {
            warning_after,
            critical_after,
            unstable_marker: unstable_marker.into(),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of classifications performed so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn evaluate(&self, report: &HealthReport) -> Classification {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let node_id = &report.node_id;

        if !node_id.contains(&self.unstable_marker) {
            return Classification::none("node is stable");
        }

        if call >= self.critical_after {
            debug!(%node_id, call, "scripted critical");
            Classification::critical(format!(
                "node '{node_id}' is showing multiple critical signs (S.M.A.R.T. warnings)"
            ))
        } else if call >= self.warning_after {
            debug!(%node_id, call, "scripted warning");
            Classification::warning(format!(
                "node '{node_id}' is showing early signs of trouble (elevated latency)"
            ))
        } else {
            Classification::none("unstable node is currently healthy")
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn classify<'a>(&'a self, report: &'a HealthReport) -> ClassifyFuture<'a> {
        let result = self.evaluate(report);
        Box::pin(async move { Ok(result) })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
