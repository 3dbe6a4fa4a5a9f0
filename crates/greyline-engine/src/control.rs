//! The control loop: sample, classify, escalate, sleep.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use greyline_classify::{Classifier, classify_or_none};
use greyline_core::NodeId;
use greyline_metrics::MetricsSource;
use greyline_state::{ClusterState, StateStore};

use crate::engine::{Action, Applied, Decision, EscalationEngine, decide};
use crate::error::ApplyError;

/// What happened to one node during a cycle.
#[derive(Debug)]
pub struct NodeOutcome {
    pub decision: Decision,
    pub result: Result<Applied, ApplyError>,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle: u64,
    pub outcomes: Vec<NodeOutcome>,
    /// A Critical node was handled and the remaining reports were skipped.
    pub halted_on_critical: bool,
    /// Members with no report this cycle, plus those skipped after a
    /// replacement.
    pub deferred: Vec<NodeId>,
    /// Cluster state changed and, if a store is configured, was saved.
    pub state_changed: bool,
}

impl CycleReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn actions(&self) -> impl Iterator<Item = (&str, Action)> {
        self.outcomes
            .iter()
            .map(|o| (o.decision.node_id.as_str(), o.decision.action))
    }
}

pub struct ControlLoop {
    state: ClusterState,
    metrics: Arc<dyn MetricsSource>,
    classifier: Arc<dyn Classifier>,
    engine: EscalationEngine,
    interval: Duration,
    store: Option<StateStore>,
    cycles: u64,
}

impl ControlLoop {
    pub fn new(
        state: ClusterState,
        metrics: Arc<dyn MetricsSource>,
        classifier: Arc<dyn Classifier>,
        engine: EscalationEngine,
        interval: Duration,
    ) -> Self {
        Self {
            state,
            metrics,
            classifier,
            engine,
            interval,
            store: None,
            cycles: 0,
        }
    }

    /// Save cluster state to `store` after every cycle that changes it.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one cycle.
    ///
    /// Reports are handled in the order the metrics source returns them.
    /// After the first Critical node the cycle stops, whether or not its
    /// replacement succeeded. Per-node remediation failures are recorded in
    /// the report; only fetch and persistence failures fail the cycle.
    pub async fn run_cycle(&mut self) -> anyhow::Result<CycleReport> {
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            ..CycleReport::default()
        };

        let nodes = self.state.nodes().to_vec();
        let before = self.state.clone();
        debug!(cycle = self.cycles, nodes = nodes.len(), "starting cycle");

        let reports = self
            .metrics
            .fetch_all(&nodes)
            .await
            .with_context(|| format!("fetching metrics from {}", self.metrics.name()))?;

        let mut seen: HashSet<NodeId> = HashSet::with_capacity(reports.len());
        for health in &reports {
            if report.halted_on_critical {
                break;
            }
            if !seen.insert(health.node_id.clone()) {
                warn!(node_id = %health.node_id, "duplicate report in one cycle, ignoring");
                continue;
            }

            let classification = classify_or_none(self.classifier.as_ref(), health).await;
            let decision = decide(health, &classification, &self.state);
            let result = self.engine.apply(&decision, &mut self.state).await;

            if let Err(e) = &result {
                error!(
                    node_id = %decision.node_id,
                    action = %decision.action,
                    committed = ?e.committed.as_ref().map(|n| &n.id),
                    error = %e.cause,
                    "remediation failed"
                );
            }
            report.halted_on_critical = decision.action == Action::Replace;
            report.outcomes.push(NodeOutcome { decision, result });
        }

        report.deferred = nodes
            .into_iter()
            .map(|n| n.id)
            .filter(|id| !seen.contains(id))
            .collect();
        if report.halted_on_critical && !report.deferred.is_empty() {
            info!(
                deferred = ?report.deferred,
                "replacement done this cycle, remaining nodes wait for the next"
            );
        }

        report.state_changed = self.state != before;
        if report.state_changed {
            if let Some(store) = &self.store {
                store
                    .save_cluster(&self.state)
                    .context("saving cluster state")?;
            }
        }

        Ok(report)
    }

    /// Run cycles until `shutdown` flips to true or its sender is dropped.
    ///
    /// Fixed delay: the interval is measured from the end of one cycle to
    /// the start of the next. A cycle in progress is never interrupted.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            nodes = self.state.len(),
            metrics = self.metrics.name(),
            classifier = self.classifier.name(),
            "control loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(report) => info!(
                    cycle = report.cycle,
                    evaluated = report.outcomes.len(),
                    failures = report.failures(),
                    deferred = report.deferred.len(),
                    halted = report.halted_on_critical,
                    "cycle complete"
                ),
                Err(e) => {
                    let cause = format!("{e:#}");
                    error!(cycle = self.cycles, error = %cause, "cycle failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(cycles = self.cycles, "control loop stopped");
    }
}
