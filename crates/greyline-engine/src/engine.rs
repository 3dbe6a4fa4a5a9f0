//! Escalation: map a classified report to an action and carry it out.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use greyline_core::{Classification, HealthReport, Node, NodeId, Severity};
use greyline_healer::{Alert, Remediator};
use greyline_state::ClusterState;

use crate::error::{ApplyError, RemediationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NoOp,
    /// Drop a healthy node from the greylist.
    Recover,
    /// Add capacity and greylist the suspect node.
    Expand,
    /// Follow-up alert for a node already greylisted.
    ReAlert,
    /// Swap a failing node for a freshly provisioned one.
    Replace,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::NoOp => "noop",
            Action::Recover => "recover",
            Action::Expand => "expand",
            Action::ReAlert => "realert",
            Action::Replace => "replace",
        }
    }

    /// Whether the action changes consensus membership.
    pub fn changes_membership(&self) -> bool {
        matches!(self, Action::Expand | Action::Replace)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine intends to do about one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub node_id: NodeId,
    pub severity: Severity,
    pub reason: String,
    pub action: Action,
}

/// Effect of a completed action on cluster state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub action: Action,
    pub added: Option<Node>,
    pub removed: Option<Node>,
}

impl Applied {
    fn new(action: Action) -> Self {
        Self {
            action,
            added: None,
            removed: None,
        }
    }
}

/// Choose an action from severity and greylist status.
///
/// Reports for nodes that are not cluster members always produce
/// `Action::NoOp`.
pub fn decide(
    report: &HealthReport,
    classification: &Classification,
    state: &ClusterState,
) -> Decision {
    let node_id = &report.node_id;
    let action = if !state.contains(node_id) {
        warn!(%node_id, severity = %classification.severity, "report for unknown node, ignoring");
        Action::NoOp
    } else {
        match (classification.severity, state.is_greylisted(node_id)) {
            (Severity::Critical, _) => Action::Replace,
            (Severity::Warning, false) => Action::Expand,
            (Severity::Warning, true) => Action::ReAlert,
            (Severity::None, true) => Action::Recover,
            (Severity::None, false) => Action::NoOp,
        }
    };

    Decision {
        node_id: node_id.clone(),
        severity: classification.severity,
        reason: classification.reason.clone(),
        action,
    }
}

/// Carries out decisions against a [`Remediator`].
///
/// Cluster state is only written after every external step of an action has
/// succeeded, so a failed action leaves state as it was. The one exception
/// is a replacement whose new node joined but whose failing node could not
/// be removed: the new node is recorded, the old node stays and keeps its
/// greylist entry, and the error carries the committed node.
#[derive(Clone)]
pub struct EscalationEngine {
    remediator: Arc<dyn Remediator>,
    recipient: String,
}

impl EscalationEngine {
    pub fn new(remediator: Arc<dyn Remediator>, recipient: impl Into<String>) -> Self {
        Self {
            remediator,
            recipient: recipient.into(),
        }
    }

    pub async fn apply(
        &self,
        decision: &Decision,
        state: &mut ClusterState,
    ) -> Result<Applied, ApplyError> {
        let fail = |cause: RemediationError| ApplyError {
            action: decision.action,
            node_id: decision.node_id.clone(),
            cause,
            committed: None,
        };

        match decision.action {
            Action::NoOp => {
                debug!(node_id = %decision.node_id, "node healthy");
                Ok(Applied::new(Action::NoOp))
            }
            Action::Recover => {
                if state.ungreylist(&decision.node_id) {
                    info!(node_id = %decision.node_id, "node recovered, removed from greylist");
                }
                Ok(Applied::new(Action::Recover))
            }
            Action::ReAlert => {
                info!(
                    node_id = %decision.node_id,
                    reason = %decision.reason,
                    "node still degraded"
                );
                self.notify(decision, true).await;
                Ok(Applied::new(Action::ReAlert))
            }
            Action::Expand => self.expand(decision, state).await.map_err(fail),
            Action::Replace => self.replace(decision, state).await,
        }
    }

    async fn expand(
        &self,
        decision: &Decision,
        state: &mut ClusterState,
    ) -> Result<Applied, RemediationError> {
        let node_id = &decision.node_id;
        if !state.contains(node_id) {
            return Err(RemediationError::UnknownNode(node_id.clone()));
        }
        warn!(%node_id, reason = %decision.reason, "node degraded, expanding cluster");
        self.notify(decision, false).await;

        let node = self.provision_and_join(state).await?;

        state.add_node(node.clone())?;
        state.greylist(node_id)?;
        info!(%node_id, added = %node.id, "cluster expanded, node greylisted");
        log_snapshot(state);

        Ok(Applied {
            action: Action::Expand,
            added: Some(node),
            removed: None,
        })
    }

    async fn replace(
        &self,
        decision: &Decision,
        state: &mut ClusterState,
    ) -> Result<Applied, ApplyError> {
        let node_id = &decision.node_id;
        let fail = |cause: RemediationError, committed: Option<Node>| ApplyError {
            action: Action::Replace,
            node_id: node_id.clone(),
            cause,
            committed,
        };

        let failing = state
            .get(node_id)
            .cloned()
            .ok_or_else(|| fail(RemediationError::UnknownNode(node_id.clone()), None))?;
        error!(%node_id, reason = %decision.reason, "node failing, starting replacement");
        self.notify(decision, false).await;

        let node = self
            .provision_and_join(state)
            .await
            .map_err(|cause| fail(cause, None))?;

        if let Err(source) = self.remediator.leave(&failing.address).await {
            // The new peer is already a consensus member, so it has to be
            // tracked even though the old one could not be removed.
            return match state.add_node(node.clone()) {
                Ok(()) => {
                    log_snapshot(state);
                    Err(fail(
                        RemediationError::Leave {
                            address: failing.address,
                            source,
                        },
                        Some(node),
                    ))
                }
                Err(e) => Err(fail(e.into(), None)),
            };
        }

        let removed = state
            .remove_node(node_id)
            .map_err(|e| fail(e.into(), None))?;
        state
            .add_node(node.clone())
            .map_err(|e| fail(e.into(), None))?;
        info!(%node_id, added = %node.id, "node replaced");
        log_snapshot(state);

        Ok(Applied {
            action: Action::Replace,
            added: Some(node),
            removed: Some(removed),
        })
    }

    /// Provision a node and add it to the consensus group. State is not
    /// touched; the new id is checked against it before joining.
    async fn provision_and_join(&self, state: &ClusterState) -> Result<Node, RemediationError> {
        let node = self
            .remediator
            .provision()
            .await
            .map_err(RemediationError::Provision)?;

        if state.contains(&node.id) {
            return Err(RemediationError::State(
                greyline_state::StateError::DuplicateNode(node.id),
            ));
        }

        self.remediator
            .join(&node.address)
            .await
            .map_err(|source| RemediationError::Join {
                address: node.address.clone(),
                source,
            })?;
        Ok(node)
    }

    async fn notify(&self, decision: &Decision, follow_up: bool) {
        let alert = Alert {
            recipient: self.recipient.clone(),
            node_id: decision.node_id.clone(),
            reason: decision.reason.clone(),
            severity: decision.severity,
            follow_up,
        };
        if let Err(e) = self.remediator.notify(&alert).await {
            warn!(node_id = %decision.node_id, error = %e, "alert delivery failed");
        }
    }
}

fn log_snapshot(state: &ClusterState) {
    let snapshot = state.snapshot();
    info!(
        nodes = state.len(),
        greylisted = snapshot.greylisted_count(),
        "cluster state:\n{snapshot}"
    );
}
