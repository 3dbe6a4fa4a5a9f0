//! Alert rendering and delivery.
//!
//! Alerting is best-effort: a sink failure is reported to the caller but
//! must never hold up remediation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use greyline_core::{NodeId, Severity};

use crate::error::NotificationError;

/// What to tell the operator about one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub recipient: String,
    pub node_id: NodeId,
    pub reason: String,
    pub severity: Severity,
    /// Warning for a node that is already greylisted.
    pub follow_up: bool,
}

/// A rendered alert ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Alert {
    /// Render subject and body. `Severity::None` produces no message.
    pub fn render(&self) -> Option<AlertMessage> {
        let node_id = &self.node_id;
        let (subject, action_taken) = match (self.severity, self.follow_up) {
            (Severity::None, _) => return None,
            (Severity::Critical, _) => (
                format!("CRITICAL Alert: Immediate Replacement for Node {node_id}"),
                format!("The agent has initiated a full replacement of node '{node_id}'."),
            ),
            (Severity::Warning, true) => (
                format!("FOLLOW-UP Alert: Node {node_id} Still in Greylist"),
                format!(
                    "This is a follow-up alert. Node '{node_id}' remains in the greylist \
                     and is being monitored."
                ),
            ),
            (Severity::Warning, false) => (
                format!("WARNING Alert: Node {node_id} Added to Greylist"),
                format!(
                    "The agent has added node '{node_id}' to the greylist and expanded \
                     the cluster to mitigate risk."
                ),
            ),
        };

        let body = format!(
            "Greetings System Administrator,\n\n\
             This is an automated alert from the greyline cluster health controller.\n\n\
             - Severity: {severity}\n\
             - Node: {node_id}\n\
             - Reason: {reason}\n\
             - Action Taken: {action_taken}\n\n\
             Please monitor the cluster's health.\n",
            severity = self.severity.as_str().to_uppercase(),
            reason = self.reason,
        );

        Some(AlertMessage {
            recipient: self.recipient.clone(),
            subject,
            body,
        })
    }
}

/// Boxed future returned by [`AlertSink::deliver`].
pub type DeliverFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send + 'a>>;

/// Transport for rendered alerts (mail, chat webhook, pager...).
pub trait AlertSink: Send + Sync {
    fn deliver<'a>(&'a self, message: &'a AlertMessage) -> DeliverFuture<'a>;
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn deliver<'a>(&'a self, message: &'a AlertMessage) -> DeliverFuture<'a> {
        info!(
            target: "greyline::alert",
            to = %message.recipient,
            subject = %message.subject,
            "{}",
            message.body
        );
        Box::pin(async { Ok(()) })
    }
}

/// Renders alerts and forwards them to a sink when alerting is enabled.
#[derive(Clone)]
pub struct Alerter {
    enabled: bool,
    sink: Arc<dyn AlertSink>,
}

impl Alerter {
    pub fn new(enabled: bool, sink: Arc<dyn AlertSink>) -> Self {
        Self { enabled, sink }
    }

    pub async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        if !self.enabled {
            debug!(node_id = %alert.node_id, "alerting disabled, dropping alert");
            return Ok(());
        }
        let Some(message) = alert.render() else {
            return Ok(());
        };
        self.sink.deliver(&message).await
    }
}
