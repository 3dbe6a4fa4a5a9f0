//! Test doubles for the engine's ports.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use greyline_classify::{ClassificationError, Classifier, ClassifyFuture};
use greyline_core::{Classification, HealthReport, Node, Severity};
use greyline_healer::{
    Alert, MembershipError, NotificationError, PortFuture, ProvisioningError, Remediator,
};
use greyline_state::ClusterState;

pub fn cluster(n: usize) -> ClusterState {
    ClusterState::new((1..=n).map(|i| Node::new(format!("node-{i}"), format!("10.0.0.{i}"))))
        .unwrap()
}

/// Per-node queue of severities. An empty queue yields `Severity::None`.
#[derive(Default)]
pub struct ScriptClassifier {
    script: Mutex<HashMap<String, VecDeque<Result<Severity, ()>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, node_id: &str, severity: Severity) -> &Self {
        self.script
            .lock()
            .unwrap()
            .entry(node_id.to_string())
            .or_default()
            .push_back(Ok(severity));
        self
    }

    pub fn push_failure(&self, node_id: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .entry(node_id.to_string())
            .or_default()
            .push_back(Err(()));
        self
    }

    /// Node ids classified so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Classifier for ScriptClassifier {
    fn classify<'a>(&'a self, report: &'a HealthReport) -> ClassifyFuture<'a> {
        self.calls.lock().unwrap().push(report.node_id.clone());
        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(&report.node_id)
            .and_then(|q| q.pop_front())
            .unwrap_or(Ok(Severity::None));
        Box::pin(async move {
            match next {
                Ok(severity) => Ok(Classification::new(severity, format!("scripted {severity}"))),
                Err(()) => Err(ClassificationError::Timeout(Duration::from_secs(30))),
            }
        })
    }

    fn name(&self) -> &'static str {
        "script"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Provision(String),
    Join(String),
    Leave(String),
    Notify {
        node_id: String,
        severity: Severity,
        follow_up: bool,
    },
}

/// Records every port call. Each step can be made to fail.
#[derive(Default)]
pub struct FakeRemediator {
    seq: AtomicU64,
    pub fail_provision: AtomicBool,
    pub fail_join: AtomicBool,
    pub fail_leave: AtomicBool,
    pub fail_notify: AtomicBool,
    calls: Mutex<Vec<Call>>,
}

impl FakeRemediator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn membership_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Notify { .. }))
            .collect()
    }

    pub fn alerts(&self) -> Vec<(String, Severity, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Notify {
                    node_id,
                    severity,
                    follow_up,
                } => Some((node_id, severity, follow_up)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Remediator for FakeRemediator {
    fn provision(&self) -> PortFuture<'_, Node, ProvisioningError> {
        Box::pin(async move {
            if self.fail_provision.load(Ordering::SeqCst) {
                self.record(Call::Provision("<failed>".into()));
                return Err(ProvisioningError::Failed("image pull failed".into()));
            }
            let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            let node = Node::new(format!("node-new-{n}"), format!("10.0.1.{n}"));
            self.record(Call::Provision(node.id.clone()));
            Ok(node)
        })
    }

    fn join<'a>(&'a self, address: &'a str) -> PortFuture<'a, (), MembershipError> {
        Box::pin(async move {
            self.record(Call::Join(address.to_string()));
            if self.fail_join.load(Ordering::SeqCst) {
                return Err(MembershipError::Rejected("join refused".into()));
            }
            Ok(())
        })
    }

    fn leave<'a>(&'a self, address: &'a str) -> PortFuture<'a, (), MembershipError> {
        Box::pin(async move {
            self.record(Call::Leave(address.to_string()));
            if self.fail_leave.load(Ordering::SeqCst) {
                return Err(MembershipError::Rejected("leader unreachable".into()));
            }
            Ok(())
        })
    }

    fn notify<'a>(&'a self, alert: &'a Alert) -> PortFuture<'a, (), NotificationError> {
        Box::pin(async move {
            self.record(Call::Notify {
                node_id: alert.node_id.clone(),
                severity: alert.severity,
                follow_up: alert.follow_up,
            });
            if self.fail_notify.load(Ordering::SeqCst) {
                return Err(NotificationError::Delivery("smtp down".into()));
            }
            Ok(())
        })
    }
}
