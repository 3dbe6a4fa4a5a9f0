//! Domain types shared across the controller.
//!
//! These are plain values: a [`HealthReport`] is produced once per node per
//! cycle, classified into a [`Classification`], and discarded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique, stable identifier for a cluster node.
pub type NodeId = String;

// ── Node ───────────────────────────────────────────────────────────

/// A member of the monitored cluster.
///
/// Nodes are never mutated in place; an address change means a new node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub address: String,
}

impl Node {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.address)
    }
}

// ── Health report ──────────────────────────────────────────────────

/// One sample of a node's health signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub node_id: NodeId,
    /// Unix timestamp (seconds) when the sample was taken.
    pub timestamp: u64,
    pub disk_io_errors: u32,
    /// Fraction of packets lost, in `[0, 1]`.
    pub network_packet_loss_rate: f64,
    pub latency_p99_ms: u32,
    /// S.M.A.R.T. warnings reported by the node's disks.
    pub smart_warnings: u32,
    /// Fraction of reads failing checksum verification, in `[0, 1]`.
    pub checksum_mismatch_rate: f64,
    pub raft_term_changes_per_hour: u32,
    pub available_disk_gb: u64,
}

impl HealthReport {
    /// A report with every signal at its healthy baseline.
    pub fn healthy(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            timestamp: epoch_secs(),
            disk_io_errors: 0,
            network_packet_loss_rate: 0.0,
            latency_p99_ms: 20,
            smart_warnings: 0,
            checksum_mismatch_rate: 0.0,
            raft_term_changes_per_hour: 0,
            available_disk_gb: 1000,
        }
    }
}

// ── Severity ───────────────────────────────────────────────────────

/// Predicted failure risk tier for a node.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a severity string is not one of the known tiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity: {0}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "healthy" | "ok" => Ok(Severity::None),
            "warning" | "warn" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

// ── Classification ─────────────────────────────────────────────────

/// Result of classifying one health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    pub reason: String,
}

impl Classification {
    pub fn new(severity: Severity, reason: impl Into<String>) -> Self {
        Self {
            severity,
            reason: reason.into(),
        }
    }

    pub fn none(reason: impl Into<String>) -> Self {
        Self::new(Severity::None, reason)
    }

    pub fn warning(reason: impl Into<String>) -> Self {
        Self::new(Severity::Warning, reason)
    }

    pub fn critical(reason: impl Into<String>) -> Self {
        Self::new(Severity::Critical, reason)
    }
}

/// Seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_risk() {
        assert!(Severity::None < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!(" warning ".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("none".parse::<Severity>(), Ok(Severity::None));
        assert!("degraded".parse::<Severity>().is_err());
    }

    #[test]
    fn classification_deserializes_lowercase_severity() {
        let c: Classification =
            serde_json::from_str(r#"{"severity":"warning","reason":"latency"}"#).unwrap();
        assert_eq!(c, Classification::warning("latency"));
    }

    #[test]
    fn healthy_report_has_clean_signals() {
        let r = HealthReport::healthy("node-1");
        assert_eq!(r.node_id, "node-1");
        assert_eq!(r.disk_io_errors, 0);
        assert_eq!(r.smart_warnings, 0);
        assert!(r.timestamp > 0);
    }

    #[test]
    fn node_display_includes_address() {
        let n = Node::new("node-1", "10.0.0.1");
        assert_eq!(n.to_string(), "node-1 (10.0.0.1)");
    }
}
