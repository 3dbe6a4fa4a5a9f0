//! Threshold classifier.
//!
//! ```text
//! critical: smart_warnings > 0
//!           disk_io_errors > 10
//!           latency_p99_ms > 400
//!           checksum_mismatch_rate >= 0.01
//!
//! warning:  latency_p99_ms in 150..=400
//!           disk_io_errors in 1..=10
//!           checksum_mismatch_rate in (0.001, 0.01)
//!           network_packet_loss_rate > 0.05
//!           raft_term_changes_per_hour > 5
//!           available_disk_gb < 100
//! ```
//!
//! Any critical signal wins; the reason lists every signal that fired.

use greyline_core::{Classification, HealthReport};

use crate::{Classifier, ClassifyFuture};

/// Tunable limits. `Default` matches the table in the module docs.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleThresholds {
    pub critical_disk_io_errors: u32,
    pub critical_latency_ms: u32,
    pub critical_checksum_rate: f64,
    pub warning_latency_ms: u32,
    pub warning_checksum_rate: f64,
    pub warning_packet_loss: f64,
    pub warning_term_changes: u32,
    pub warning_min_disk_gb: u64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            critical_disk_io_errors: 10,
            critical_latency_ms: 400,
            critical_checksum_rate: 0.01,
            warning_latency_ms: 150,
            warning_checksum_rate: 0.001,
            warning_packet_loss: 0.05,
            warning_term_changes: 5,
            warning_min_disk_gb: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleClassifier {
    thresholds: RuleThresholds,
}

impl RuleClassifier {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify synchronously.
    pub fn evaluate(&self, report: &HealthReport) -> Classification {
        let t = &self.thresholds;

        let mut critical = Vec::new();
        if report.smart_warnings > 0 {
            critical.push(format!("{} S.M.A.R.T. warnings", report.smart_warnings));
        }
        if report.disk_io_errors > t.critical_disk_io_errors {
            critical.push(format!("{} disk I/O errors", report.disk_io_errors));
        }
        if report.latency_p99_ms > t.critical_latency_ms {
            critical.push(format!("p99 latency {}ms", report.latency_p99_ms));
        }
        if report.checksum_mismatch_rate >= t.critical_checksum_rate {
            critical.push(format!(
                "checksum mismatch rate {:.4}",
                report.checksum_mismatch_rate
            ));
        }
        if !critical.is_empty() {
            return Classification::critical(critical.join(", "));
        }

        let mut warning = Vec::new();
        if report.latency_p99_ms >= t.warning_latency_ms {
            warning.push(format!("p99 latency {}ms", report.latency_p99_ms));
        }
        if report.disk_io_errors > 0 {
            warning.push(format!("{} disk I/O errors", report.disk_io_errors));
        }
        if report.checksum_mismatch_rate > t.warning_checksum_rate {
            warning.push(format!(
                "checksum mismatch rate {:.4}",
                report.checksum_mismatch_rate
            ));
        }
        if report.network_packet_loss_rate > t.warning_packet_loss {
            warning.push(format!(
                "packet loss {:.1}%",
                report.network_packet_loss_rate * 100.0
            ));
        }
        if report.raft_term_changes_per_hour > t.warning_term_changes {
            warning.push(format!(
                "{} raft term changes/hour",
                report.raft_term_changes_per_hour
            ));
        }
        if report.available_disk_gb < t.warning_min_disk_gb {
            warning.push(format!("{}GB disk free", report.available_disk_gb));
        }
        if !warning.is_empty() {
            return Classification::warning(warning.join(", "));
        }

        Classification::none("all signals within normal range")
    }
}

impl Classifier for RuleClassifier {
    fn classify<'a>(&'a self, report: &'a HealthReport) -> ClassifyFuture<'a> {
        let result = self.evaluate(report);
        Box::pin(async move { Ok(result) })
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}
