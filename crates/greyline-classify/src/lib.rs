//! greyline-classify — turns a [`HealthReport`] into a [`Classification`].
//!
//! The controller treats classification as a black box with latency and a
//! failure mode. [`Classifier`] is the seam; three implementations ship:
//!
//! ```text
//! Classifier
//!   ├── RuleClassifier      fixed thresholds over the report's signals
//!   ├── ScriptedClassifier  deterministic None → Warning → Critical progression
//!   └── LlmClassifier       OpenAI-compatible chat completion
//! ```
//!
//! A failed classification must never stop the control loop. Callers use
//! [`classify_or_none`], which logs the failure and falls back to
//! `Severity::None` for this cycle.

pub mod error;
pub mod llm;
pub mod rules;
pub mod scripted;

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use greyline_core::{Classification, HealthReport};

pub use error::ClassificationError;
pub use llm::{LlmClassifier, LlmSettings};
pub use rules::{RuleClassifier, RuleThresholds};
pub use scripted::ScriptedClassifier;

/// Boxed future returned by [`Classifier::classify`].
pub type ClassifyFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Classification, ClassificationError>> + Send + 'a>>;

/// Health report → classification.
pub trait Classifier: Send + Sync {
    /// Classify one report. Implementations hold no per-node state.
    fn classify<'a>(&'a self, report: &'a HealthReport) -> ClassifyFuture<'a>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Classify `report`, treating any failure as `Severity::None`.
pub async fn classify_or_none(
    classifier: &dyn Classifier,
    report: &HealthReport,
) -> Classification {
    match classifier.classify(report).await {
        Ok(classification) => classification,
        Err(e) => {
            warn!(
                node_id = %report.node_id,
                classifier = classifier.name(),
                error = %e,
                "classification failed, treating node as healthy this cycle"
            );
            Classification::none(format!("classification failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greyline_core::Severity;

    struct Failing;

    impl Classifier for Failing {
        fn classify<'a>(&'a self, _report: &'a HealthReport) -> ClassifyFuture<'a> {
            Box::pin(async { Err(ClassificationError::RateLimited("slow down".into())) })
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn failure_falls_back_to_none() {
        let report = HealthReport::healthy("node-1");
        let c = classify_or_none(&Failing, &report).await;
        assert_eq!(c.severity, Severity::None);
        assert!(c.reason.contains("rate limited"));
    }

    #[tokio::test]
    async fn success_passes_through() {
        let mut report = HealthReport::healthy("node-1");
        report.smart_warnings = 2;
        let c = classify_or_none(&RuleClassifier::default(), &report).await;
        assert_eq!(c.severity, Severity::Critical);
    }
}
