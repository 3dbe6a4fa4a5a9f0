//! greyline-metrics — collects one [`HealthReport`] per node per cycle.
//!
//! The controller only relies on the [`MetricsSource`] contract: one report
//! per input node, in input order. A node with no report is deferred to the
//! next cycle. Where the numbers come from (Prometheus, log scraping, a node
//! agent) is the source's business.

pub mod fixed;
pub mod simulated;

use std::future::Future;
use std::pin::Pin;

use greyline_core::{HealthReport, Node};

pub use fixed::StaticMetricsSource;
pub use simulated::SimulatedMetricsSource;

/// Boxed future returned by [`MetricsSource::fetch_all`].
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<Vec<HealthReport>>> + Send + 'a>>;

pub trait MetricsSource: Send + Sync {
    /// Fetch reports for `nodes`, in the same order. Nodes the source could
    /// not sample are simply absent from the result.
    fn fetch_all<'a>(&'a self, nodes: &'a [Node]) -> FetchFuture<'a>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
