//! greyline-core — shared types and configuration for the greyline
//! cluster health controller.
//!
//! Every other crate in the workspace speaks in terms of the value types
//! defined here: [`Node`], [`HealthReport`], [`Severity`] and
//! [`Classification`]. Reports and classifications are cycle-scoped; the
//! only cross-cycle memory lives in `greyline-state::ClusterState`.

pub mod config;
pub mod duration;
pub mod types;

pub use config::{ConfigError, GreylineConfig};
pub use duration::parse_duration;
pub use types::*;
