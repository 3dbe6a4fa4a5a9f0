//! greyline-engine — severity escalation and the control loop.
//!
//! # Decision table
//!
//! ```text
//! severity   greylisted   action
//! ────────   ──────────   ───────────────────────────────────────────
//! Critical   any          Replace  (provision, join, leave old, swap)
//! Warning    no           Expand   (provision, join, greylist origin)
//! Warning    yes          ReAlert  (follow-up alert only)
//! None       yes          Recover  (ungreylist, membership untouched)
//! None       no           NoOp
//! ```
//!
//! # Cycle
//!
//! ```text
//! ControlLoop::run_cycle
//!   ├── MetricsSource::fetch_all(nodes)      one report per node
//!   └── for each report, in order
//!       ├── classify_or_none()               failure → Severity::None
//!       ├── decide()                         pure, reads ClusterState
//!       ├── EscalationEngine::apply()        side effects, then commit
//!       └── stop after the first Replace
//! ```
//!
//! Nodes are processed one at a time, so `ClusterState` has a single writer.
//! At most one replacement happens per cycle; nodes after it wait for the
//! next cycle.

pub mod control;
pub mod engine;
pub mod error;

pub use control::{ControlLoop, CycleReport, NodeOutcome};
pub use engine::{Action, Applied, Decision, EscalationEngine, decide};
pub use error::{ApplyError, RemediationError};
