//! greyline-healer — the side-effecting half of remediation.
//!
//! [`Remediator`] is the port the escalation engine drives. It covers four
//! operations:
//!
//! ```text
//! Remediator
//!   ├── provision()      → new Node          (ProvisioningError)
//!   ├── join(address)    → add consensus peer (MembershipError)
//!   ├── leave(address)   → drop consensus peer (MembershipError)
//!   └── notify(alert)    → best-effort alert  (NotificationError)
//! ```
//!
//! [`Healer`] is the shipped implementation: a [`Provisioner`] naming nodes
//! from an owned [`SequenceGenerator`], a [`MembershipBackend`] that either
//! simulates peer changes or runs an admin command, and an [`Alerter`] that
//! renders alerts and hands them to an [`AlertSink`].

pub mod alert;
pub mod error;
pub mod healer;
pub mod membership;
pub mod provision;

use std::future::Future;
use std::pin::Pin;

use greyline_core::Node;

pub use alert::{Alert, AlertMessage, AlertSink, Alerter, LogSink};
pub use error::{MembershipError, NotificationError, ProvisioningError};
pub use healer::Healer;
pub use membership::MembershipBackend;
pub use provision::{Provisioner, SequenceGenerator};

/// Boxed future returned by port operations.
pub type PortFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Provisioning, membership, and notification side effects.
pub trait Remediator: Send + Sync {
    /// Create a new, healthy node. It is not yet a consensus member.
    fn provision(&self) -> PortFuture<'_, Node, ProvisioningError>;

    /// Add the node at `address` to the consensus group.
    fn join<'a>(&'a self, address: &'a str) -> PortFuture<'a, (), MembershipError>;

    /// Remove the node at `address` from the consensus group.
    fn leave<'a>(&'a self, address: &'a str) -> PortFuture<'a, (), MembershipError>;

    /// Deliver an alert. Callers must not let a failure here abort remediation.
    fn notify<'a>(&'a self, alert: &'a Alert) -> PortFuture<'a, (), NotificationError>;
}
