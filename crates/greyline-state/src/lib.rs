//! greyline-state — authoritative cluster membership for the controller.
//!
//! [`ClusterState`] holds the nodes the controller believes are alive and
//! the set of greylisted node IDs. Every mutation goes through it and keeps
//! `greylist ⊆ nodes`.
//!
//! [`StateStore`] optionally persists a `ClusterState` across restarts,
//! backed by [redb](https://docs.rs/redb). Values are JSON-serialized into
//! `&[u8]` columns; the store supports on-disk and in-memory backends.

pub mod cluster;
pub mod error;
pub mod store;
pub mod tables;

pub use cluster::{ClusterSnapshot, ClusterState, NodeView};
pub use error::{StateError, StateResult};
pub use store::StateStore;
