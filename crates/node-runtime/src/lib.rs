//! # Node Runtime
//!
//! Composition root of a Civic-Ledger node. The subsystem crates each
//! know only their own ports; this crate supplies the configuration, the
//! adapters that wire subsystems to each other, the HTTP surface peers
//! talk to, and the background loops that keep a node rolling up,
//! syncing, and heartbeating.
//!
//! - [`config`] - one TOML file plus environment overrides
//! - [`container`] - builds and owns the subsystem graph
//! - [`adapters`] - port implementations connecting subsystems
//! - [`genesis`] - roster installation and registry reconstruction
//! - [`http`] / [`wire`] - the peer HTTP surface and its JSON shapes
//! - [`loops`] - rollup, sync, heartbeat, and event-journal tasks
//! - [`runtime`] - supervision and shutdown

pub mod adapters;
pub mod config;
pub mod container;
pub mod genesis;
pub mod http;
pub mod loops;
pub mod runtime;
pub mod wire;

pub use config::{ConfigError, NodeConfig};
pub use container::NodeContainer;
pub use runtime::NodeRuntime;
