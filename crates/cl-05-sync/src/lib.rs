//! # Peer Synchronizer Subsystem (CL-05)
//!
//! Keeps a node's chain converged with its peers: broadcast of freshly
//! finalized blocks, gossip-based peer discovery, catch-up fetches for
//! nodes behind the network, and deterministic fork resolution when two
//! histories diverge.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): peer table with health standing, fork
//!   choice, remote-branch validation, synchronizer configuration
//! - **Ports Layer** (`ports/`): `SyncApi` inbound; `PeerTransport`,
//!   `LedgerGateway`, `BlockVerifier` outbound
//! - **Service Layer** (`service.rs`): broadcast, receive, discovery,
//!   catch-up, fork resolution, heartbeats
//! - **Adapters** (`adapters/`): the in-process loopback hub for
//!   multi-node tests
//!
//! ## Trust
//!
//! A block from a peer is never trusted because of its origin. Hash,
//! linkage, and endorsement quorum are re-checked locally before the
//! ledger sees it, and a branch offered during fork resolution is
//! validated end to end before fork choice runs. Whatever fails lands in
//! quarantine for operator audit.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export main types
pub use adapters::loopback::{LoopbackHub, LoopbackTransport};
pub use domain::config::SyncConfig;
pub use domain::fork::{fork_choice, ForkDecision};
pub use domain::peers::{HealthMark, PeerRecord, PeerTable};
pub use domain::report::{
    BroadcastReport, HealthReport, QuarantinedBlock, ReceiveOutcome, SyncOutcome, SyncReport,
};
pub use ports::inbound::SyncApi;
pub use ports::outbound::{AdmitOutcome, BlockVerifier, LedgerGateway, PeerTransport};
pub use service::SyncService;
