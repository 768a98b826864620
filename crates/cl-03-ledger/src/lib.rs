//! # Ledger Core Subsystem (CL-03)
//!
//! Builds Pages, rolls them into Chapters/Books/Parts/Series, and
//! validates the hash chain at every tier.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): chain linkage rules, payload schema,
//!   rollup window arithmetic, zero-trust signature re-verification
//! - **Ports Layer** (`ports/`): `LedgerApi` inbound; `PageStore`,
//!   `RollupStore`, `ConsensusPort`, `ValidatorDirectory` outbound
//! - **Service Layer** (`service.rs`): the append/rollup/validate flows
//! - **Adapters** (`adapters/`): in-memory stores, checksummed file
//!   stores, data-directory process lock
//!
//! ## Concurrency
//!
//! One writer at a time. An async append guard serializes caller
//! submissions; a sync commit lock makes the tip-check-then-append step
//! atomic against blocks arriving from peers. Signature collection and
//! network I/O always run outside the commit lock.
//!
//! ## Zero-Trust
//!
//! `validate_chain` re-verifies every stored signature cryptographically
//! with its own Ed25519 code path; it never trusts that a signature was
//! checked when it was collected.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export main types
pub use domain::chain::{
    AcceptOutcome, AppendOutcome, ChainValidationReport, Divergence, HistoryFilter,
};
pub use domain::config::{LedgerConfig, RollupSchedule, RollupWindow};
pub use ports::inbound::LedgerApi;
pub use ports::outbound::{ConsensusPort, PageStore, RollupStore, ValidatorDirectory};
pub use service::LedgerService;
