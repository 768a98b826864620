//! # Consensus Coordinator Subsystem (CL-04)
//!
//! Collects validator signatures for candidate blocks and proves quorum
//! over finalized ones.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): quorum tally, response verification,
//!   signing policy configuration
//! - **Ports Layer** (`ports/`): `ConsensusApi` inbound; validator set,
//!   signer, and review-gate outbound
//! - **Service Layer** (`service.rs`): concurrent collection rounds with
//!   early return at quorum
//!
//! ## Collection Round
//!
//! One round snapshots the eligible signer set, fans a signing request out
//! to every member concurrently, and tallies responses as they arrive.
//! Every response is re-verified here against the signer's registered key;
//! a response is never counted because the signer said it was valid. The
//! round resolves as soon as a simple majority of the snapshot has counted,
//! and the whole thing runs under a bounded window so an unresponsive
//! validator set can only stall a candidate, never wedge the caller.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export main types
pub use domain::collection::{CollectionTally, SignerDescriptor, TallyVerdict};
pub use domain::config::{ConsensusConfig, SigningPolicy};
pub use domain::errors::SignRequestError;
pub use ports::inbound::ConsensusApi;
pub use ports::outbound::{BlockSigner, ReviewGate, ValidatorSetProvider, ValidatorSignerPort};
pub use service::ConsensusService;
