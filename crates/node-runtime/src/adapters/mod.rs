//! # Runtime Adapters
//!
//! The subsystem crates only know their own ports. These adapters close
//! the loops between them: the registry audits into the ledger, the
//! ledger collects signatures through consensus, consensus signs with the
//! custodied signers, and the synchronizer reaches the ledger, the
//! verifier, and remote peers over HTTP.

pub mod audit;
pub mod consensus;
pub mod registry;
pub mod sync;
pub mod transport;

pub use audit::{LedgerAuditSink, REGISTRY_SUBMITTER};
pub use consensus::{ConsensusVerifier, CustodySigner, QuorumCollector};
pub use registry::{RegistryDirectory, RegistrySetProvider};
pub use sync::SyncLedgerGateway;
pub use transport::HttpPeerTransport;
