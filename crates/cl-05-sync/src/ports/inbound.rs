//! # Inbound Ports (Driving Ports / API)
//!
//! The primary API of the Peer Synchronizer subsystem.

use crate::domain::peers::PeerRecord;
use crate::domain::report::{
    BroadcastReport, HealthReport, QuarantinedBlock, ReceiveOutcome, SyncReport,
};
use async_trait::async_trait;
use shared_types::{FinalizedBlock, LedgerFault, NetworkError};

/// Primary Peer Synchronizer API.
///
/// Network-touching operations are async; peer-table and quarantine reads
/// are synchronous snapshots.
#[async_trait]
pub trait SyncApi: Send + Sync {
    /// Seed the peer table from the bootstrap list, then gossip: ask every
    /// healthy peer for its peer list and merge the answers. Returns the
    /// number of known peers afterwards.
    async fn discover_peers(&self) -> usize;

    /// Push a finalized block to every healthy peer concurrently. Each
    /// delivery retries with exponential backoff; a peer that exhausts its
    /// attempts is marked failed.
    ///
    /// # Errors
    ///
    /// `NetworkError::BroadcastExhausted` when peers exist but none took
    /// the block. An empty peer table is a quiet no-op, not an error.
    async fn broadcast(&self, block: &FinalizedBlock) -> Result<BroadcastReport, NetworkError>;

    /// Handle a block pushed by a peer. The block is re-validated in full
    /// before the ledger sees it; arriving from a known peer grants no
    /// trust.
    ///
    /// # Errors
    ///
    /// A block failing integrity is quarantined and the fault surfaced. A
    /// block ahead of the local tip is not an error; it comes back as
    /// [`ReceiveOutcome::NeedsSync`].
    async fn receive_block(
        &self,
        peer: &str,
        block: FinalizedBlock,
    ) -> Result<ReceiveOutcome, LedgerFault>;

    /// One synchronization pass against `peer`: fetch missing Pages in
    /// ascending order, or resolve the fork if histories diverge. Every
    /// fetched Page commits individually, so an interrupted pass keeps its
    /// progress and the next call resumes from the new tip.
    async fn sync(&self, peer: &str) -> Result<SyncReport, LedgerFault>;

    /// Heartbeat every known peer, refreshing standing and chain position,
    /// and pruning peers past the failure threshold.
    async fn health_check(&self) -> HealthReport;

    /// Snapshot of the peer table.
    fn peers(&self) -> Vec<PeerRecord>;

    /// Blocks rejected on receipt or displaced by fork choice, oldest
    /// first.
    fn quarantine(&self) -> Vec<QuarantinedBlock>;
}
