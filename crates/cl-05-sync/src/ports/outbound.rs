//! # Outbound Ports (Driven Ports / SPI)
//!
//! What the synchronizer needs from the rest of the node: a wire to remote
//! peers, the local ledger, and an independent endorsement verifier.
//! Adapters in the runtime implement these; tests substitute scripted ones.

use async_trait::async_trait;
use shared_types::{ChainTip, FinalizedBlock, LedgerFault, NetworkError, Page};

/// Outcome of handing a peer block to the local ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// Appended at the tip.
    Committed,
    /// Already committed with the same hash.
    AlreadyKnown,
}

/// Transport to remote peers. Implementations own the wire format; the
/// service only speaks in domain types.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Liveness probe. A responsive peer reports its chain position.
    async fn health(&self, addr: &str) -> Result<ChainTip, NetworkError>;

    /// The peer's current chain height and tip hash.
    async fn chain_info(&self, addr: &str) -> Result<ChainTip, NetworkError>;

    /// The peer's Pages in the inclusive index range, ascending.
    async fn fetch_pages(&self, addr: &str, from: u64, to: u64)
        -> Result<Vec<Page>, NetworkError>;

    /// Push a finalized block to the peer.
    async fn send_block(&self, addr: &str, block: &FinalizedBlock) -> Result<(), NetworkError>;

    /// The peer's known-peer addresses, for gossip discovery.
    async fn peer_list(&self, addr: &str) -> Result<Vec<String>, NetworkError>;
}

/// The local ledger, as far as the synchronizer needs it.
///
/// `admit` and `replace_suffix` re-validate on their side of the seam as
/// well; the ledger never assumes its callers checked anything.
pub trait LedgerGateway: Send + Sync {
    /// Current Page-chain tip.
    fn tip(&self) -> Result<ChainTip, LedgerFault>;

    /// The committed Page at `index`, if any.
    fn page_at(&self, index: u64) -> Result<Option<Page>, LedgerFault>;

    /// Committed Pages in the inclusive index range, ascending.
    fn pages_in(&self, start: u64, end: u64) -> Result<Vec<Page>, LedgerFault>;

    /// Validate and append an external block at the tip.
    fn admit(&self, block: FinalizedBlock) -> Result<AdmitOutcome, LedgerFault>;

    /// Swap the unsealed local suffix from `from_index` for a winning
    /// remote branch, returning the displaced Pages.
    fn replace_suffix(
        &self,
        from_index: u64,
        replacement: Vec<Page>,
    ) -> Result<Vec<Page>, LedgerFault>;
}

/// Independent endorsement check for one finalized block: stored hash and
/// signature quorum against the validator set of the block's own
/// finalization time.
pub trait BlockVerifier: Send + Sync {
    /// Returns the count of distinct valid endorsements.
    fn verify(&self, block: &FinalizedBlock) -> Result<usize, LedgerFault>;
}
