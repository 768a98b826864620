//! # Inbound Ports (Driving Ports / API)
//!
//! Traits that define the public API of this subsystem.

use async_trait::async_trait;
use shared_types::{BlockSignature, ConsensusError, FinalizedBlock, Hash, LedgerFault, Tier};

/// Primary Consensus Coordinator API.
///
/// The ledger drives `collect` while finalizing candidates; the sync layer
/// drives `verify_finalized` on blocks arriving from peers.
#[async_trait]
pub trait ConsensusApi: Send + Sync {
    /// Run one collection round for the candidate at `(tier, index)`.
    ///
    /// Snapshots the eligible signer set, fans a signing request out to
    /// every member concurrently, and resolves as soon as a simple
    /// majority has returned a valid signature. Already-completed
    /// stragglers are included in the result; requests still in flight at
    /// that point are abandoned.
    ///
    /// # Errors
    ///
    /// * `ConsensusError::NoEligibleValidators` - empty signer set
    /// * `ConsensusError::QuorumNotReached` - every request resolved and
    ///   the valid responses still fall short
    /// * `ConsensusError::WindowElapsed` - the collection window closed
    ///   with requests outstanding and quorum unmet
    ///
    /// Either shortfall leaves the candidate untouched; committing or
    /// parking it is the caller's decision.
    async fn collect(
        &self,
        tier: Tier,
        block_hash: Hash,
        index: u64,
    ) -> Result<Vec<BlockSignature>, ConsensusError>;

    /// Prove that a finalized block carries the quorum its own era
    /// demanded.
    ///
    /// Recomputes the hash, checks every stored signature
    /// cryptographically, requires each signer to have been active at its
    /// signing time, and compares the distinct-signer count against the
    /// quorum of the validator set as of the block's finalization
    /// timestamp. The genesis Page (index 0, no signatures) predates any
    /// signer set and is exempt from the endorsement check.
    ///
    /// Returns the number of distinct valid signers.
    fn verify_finalized(&self, block: &FinalizedBlock) -> Result<usize, LedgerFault>;
}
