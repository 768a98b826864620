//! # Inbound Ports (Driving Ports / API)
//!
//! The primary API of the Ledger Core subsystem.

use crate::domain::chain::{AcceptOutcome, AppendOutcome, ChainValidationReport, HistoryFilter};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{ChainTip, FinalizedBlock, Hash, LedgerFault, Page, RollupRecord, Tier};

/// Primary Ledger Core API.
///
/// Mutating entry points are async because finalization waits on signature
/// collection; reads are synchronous scans of the local stores. `Err` is
/// reserved for infrastructure faults (storage, consensus transport); a
/// refused entry is an `AppendOutcome::Rejected`, not an error.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Validate an entry, build a candidate Page at the current tip, collect
    /// signatures, and commit on quorum.
    ///
    /// Always returns a definite outcome: `Finalized` with the committed
    /// Page, `Pending` when the quorum window closed short (the candidate
    /// is parked for [`LedgerApi::retry_pending`]), or `Rejected` with the
    /// reason the entry was refused.
    async fn append(
        &self,
        action: &str,
        payload: Value,
        submitter: &str,
    ) -> Result<AppendOutcome, LedgerFault>;

    /// Seal the oldest due window of the tier below `tier`, collect a
    /// quorum over the rollup record, and append it to `tier`'s chain.
    ///
    /// Returns `Ok(None)` when no window is due (or when `tier` has no
    /// lower tier to seal). A quorum failure surfaces as an error and
    /// leaves the window open; the next call retries the identical range.
    async fn rollup(&self, tier: Tier) -> Result<Option<RollupRecord>, LedgerFault>;

    /// Walk every tier from genesis: recompute hashes, check linkage and
    /// sequence, and re-verify stored signatures against the validator set
    /// of each block's own finalization time. Stops at the first mismatch.
    fn validate_chain(&self) -> Result<ChainValidationReport, LedgerFault>;

    /// Read-only Page history for external consumers.
    fn read_history(&self, filter: &HistoryFilter) -> Result<Vec<Page>, LedgerFault>;

    /// Current Page-chain tip.
    fn tip(&self) -> Result<ChainTip, LedgerFault>;

    /// The Page at `index`, if committed.
    fn page_at(&self, index: u64) -> Result<Option<Page>, LedgerFault>;

    /// Pages in the inclusive index range, ascending. Used by peers syncing
    /// from us.
    fn pages_in(&self, start: u64, end: u64) -> Result<Vec<Page>, LedgerFault>;

    /// All rollup records of one tier, ascending.
    fn rollup_records(&self, tier: Tier) -> Result<Vec<RollupRecord>, LedgerFault>;

    /// Candidates that missed quorum and await operator action.
    fn list_pending(&self) -> Vec<Page>;

    /// Resubmit a parked candidate at the current tip.
    ///
    /// The entry content is reused; index, prior-hash and hash are rebuilt,
    /// so the outcome Page differs from the parked one.
    async fn retry_pending(&self, hash: &Hash) -> Result<AppendOutcome, LedgerFault>;

    /// Admit a finalized block received from a peer.
    ///
    /// The block is re-validated from scratch (linkage against our tip,
    /// hash recomputation, signature quorum at its finalization time) and
    /// never trusted because of its origin.
    ///
    /// # Errors
    ///
    /// * `IntegrityError::SequenceGap` - the block is ahead of our tip;
    ///   the caller must sync the missing range first
    /// * `IntegrityError::Divergence` - the block contradicts a committed
    ///   record at the same index
    /// * `IntegrityError::HashMismatch` / `InsufficientQuorum` - the block
    ///   fails re-validation
    fn accept_external(&self, block: FinalizedBlock) -> Result<AcceptOutcome, LedgerFault>;

    /// Replace every Page from `from_index` to the tip with a peer's
    /// winning suffix, after re-validating the whole replacement.
    ///
    /// Returns the displaced Pages; they are quarantined for audit, never
    /// silently discarded.
    fn replace_suffix(
        &self,
        from_index: u64,
        replacement: Vec<Page>,
    ) -> Result<Vec<Page>, LedgerFault>;

    /// Commit the genesis Page over an empty chain.
    ///
    /// Genesis carries the bootstrap validator roster in its payload and
    /// is the only Page exempt from the signature quorum.
    async fn install_genesis(&self, payload: Value) -> Result<Page, LedgerFault>;
}
