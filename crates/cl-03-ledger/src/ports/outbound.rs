//! # Outbound Ports (Driven Ports / SPI)
//!
//! Traits that define dependencies this subsystem needs.

use async_trait::async_trait;
use shared_types::{
    BlockSignature, ConsensusError, Hash, Page, PageState, PublicKeyBytes, RollupRecord,
    StorageError, Tier, ValidatorId,
};

/// Persistence for the Page chain.
///
/// Implementations hold records in index order and enforce nothing; the
/// service owns linkage and state-machine rules and serializes writers.
pub trait PageStore: Send + Sync {
    /// Append a Page at index `self.len()`.
    fn append(&mut self, page: Page) -> Result<(), StorageError>;

    /// Overwrite the lifecycle state of the Page at `index`.
    fn update_state(&mut self, index: u64, state: PageState) -> Result<(), StorageError>;

    /// The Page at `index`, if present.
    fn page_at(&self, index: u64) -> Result<Option<Page>, StorageError>;

    /// Pages in the inclusive range `start..=end`, ascending. Absent
    /// indexes are skipped.
    fn pages_in(&self, start: u64, end: u64) -> Result<Vec<Page>, StorageError>;

    /// Every Page, ascending.
    fn all(&self) -> Result<Vec<Page>, StorageError>;

    /// Number of committed Pages. The next append index.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The tip Page, if any.
    fn last(&self) -> Result<Option<Page>, StorageError>;

    /// Remove every Page from `index` to the tip and return them in
    /// ascending order. Fork resolution only.
    fn truncate_from(&mut self, index: u64) -> Result<Vec<Page>, StorageError>;
}

/// Persistence for the rollup tiers, one chain per tier.
pub trait RollupStore: Send + Sync {
    /// Append a record to its tier chain at index `self.len(tier)`.
    fn append(&mut self, record: RollupRecord) -> Result<(), StorageError>;

    /// Overwrite the lifecycle state of one record.
    fn update_state(&mut self, tier: Tier, index: u64, state: PageState)
        -> Result<(), StorageError>;

    /// Every record of `tier`, ascending.
    fn records(&self, tier: Tier) -> Result<Vec<RollupRecord>, StorageError>;

    /// The tip record of `tier`, if any.
    fn last(&self, tier: Tier) -> Result<Option<RollupRecord>, StorageError>;

    /// Number of records in `tier`'s chain.
    fn len(&self, tier: Tier) -> u64;
}

/// Hands a candidate block to the consensus layer and waits for the
/// signature round to finish.
#[async_trait]
pub trait ConsensusPort: Send + Sync {
    /// Collect validator signatures over `block_hash`.
    ///
    /// Resolves once quorum is reached (returning at least a quorum of
    /// valid signatures) or fails with the reason the round fell short.
    async fn collect(
        &self,
        tier: Tier,
        block_hash: Hash,
        index: u64,
    ) -> Result<Vec<BlockSignature>, ConsensusError>;
}

/// Read-only view of the validator registry used for re-verification.
///
/// Lookups are synchronous: the registry answers from in-memory state and
/// replayed lifecycle history.
pub trait ValidatorDirectory: Send + Sync {
    /// Current public key of a validator, if registered.
    fn public_key_of(&self, id: &ValidatorId) -> Option<PublicKeyBytes>;

    /// Whether the validator was active at `ts`, per lifecycle history.
    fn was_active_at(&self, id: &ValidatorId, ts: u64) -> bool;

    /// Size of the active validator set at `ts`, per lifecycle history.
    fn active_count_at(&self, ts: u64) -> usize;
}
