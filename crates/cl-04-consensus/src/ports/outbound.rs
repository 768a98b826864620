//! # Outbound Ports (Driven Ports / Dependencies)
//!
//! Traits this subsystem needs implemented by its environment.

use crate::domain::collection::SignerDescriptor;
use crate::domain::errors::SignRequestError;
use async_trait::async_trait;
use shared_types::{BlockSignature, Hash, PublicKeyBytes, Tier, ValidatorId};

/// Read access to the validator registry.
///
/// Collection rounds snapshot the live set once and re-check individual
/// eligibility per response; finalized-block verification asks the
/// historical questions. Queries are synchronous reads of registry state.
pub trait ValidatorSetProvider: Send + Sync {
    /// Snapshot of the currently eligible signer set with registered
    /// keys. Quorum for a round derives from this snapshot's size.
    fn active_validators(&self) -> Vec<SignerDescriptor>;

    /// Whether `id` is eligible right now. Checked again for every
    /// response so a mid-round deactivation stops counting immediately.
    fn is_active(&self, id: &ValidatorId) -> bool;

    /// Registered key for `id`, whatever its lifecycle state. Keys are
    /// never deleted, so old blocks stay verifiable.
    fn public_key_of(&self, id: &ValidatorId) -> Option<PublicKeyBytes>;

    /// Whether `id` was eligible at `ts`, replayed from lifecycle
    /// history.
    fn was_active_at(&self, id: &ValidatorId, ts: u64) -> bool;

    /// Size of the eligible set as of `ts`. Basis for historical quorum.
    fn active_count_at(&self, ts: u64) -> usize;
}

/// Fan-out target for signing requests.
///
/// One implementation serves a whole round: the coordinator calls it once
/// per snapshotted validator, concurrently. The in-process adapter
/// ([`crate::adapters::LocalSignerHub`]) resolves requests against local
/// custody; a remote adapter would carry them over the network.
#[async_trait]
pub trait ValidatorSignerPort: Send + Sync {
    /// Ask `validator` to endorse `(tier, block_hash)`.
    async fn request_signature(
        &self,
        validator: &ValidatorId,
        tier: Tier,
        block_hash: &Hash,
    ) -> Result<BlockSignature, SignRequestError>;
}

/// One validator's signing capability, as held in local custody.
///
/// The private key stays behind this trait; the coordinator and its
/// adapters only ever see produced signatures.
pub trait BlockSigner: Send + Sync {
    /// Identity this signer signs as.
    fn identity(&self) -> &ValidatorId;

    /// Produce a timestamped endorsement of `(tier, block_hash)`.
    fn sign_block(&self, tier: Tier, block_hash: &Hash) -> BlockSignature;
}

/// Per-request approval under [`SigningPolicy::Review`].
///
/// [`SigningPolicy::Review`]: crate::domain::config::SigningPolicy::Review
#[async_trait]
pub trait ReviewGate: Send + Sync {
    /// Decide one signing request. `false` declines it; the candidate
    /// then waits on the remaining validators.
    async fn approve(&self, validator: &ValidatorId, tier: Tier, block_hash: &Hash) -> bool;
}
