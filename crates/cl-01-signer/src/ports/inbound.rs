//! # Inbound Ports (Driving Ports / API)
//!
//! Traits that define the public API of this subsystem.

use crate::domain::entities::{BatchVerificationOutcome, VerificationRequest};
use shared_types::{BlockSignature, Hash, PublicKeyBytes, SignatureBytes, Tier, ValidatorId};

/// Primary Signer API.
///
/// One instance exists per node, bound to that node's validator identity
/// and keypair. Implementations must be thread-safe (`Send + Sync`).
pub trait SignerApi: Send + Sync {
    /// The validator identity this signer signs as.
    fn validator_id(&self) -> &ValidatorId;

    /// The public key other nodes use to verify this signer.
    fn public_key(&self) -> PublicKeyBytes;

    /// Sign arbitrary canonical bytes.
    fn sign(&self, message: &[u8]) -> SignatureBytes;

    /// Produce a block endorsement over the domain-separated signing
    /// message for `(tier, block_hash)`, stamped with the current time.
    fn sign_block(&self, tier: Tier, block_hash: &Hash) -> BlockSignature;

    /// Verify one signature against a published public key.
    ///
    /// Never fails loudly on untrusted input; malformed keys or signatures
    /// yield `false`.
    fn verify(&self, public_key: &PublicKeyBytes, message: &[u8], signature: &SignatureBytes)
        -> bool;

    /// Verify a batch of independent signatures in parallel.
    fn batch_verify(&self, requests: &[VerificationRequest]) -> BatchVerificationOutcome;
}
