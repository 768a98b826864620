//! Quorum tally for one collection round.
//!
//! The tally is the only authority on whether a response counts. It holds
//! the signer-set snapshot the round opened with, verifies each arriving
//! signature against the snapshot's registered keys, and refuses anything
//! the snapshot does not vouch for. Responses are untrusted input: a
//! compromised or buggy signer can return garbage, somebody else's
//! signature, or a signature over the wrong block, and none of it may
//! count toward quorum.

use ed25519_dalek::{Signature, VerifyingKey};
use shared_types::{
    quorum, signing_message, BlockSignature, Hash, PublicKeyBytes, Tier, ValidatorId,
};
use std::collections::BTreeMap;

/// Identity and registered key of one eligible signer, as snapshotted at
/// the start of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerDescriptor {
    /// Validator identity.
    pub id: ValidatorId,
    /// Ed25519 key the registry holds for this validator.
    pub public_key: PublicKeyBytes,
}

/// Why a response did or did not count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyVerdict {
    /// Valid and counted toward quorum.
    Counted,
    /// Same validator already counted this round.
    Duplicate,
    /// Endorses a different block or tier than the round's candidate.
    WrongBlock,
    /// Signer is not in the round's snapshot.
    UnknownSigner,
    /// Signer was deactivated after the snapshot was taken.
    InactiveSigner,
    /// Signature does not verify under the registered key.
    BadSignature,
}

/// Cryptographic check of one signature against one registered key.
///
/// Malformed keys or signatures are simply invalid; untrusted input never
/// panics.
pub fn signature_verifies(
    tier: Tier,
    block_hash: &Hash,
    public_key: &PublicKeyBytes,
    sig: &BlockSignature,
) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let message = signing_message(tier, block_hash);
    let signature = Signature::from_bytes(&sig.signature);
    key.verify_strict(&message, &signature).is_ok()
}

/// Running state of one collection round.
pub struct CollectionTally {
    tier: Tier,
    block_hash: Hash,
    keys: BTreeMap<ValidatorId, PublicKeyBytes>,
    accepted: BTreeMap<ValidatorId, BlockSignature>,
}

impl CollectionTally {
    /// Open a tally for `block_hash` against the given snapshot.
    pub fn new(tier: Tier, block_hash: Hash, snapshot: &[SignerDescriptor]) -> Self {
        let keys = snapshot.iter().map(|s| (s.id.clone(), s.public_key)).collect();
        Self { tier, block_hash, keys, accepted: BTreeMap::new() }
    }

    /// Signatures required for this round: a simple majority of the
    /// snapshot.
    pub fn required(&self) -> usize {
        quorum(self.keys.len())
    }

    /// Distinct validators counted so far.
    pub fn counted(&self) -> usize {
        self.accepted.len()
    }

    /// Whether the round has reached quorum.
    pub fn quorate(&self) -> bool {
        self.counted() >= self.required()
    }

    /// Offer one response to the tally.
    ///
    /// `still_active` is the signer's eligibility at response time; a
    /// validator deactivated mid-round stops counting even though it was
    /// in the snapshot.
    pub fn offer(&mut self, sig: BlockSignature, still_active: bool) -> TallyVerdict {
        if sig.tier != self.tier || sig.block_hash != self.block_hash {
            return TallyVerdict::WrongBlock;
        }
        let Some(key) = self.keys.get(&sig.validator) else {
            return TallyVerdict::UnknownSigner;
        };
        if !still_active {
            return TallyVerdict::InactiveSigner;
        }
        if self.accepted.contains_key(&sig.validator) {
            return TallyVerdict::Duplicate;
        }
        if !signature_verifies(self.tier, &self.block_hash, key, &sig) {
            return TallyVerdict::BadSignature;
        }
        self.accepted.insert(sig.validator.clone(), sig);
        TallyVerdict::Counted
    }

    /// The counted signatures, one per validator, in validator order.
    pub fn into_signatures(self) -> Vec<BlockSignature> {
        self.accepted.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn descriptor(id: &str, key: &SigningKey) -> SignerDescriptor {
        SignerDescriptor {
            id: ValidatorId::new(id),
            public_key: key.verifying_key().to_bytes(),
        }
    }

    fn sign_as(id: &str, key: &SigningKey, tier: Tier, block_hash: &Hash) -> BlockSignature {
        BlockSignature {
            validator: ValidatorId::new(id),
            block_hash: *block_hash,
            tier,
            timestamp: 1_700_000_000_000,
            signature: key.sign(&signing_message(tier, block_hash)).to_bytes(),
        }
    }

    #[test]
    fn test_valid_responses_count_toward_quorum() {
        let keys: Vec<SigningKey> = (1..=3).map(keypair).collect();
        let snapshot: Vec<SignerDescriptor> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| descriptor(&format!("v{i}"), k))
            .collect();
        let hash = [7u8; 32];

        let mut tally = CollectionTally::new(Tier::Page, hash, &snapshot);
        assert_eq!(tally.required(), 2);

        assert_eq!(tally.offer(sign_as("v0", &keys[0], Tier::Page, &hash), true), TallyVerdict::Counted);
        assert!(!tally.quorate());
        assert_eq!(tally.offer(sign_as("v1", &keys[1], Tier::Page, &hash), true), TallyVerdict::Counted);
        assert!(tally.quorate());
        assert_eq!(tally.into_signatures().len(), 2);
    }

    #[test]
    fn test_duplicate_validator_counted_once() {
        let key = keypair(1);
        let snapshot = vec![descriptor("v0", &key), descriptor("v1", &keypair(2))];
        let hash = [7u8; 32];

        let mut tally = CollectionTally::new(Tier::Page, hash, &snapshot);
        let sig = sign_as("v0", &key, Tier::Page, &hash);
        assert_eq!(tally.offer(sig.clone(), true), TallyVerdict::Counted);
        assert_eq!(tally.offer(sig, true), TallyVerdict::Duplicate);
        assert_eq!(tally.counted(), 1);
    }

    #[test]
    fn test_response_for_wrong_block_or_tier_refused() {
        let key = keypair(1);
        let snapshot = vec![descriptor("v0", &key)];
        let hash = [7u8; 32];

        let mut tally = CollectionTally::new(Tier::Page, hash, &snapshot);
        assert_eq!(
            tally.offer(sign_as("v0", &key, Tier::Page, &[8u8; 32]), true),
            TallyVerdict::WrongBlock
        );
        assert_eq!(
            tally.offer(sign_as("v0", &key, Tier::Chapter, &hash), true),
            TallyVerdict::WrongBlock
        );
        assert_eq!(tally.counted(), 0);
    }

    #[test]
    fn test_signer_outside_snapshot_refused() {
        let snapshot = vec![descriptor("v0", &keypair(1))];
        let hash = [7u8; 32];
        let outsider = keypair(9);

        let mut tally = CollectionTally::new(Tier::Page, hash, &snapshot);
        assert_eq!(
            tally.offer(sign_as("intruder", &outsider, Tier::Page, &hash), true),
            TallyVerdict::UnknownSigner
        );
    }

    #[test]
    fn test_mid_round_deactivation_refused() {
        let key = keypair(1);
        let snapshot = vec![descriptor("v0", &key)];
        let hash = [7u8; 32];

        let mut tally = CollectionTally::new(Tier::Page, hash, &snapshot);
        assert_eq!(
            tally.offer(sign_as("v0", &key, Tier::Page, &hash), false),
            TallyVerdict::InactiveSigner
        );
    }

    #[test]
    fn test_forged_signature_refused_not_panicked() {
        let key = keypair(1);
        let snapshot = vec![descriptor("v0", &key)];
        let hash = [7u8; 32];

        let mut tally = CollectionTally::new(Tier::Page, hash, &snapshot);
        let mut forged = sign_as("v0", &key, Tier::Page, &hash);
        forged.signature[0] ^= 0xFF;
        assert_eq!(tally.offer(forged, true), TallyVerdict::BadSignature);

        // A signature made with somebody else's key under v0's name.
        let impostor = sign_as("v0", &keypair(2), Tier::Page, &hash);
        assert_eq!(tally.offer(impostor, true), TallyVerdict::BadSignature);
    }
}
