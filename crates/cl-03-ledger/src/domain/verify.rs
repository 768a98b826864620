//! Zero-trust endorsement verification.
//!
//! The ledger re-checks every stored signature itself instead of trusting
//! that the consensus layer (or the peer that sent a block) did. The
//! caller resolves each signer's public key and historical activity from
//! the registry; this module does the cryptography and the counting.

use ed25519_dalek::{Signature, VerifyingKey};
use shared_types::{
    quorum, signing_message, BlockSignature, Hash, IntegrityError, PublicKeyBytes, Tier,
    ValidatorId,
};
use std::collections::BTreeSet;

/// One stored signature plus what the registry knows about its signer at
/// signing time. `public_key` is `None` for validators the registry has
/// never heard of.
#[derive(Debug, Clone)]
pub struct Endorsement {
    pub signature: BlockSignature,
    pub public_key: Option<PublicKeyBytes>,
    pub signer_active: bool,
}

/// Verify one endorsement against the block it claims to endorse.
///
/// Never panics on malformed input; an undecodable key or signature is
/// simply invalid.
pub fn endorsement_is_valid(tier: Tier, block_hash: &Hash, e: &Endorsement) -> bool {
    if e.signature.tier != tier || e.signature.block_hash != *block_hash {
        return false;
    }
    if !e.signer_active {
        return false;
    }
    let Some(key_bytes) = e.public_key.as_ref() else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(key_bytes) else {
        return false;
    };
    let message = signing_message(tier, block_hash);
    let signature = Signature::from_bytes(&e.signature.signature);
    key.verify_strict(&message, &signature).is_ok()
}

/// Count the distinct validators with a valid endorsement of `block_hash`.
///
/// Verification is fanned out across cores; a validator signing twice is
/// still counted once.
pub fn count_valid_endorsements(
    tier: Tier,
    block_hash: &Hash,
    endorsements: &[Endorsement],
) -> usize {
    use rayon::prelude::*;

    let valid: Vec<&ValidatorId> = endorsements
        .par_iter()
        .filter(|e| endorsement_is_valid(tier, block_hash, e))
        .map(|e| &e.signature.validator)
        .collect();

    valid.into_iter().collect::<BTreeSet<_>>().len()
}

/// Check a stored block's endorsements against the quorum its finalization
/// epoch demanded.
///
/// `active_at_finalization` is the number of validators active at the
/// block's finalization timestamp; the caller derives it from the
/// registry's audit history so old blocks are judged by the validator set
/// of their own time.
pub fn ensure_quorum(
    tier: Tier,
    index: u64,
    block_hash: &Hash,
    endorsements: &[Endorsement],
    active_at_finalization: usize,
) -> Result<usize, IntegrityError> {
    let need = quorum(active_at_finalization);
    let got = count_valid_endorsements(tier, block_hash, endorsements);
    if got < need {
        return Err(IntegrityError::InsufficientQuorum { tier, index, got, need });
    }
    Ok(got)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn endorse(key: &SigningKey, id: &str, tier: Tier, block_hash: &Hash) -> Endorsement {
        let message = signing_message(tier, block_hash);
        Endorsement {
            signature: BlockSignature {
                validator: ValidatorId::new(id),
                block_hash: *block_hash,
                tier,
                timestamp: 1_700_000_000_000,
                signature: key.sign(&message).to_bytes(),
            },
            public_key: Some(key.verifying_key().to_bytes()),
            signer_active: true,
        }
    }

    #[test]
    fn test_valid_endorsement_accepted() {
        let key = keypair(1);
        let hash = [9u8; 32];
        let e = endorse(&key, "chair", Tier::Page, &hash);
        assert!(endorsement_is_valid(Tier::Page, &hash, &e));
    }

    #[test]
    fn test_wrong_tier_or_hash_rejected() {
        let key = keypair(1);
        let hash = [9u8; 32];
        let e = endorse(&key, "chair", Tier::Page, &hash);

        assert!(!endorsement_is_valid(Tier::Chapter, &hash, &e));
        assert!(!endorsement_is_valid(Tier::Page, &[8u8; 32], &e));
    }

    #[test]
    fn test_unknown_or_inactive_signer_rejected() {
        let key = keypair(1);
        let hash = [9u8; 32];

        let mut unknown = endorse(&key, "ghost", Tier::Page, &hash);
        unknown.public_key = None;
        assert!(!endorsement_is_valid(Tier::Page, &hash, &unknown));

        let mut inactive = endorse(&key, "retired", Tier::Page, &hash);
        inactive.signer_active = false;
        assert!(!endorsement_is_valid(Tier::Page, &hash, &inactive));
    }

    #[test]
    fn test_forged_signature_rejected_not_panicked() {
        let key = keypair(1);
        let hash = [9u8; 32];

        let mut forged = endorse(&key, "chair", Tier::Page, &hash);
        forged.signature.signature[0] ^= 0xFF;
        assert!(!endorsement_is_valid(Tier::Page, &hash, &forged));

        let mut garbage_key = endorse(&key, "chair", Tier::Page, &hash);
        garbage_key.public_key = Some([0xFF; 32]);
        assert!(!endorsement_is_valid(Tier::Page, &hash, &garbage_key));
    }

    #[test]
    fn test_duplicate_validator_counted_once() {
        let key = keypair(1);
        let hash = [9u8; 32];
        let e = endorse(&key, "chair", Tier::Page, &hash);

        let count = count_valid_endorsements(Tier::Page, &hash, &[e.clone(), e]);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_quorum_judged_against_historical_set() {
        let hash = [9u8; 32];
        let endorsements: Vec<Endorsement> = (1..=3)
            .map(|i| endorse(&keypair(i), &format!("validator-{i}"), Tier::Page, &hash))
            .collect();

        // 3 valid signatures meet quorum for a 5-validator epoch (need 3)
        // but not for a 7-validator epoch (need 4).
        assert_eq!(ensure_quorum(Tier::Page, 0, &hash, &endorsements, 5).unwrap(), 3);
        assert!(matches!(
            ensure_quorum(Tier::Page, 0, &hash, &endorsements, 7),
            Err(IntegrityError::InsufficientQuorum { got: 3, need: 4, .. })
        ));
    }
}
