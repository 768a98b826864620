//! # Signing Service
//!
//! Application service layer that implements the `SignerApi` trait.
//!
//! ## Architecture
//!
//! This is the hexagonal "application service" that:
//! - Implements the inbound port (`SignerApi`)
//! - Uses the outbound port (`KeyStore`) once at startup to obtain keys
//! - Delegates cryptographic operations to the domain layer

use crate::domain::entities::{BatchVerificationOutcome, VerificationRequest};
use crate::domain::keys::SignerKeypair;
use crate::domain::signing;
use crate::ports::inbound::SignerApi;
use crate::ports::outbound::{KeyStore, KeyStoreError};
use shared_types::{
    signing_message, BlockSignature, Hash, PublicKeyBytes, SignatureBytes, Tier, TimeSource,
    ValidatorId,
};
use std::sync::Arc;
use tracing::info;

/// Signing Service bound to one validator identity.
pub struct SigningService {
    id: ValidatorId,
    keypair: SignerKeypair,
    clock: Arc<dyn TimeSource>,
}

impl SigningService {
    /// Create a service around an already-loaded keypair.
    pub fn new(id: ValidatorId, keypair: SignerKeypair, clock: Arc<dyn TimeSource>) -> Self {
        info!(validator = %id, public_key = %keypair.public_key_hex(), "Signer initialized");
        Self { id, keypair, clock }
    }

    /// Create a service by loading (or generating) key material through
    /// the keystore port. The usual production entry point.
    pub async fn from_store<K: KeyStore>(
        id: ValidatorId,
        store: &K,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, KeyStoreError> {
        let keypair = store.load_or_generate().await?;
        Ok(Self::new(id, keypair, clock))
    }
}

impl SignerApi for SigningService {
    fn validator_id(&self) -> &ValidatorId {
        &self.id
    }

    fn public_key(&self) -> PublicKeyBytes {
        self.keypair.public_key()
    }

    fn sign(&self, message: &[u8]) -> SignatureBytes {
        self.keypair.sign(message)
    }

    fn sign_block(&self, tier: Tier, block_hash: &Hash) -> BlockSignature {
        let message = signing_message(tier, block_hash);
        BlockSignature {
            validator: self.id.clone(),
            block_hash: *block_hash,
            tier,
            timestamp: self.clock.now_ms(),
            signature: self.keypair.sign(&message),
        }
    }

    fn verify(
        &self,
        public_key: &PublicKeyBytes,
        message: &[u8],
        signature: &SignatureBytes,
    ) -> bool {
        signing::verify(public_key, message, signature)
    }

    fn batch_verify(&self, requests: &[VerificationRequest]) -> BatchVerificationOutcome {
        signing::batch_verify(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::FixedTimeSource;

    fn service_at(ms: u64) -> SigningService {
        SigningService::new(
            ValidatorId::new("chair-node"),
            SignerKeypair::from_seed(&[9u8; 32]),
            Arc::new(FixedTimeSource::at(ms)),
        )
    }

    #[test]
    fn test_sign_block_stamps_clock_time() {
        let service = service_at(5_000);
        let sig = service.sign_block(Tier::Page, &[1u8; 32]);

        assert_eq!(sig.timestamp, 5_000);
        assert_eq!(sig.validator, ValidatorId::new("chair-node"));
        assert_eq!(sig.tier, Tier::Page);
        assert_eq!(sig.block_hash, [1u8; 32]);
    }

    #[test]
    fn test_sign_block_verifies_against_signing_message() {
        let service = service_at(0);
        let hash = [3u8; 32];
        let sig = service.sign_block(Tier::Chapter, &hash);

        let message = signing_message(Tier::Chapter, &hash);
        assert!(service.verify(&service.public_key(), &message, &sig.signature));

        // The same signature must not verify for a different tier.
        let wrong_tier = signing_message(Tier::Page, &hash);
        assert!(!service.verify(&service.public_key(), &wrong_tier, &sig.signature));
    }

    #[test]
    fn test_service_delegates_batch_verify() {
        let service = service_at(0);
        let message = b"batch member".to_vec();
        let request = VerificationRequest {
            public_key: service.public_key(),
            message: message.clone(),
            signature: service.sign(&message),
        };

        let outcome = service.batch_verify(&[request]);
        assert!(outcome.all_valid);
    }

    #[tokio::test]
    async fn test_from_store_uses_keystore_material() {
        struct SeededStore;

        #[async_trait::async_trait]
        impl KeyStore for SeededStore {
            async fn load_or_generate(&self) -> Result<SignerKeypair, KeyStoreError> {
                Ok(SignerKeypair::from_seed(&[4u8; 32]))
            }
        }

        let service = SigningService::from_store(
            ValidatorId::new("v1"),
            &SeededStore,
            Arc::new(FixedTimeSource::at(0)),
        )
        .await
        .unwrap();

        assert_eq!(service.public_key(), SignerKeypair::from_seed(&[4u8; 32]).public_key());
    }
}
