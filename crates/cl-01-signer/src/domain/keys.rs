//! # Key Material
//!
//! Keypair generation, seed import/export, and public key encoding.
//!
//! A keypair is generated once per validator at registration. Only the
//! 32-byte public key is ever published; the seed stays in the custody of
//! the owning process (see `adapters::keystore`).

use ed25519_dalek::{Signer, SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use rand::RngCore;
use shared_types::{PublicKeyBytes, SignatureBytes, ValidationError};

/// An Ed25519 keypair owned by this process.
///
/// Deliberately does not implement `Serialize`, `Clone`-into-logs, or a
/// seed-revealing `Debug`; the seed leaves only through [`seed_hex`] for
/// keystore persistence.
///
/// [`seed_hex`]: SignerKeypair::seed_hex
pub struct SignerKeypair {
    signing: SigningKey,
}

impl SignerKeypair {
    /// Generate a fresh keypair from the OS entropy source.
    #[must_use]
    pub fn generate() -> Self {
        let mut seed = [0u8; SECRET_KEY_LENGTH];
        OsRng.fill_bytes(&mut seed);
        Self { signing: SigningKey::from_bytes(&seed) }
    }

    /// Rebuild a keypair from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self { signing: SigningKey::from_bytes(seed) }
    }

    /// Rebuild a keypair from a hex-encoded seed.
    ///
    /// # Errors
    ///
    /// `ValidationError::MalformedKey` when the input is not exactly 64 hex
    /// characters.
    pub fn from_seed_hex(encoded: &str) -> Result<Self, ValidationError> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| ValidationError::MalformedKey(e.to_string()))?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes.try_into().map_err(|v: Vec<u8>| {
            ValidationError::MalformedKey(format!("seed must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// Hex-encode the seed for keystore persistence.
    #[must_use]
    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing.to_bytes())
    }

    /// The 32-byte public half of this keypair.
    #[must_use]
    pub fn public_key(&self) -> PublicKeyBytes {
        self.signing.verifying_key().to_bytes()
    }

    /// Hex-encoded public key, as published to the registry.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// Sign an arbitrary message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for SignerKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the seed.
        f.debug_struct("SignerKeypair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Decode a hex-encoded public key as published in the registry.
///
/// # Errors
///
/// `ValidationError::MalformedKey` on bad hex or wrong length.
pub fn decode_public_key_hex(encoded: &str) -> Result<PublicKeyBytes, ValidationError> {
    let bytes =
        hex::decode(encoded.trim()).map_err(|e| ValidationError::MalformedKey(e.to_string()))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        ValidationError::MalformedKey(format!("public key must be 32 bytes, got {}", v.len()))
    })
}

/// Hex-encode a public key for publication.
#[must_use]
pub fn encode_public_key_hex(key: &PublicKeyBytes) -> String {
    hex::encode(key)
}
