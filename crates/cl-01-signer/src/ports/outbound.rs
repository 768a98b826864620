//! # Outbound Ports (Driven Ports / SPI)
//!
//! Traits that define dependencies this subsystem needs.

use crate::domain::keys::SignerKeypair;
use thiserror::Error;

/// Error from keystore operations.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Underlying storage failed.
    #[error("keystore io failure: {0}")]
    Io(String),

    /// Stored material exists but cannot be decoded.
    #[error("keystore contents are corrupt: {0}")]
    Corrupt(String),
}

/// Source of this node's signing key material.
///
/// The keystore is the only component allowed to see seeds at rest. It
/// hands the live keypair to the service once at startup; nothing else
/// reads it again.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    /// Load the persisted keypair, generating and persisting a fresh one
    /// if none exists yet.
    ///
    /// # Errors
    ///
    /// * `KeyStoreError::Io` - storage could not be read or written
    /// * `KeyStoreError::Corrupt` - stored seed exists but does not decode
    async fn load_or_generate(&self) -> Result<SignerKeypair, KeyStoreError>;
}
