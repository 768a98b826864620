//! # File Seed Store
//!
//! Persists this node's signing seed as a hex string on disk.

use crate::domain::keys::SignerKeypair;
use crate::ports::outbound::{KeyStore, KeyStoreError};
use shared_types::ValidationError;
use std::path::PathBuf;
use tracing::{info, warn};

/// Keystore backed by a single seed file.
///
/// The file holds 64 hex characters. First startup generates the seed;
/// every later startup reloads the same identity. Startup-time I/O only,
/// so the blocking `std::fs` calls are acceptable here.
pub struct FileSeedStore {
    path: PathBuf,
}

impl FileSeedStore {
    /// Create a store over `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_existing(&self) -> Result<Option<SignerKeypair>, KeyStoreError> {
        let encoded = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(KeyStoreError::Io(e.to_string())),
        };

        match SignerKeypair::from_seed_hex(&encoded) {
            Ok(pair) => Ok(Some(pair)),
            Err(ValidationError::MalformedKey(detail)) => Err(KeyStoreError::Corrupt(detail)),
            Err(other) => Err(KeyStoreError::Corrupt(other.to_string())),
        }
    }

    fn persist(&self, pair: &SignerKeypair) -> Result<(), KeyStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KeyStoreError::Io(e.to_string()))?;
        }
        std::fs::write(&self.path, pair.seed_hex()).map_err(|e| KeyStoreError::Io(e.to_string()))
    }
}

#[async_trait::async_trait]
impl KeyStore for FileSeedStore {
    async fn load_or_generate(&self) -> Result<SignerKeypair, KeyStoreError> {
        if let Some(pair) = self.read_existing()? {
            info!(path = %self.path.display(), "Loaded signing seed");
            return Ok(pair);
        }

        let pair = SignerKeypair::generate();
        self.persist(&pair)?;
        warn!(
            path = %self.path.display(),
            public_key = %pair.public_key_hex(),
            "No signing seed found; generated a new identity"
        );
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generates_then_reloads_same_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/node.seed");
        let store = FileSeedStore::new(&path);

        let first = store.load_or_generate().await.unwrap();
        let second = store.load_or_generate().await.unwrap();

        assert_eq!(first.public_key(), second.public_key());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_seed_is_reported_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.seed");
        std::fs::write(&path, "zz not hex zz").unwrap();

        let store = FileSeedStore::new(&path);
        let result = store.load_or_generate().await;

        assert!(matches!(result, Err(KeyStoreError::Corrupt(_))));
        // The corrupt file must survive for operator inspection.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "zz not hex zz");
    }

    #[tokio::test]
    async fn test_seed_file_contains_hex_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.seed");
        let store = FileSeedStore::new(&path);

        let pair = store.load_or_generate().await.unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();

        assert_eq!(on_disk, pair.seed_hex());
    }
}
