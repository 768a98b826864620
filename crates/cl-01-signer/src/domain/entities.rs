//! Request/response shapes for the verification API.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_types::{PublicKeyBytes, SignatureBytes};

/// One signature to check as part of a batch.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// Claimed signer's public key.
    pub public_key: PublicKeyBytes,
    /// The exact bytes that were allegedly signed.
    pub message: Vec<u8>,
    /// The signature to check.
    #[serde_as(as = "Bytes")]
    pub signature: SignatureBytes,
}

/// Result of a batch verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchVerificationOutcome {
    /// Whether every request verified.
    pub all_valid: bool,
    /// Count of requests that verified.
    pub valid_count: usize,
    /// Per-request verdicts, in request order.
    pub results: Vec<bool>,
}
