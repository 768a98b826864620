//! # Verification Primitives
//!
//! Stateless signature verification, single and batched.
//!
//! Verification never fails loudly on untrusted input: a malformed key or
//! signature is simply an invalid signature, reported as `false`. Batches
//! run on the rayon pool since each check is independent CPU work.

use crate::domain::entities::{BatchVerificationOutcome, VerificationRequest};
use ed25519_dalek::{Signature, VerifyingKey};
use rayon::prelude::*;
use shared_types::{PublicKeyBytes, SignatureBytes};
use tracing::debug;

/// Verify one Ed25519 signature.
///
/// Uses strict verification, which additionally rejects non-canonical
/// signature encodings that the lenient rules would accept. Returns
/// `false` for malformed keys, malformed signatures, and honest
/// mismatches alike.
#[must_use]
pub fn verify(public_key: &PublicKeyBytes, message: &[u8], signature: &SignatureBytes) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    key.verify_strict(message, &sig).is_ok()
}

/// Verify a batch of independent signatures in parallel.
///
/// Results preserve request order; the batch never short-circuits, so the
/// caller learns about every failure in one pass.
#[must_use]
pub fn batch_verify(requests: &[VerificationRequest]) -> BatchVerificationOutcome {
    let results: Vec<bool> = requests
        .par_iter()
        .map(|req| verify(&req.public_key, &req.message, &req.signature))
        .collect();

    let valid_count = results.iter().filter(|ok| **ok).count();
    debug!(total = requests.len(), valid = valid_count, "Batch verification complete");

    BatchVerificationOutcome {
        all_valid: valid_count == results.len(),
        valid_count,
        results,
    }
}
