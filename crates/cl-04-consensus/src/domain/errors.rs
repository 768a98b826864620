//! Errors for individual signing requests.
//!
//! A failed request is not a failed round: the round keeps tallying other
//! validators and only the final shortfall surfaces as a `ConsensusError`.

use shared_types::ValidatorId;
use thiserror::Error;

/// Why one validator produced no signature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignRequestError {
    /// This process holds no custody handle for the validator.
    #[error("no custody for validator {0}")]
    NoCustody(ValidatorId),

    /// The review gate declined the request.
    #[error("validator {0} declined to sign after review")]
    ReviewDeclined(ValidatorId),

    /// The signer could not be reached or answered garbage.
    #[error("signing request to {validator} failed: {detail}")]
    Unreachable { validator: ValidatorId, detail: String },
}
