//! Registry error type.

use shared_types::{AuthorizationError, ValidationError};
use thiserror::Error;

/// Errors surfaced by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Caller is not allowed to do what was asked.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// Input was malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The lifecycle transition could not be recorded on the ledger.
    /// The in-memory transition is rolled back when this fires.
    #[error("audit record failed: {0}")]
    Audit(String),
}
