//! # Inbound Ports (Driving Ports / API)
//!
//! Traits that define the public API of this subsystem.

use crate::domain::entities::{TermBounds, Validator, ValidatorInfo};
use crate::domain::errors::RegistryError;
use async_trait::async_trait;
use shared_types::{PublicKeyBytes, ValidatorId, ValidatorRole};

/// Primary Validator Registry API.
///
/// Registration and lifecycle transitions are async because each one is
/// mirrored to the ledger through the audit sink. Queries are synchronous
/// reads of in-memory state.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Register a new validator.
    ///
    /// # Errors
    ///
    /// * `AuthorizationError::RoleNeverEligible` / `IneligibleRole` - role
    ///   outside the configured eligible set
    /// * `AuthorizationError::DuplicateValidator` - identity already known
    /// * `ValidationError::InvertedTerm` - term bounds inverted
    async fn register(
        &self,
        identity: ValidatorId,
        public_key: PublicKeyBytes,
        role: ValidatorRole,
        term: TermBounds,
    ) -> Result<Validator, RegistryError>;

    /// Suspend a validator's signing rights.
    async fn deactivate(&self, identity: &ValidatorId, reason: &str) -> Result<(), RegistryError>;

    /// Restore a deactivated validator's signing rights within its term.
    async fn reactivate(&self, identity: &ValidatorId, reason: &str) -> Result<(), RegistryError>;

    /// The currently eligible signer set: status Active and inside the
    /// term window right now. Quorum size derives from this set's length.
    fn active_validators(&self) -> Vec<Validator>;

    /// Diagnostic snapshot of one validator, or `None` if unknown.
    fn info(&self, identity: &ValidatorId) -> Option<ValidatorInfo>;

    /// Registered key for `identity`, whatever its lifecycle state. Keys
    /// are never deleted, so historical blocks stay verifiable.
    fn public_key_of(&self, identity: &ValidatorId) -> Option<PublicKeyBytes>;

    /// Whether `identity` was active at `ts`, replayed from lifecycle
    /// history.
    fn was_active_at(&self, identity: &ValidatorId, ts: u64) -> bool;

    /// How many validators were active at `ts`, replayed from lifecycle
    /// history. Basis for historical quorum checks.
    fn active_count_at(&self, ts: u64) -> usize;
}
