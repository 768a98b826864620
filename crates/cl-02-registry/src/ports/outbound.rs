//! # Outbound Ports (Driven Ports / SPI)
//!
//! Traits that define dependencies this subsystem needs.

use thiserror::Error;

/// Error from audit sink operations.
#[derive(Debug, Error)]
pub enum AuditSinkError {
    /// The sink rejected the record.
    #[error("audit record rejected: {reason}")]
    Rejected { reason: String },

    /// The sink could not be reached.
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for registry audit records.
///
/// The runtime wires this to the Ledger Core so every lifecycle transition
/// lands as a Page (`validator.registered`, `validator.deactivated`,
/// `validator.reactivated`) and the registry becomes self-auditing.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one registry action with its canonical payload.
    async fn record(
        &self,
        action: &str,
        payload: serde_json::Value,
    ) -> Result<(), AuditSinkError>;
}
