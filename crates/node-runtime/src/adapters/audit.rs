//! Registry audit records written as ledger Pages.
//!
//! Every lifecycle transition the registry performs lands on the chain as
//! a `validator.*` Page submitted by [`REGISTRY_SUBMITTER`]. That makes
//! governance history tamper-evident and lets a restarting node rebuild
//! its registry by replaying those Pages.

use async_trait::async_trait;
use cl_02_registry::{AuditSink, AuditSinkError};
use cl_03_ledger::{AppendOutcome, LedgerApi};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Submitter recorded on registry audit Pages. Reserved at the collaborator
/// surface, so nothing else can forge lifecycle history.
pub const REGISTRY_SUBMITTER: &str = "registry";

/// [`AuditSink`] that appends each record to the ledger.
///
/// The registry is constructed before the ledger (the ledger's validator
/// directory is the registry), so the sink starts detached and is given
/// its ledger handle once the container finishes wiring. Records arriving
/// before that fail as unavailable rather than vanishing.
#[derive(Clone, Default)]
pub struct LedgerAuditSink {
    ledger: Arc<OnceLock<Arc<dyn LedgerApi>>>,
}

impl LedgerAuditSink {
    /// A sink with no ledger yet.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Attach the ledger. Later calls are ignored; the first wins.
    pub fn attach(&self, ledger: Arc<dyn LedgerApi>) {
        let _ = self.ledger.set(ledger);
    }
}

#[async_trait]
impl AuditSink for LedgerAuditSink {
    async fn record(&self, action: &str, payload: Value) -> Result<(), AuditSinkError> {
        let Some(ledger) = self.ledger.get() else {
            return Err(AuditSinkError::Unavailable("ledger not attached yet".into()));
        };

        match ledger
            .append(action, payload, REGISTRY_SUBMITTER)
            .await
            .map_err(|fault| AuditSinkError::Unavailable(fault.to_string()))?
        {
            AppendOutcome::Finalized(_) => Ok(()),
            // Lifecycle changes demand synchronous finality. The parked
            // candidate stays visible in `list_pending` for the operator.
            AppendOutcome::Pending(_) => {
                Err(AuditSinkError::Rejected { reason: "signature quorum pending".into() })
            }
            AppendOutcome::Rejected { reason } => Err(AuditSinkError::Rejected { reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detached_sink_reports_unavailable() {
        let sink = LedgerAuditSink::detached();
        let err = sink.record("validator.registered", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, AuditSinkError::Unavailable(_)));
    }
}
