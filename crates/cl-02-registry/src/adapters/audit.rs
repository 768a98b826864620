//! # In-Memory Audit Sink
//!
//! Buffers audit records instead of landing them on a ledger. Used in
//! tests and during genesis bootstrap, before the ledger accepts appends.
//! Production wiring replaces this with a sink that appends Pages.

use crate::ports::outbound::{AuditSink, AuditSinkError};
use parking_lot::Mutex;

/// Audit sink that records everything in memory.
pub struct InMemoryAuditSink {
    records: Mutex<Vec<(String, serde_json::Value)>>,
    fail_with: Option<String>,
}

impl InMemoryAuditSink {
    /// A sink that accepts every record.
    #[must_use]
    pub fn new() -> Self {
        Self { records: Mutex::new(Vec::new()), fail_with: None }
    }

    /// A sink that rejects every record with `reason`. For failure-path
    /// tests.
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_with: Some(reason.to_string()),
        }
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<(String, serde_json::Value)> {
        self.records.lock().clone()
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(
        &self,
        action: &str,
        payload: serde_json::Value,
    ) -> Result<(), AuditSinkError> {
        if let Some(reason) = &self.fail_with {
            return Err(AuditSinkError::Rejected { reason: reason.clone() });
        }
        self.records.lock().push((action.to_string(), payload));
        Ok(())
    }
}
