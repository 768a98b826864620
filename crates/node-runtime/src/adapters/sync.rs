//! The local ledger as the synchronizer sees it, with registry
//! coherence on top.
//!
//! Blocks arriving over the network can carry registry-relevant history:
//! the genesis Page's roster and `validator.*` lifecycle Pages. A node
//! that admits those Pages must also apply them to its registry, or a
//! peer-bootstrapped replica would verify every later block against an
//! empty validator set. This gateway threads each committed Page through
//! the same replay path the startup rebuild uses.

use crate::adapters::audit::{LedgerAuditSink, REGISTRY_SUBMITTER};
use crate::genesis;
use cl_02_registry::RegistryService;
use cl_03_ledger::service::GENESIS_ACTION;
use cl_03_ledger::{AcceptOutcome, LedgerApi};
use cl_05_sync::{AdmitOutcome, LedgerGateway};
use serde_json::Value;
use shared_types::{ChainTip, FinalizedBlock, LedgerFault, Page, ValidationError};
use std::sync::Arc;
use tracing::warn;

pub struct SyncLedgerGateway {
    ledger: Arc<dyn LedgerApi>,
    registry: Arc<RegistryService<LedgerAuditSink>>,
}

impl SyncLedgerGateway {
    pub fn new(
        ledger: Arc<dyn LedgerApi>,
        registry: Arc<RegistryService<LedgerAuditSink>>,
    ) -> Self {
        Self { ledger, registry }
    }

    /// Apply one committed Page's registry effect, if it has any. The
    /// block is already on the chain, so failures here are logged rather
    /// than propagated; the next restart's full rebuild heals the gap.
    fn track(&self, action: &str, payload: &Value, submitter: &str, timestamp: u64) {
        if action == GENESIS_ACTION {
            if let Err(error) = genesis::replay_roster(&self.registry, payload, timestamp) {
                warn!(%error, "admitted genesis Page but could not apply its roster");
            }
        } else if submitter == REGISTRY_SUBMITTER && action.starts_with("validator.") {
            if let Err(error) = self.registry.replay(action, payload, timestamp) {
                warn!(%error, action, "admitted lifecycle Page but could not apply it");
            }
        }
    }
}

impl LedgerGateway for SyncLedgerGateway {
    fn tip(&self) -> Result<ChainTip, LedgerFault> {
        self.ledger.tip()
    }

    fn page_at(&self, index: u64) -> Result<Option<Page>, LedgerFault> {
        self.ledger.page_at(index)
    }

    fn pages_in(&self, start: u64, end: u64) -> Result<Vec<Page>, LedgerFault> {
        self.ledger.pages_in(start, end)
    }

    fn admit(&self, block: FinalizedBlock) -> Result<AdmitOutcome, LedgerFault> {
        let registry_effect = match &block {
            FinalizedBlock::Page(page) => Some((
                page.action.clone(),
                page.payload.clone(),
                page.submitter.clone(),
                page.timestamp,
            )),
            FinalizedBlock::Rollup(_) => None,
        };

        match self.ledger.accept_external(block)? {
            AcceptOutcome::Committed => {
                if let Some((action, payload, submitter, timestamp)) = registry_effect {
                    self.track(&action, &payload, &submitter, timestamp);
                }
                Ok(AdmitOutcome::Committed)
            }
            AcceptOutcome::AlreadyKnown => Ok(AdmitOutcome::AlreadyKnown),
        }
    }

    fn replace_suffix(
        &self,
        from_index: u64,
        replacement: Vec<Page>,
    ) -> Result<Vec<Page>, LedgerFault> {
        let displaced = self.ledger.replace_suffix(from_index, replacement)?;

        // The chain the registry was derived from just changed under it.
        // Rebuild from scratch; a half-applied registry would quietly
        // mis-verify every block after the fork point.
        self.registry.reset();
        genesis::rebuild_registry(self.ledger.as_ref(), &self.registry).map_err(|error| {
            LedgerFault::Validation(ValidationError::Serialization(format!(
                "registry rebuild after fork adoption: {error}"
            )))
        })?;

        Ok(displaced)
    }
}
