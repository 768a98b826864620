//! The validator registry as seen by the ledger and by consensus.
//!
//! Both views are read-only projections of the same `RegistryService`;
//! each subsystem declares its own port, so each gets its own adapter.

use crate::adapters::audit::LedgerAuditSink;
use cl_02_registry::{RegistryApi, RegistryService};
use cl_03_ledger::ValidatorDirectory;
use cl_04_consensus::{SignerDescriptor, ValidatorSetProvider};
use shared_types::{PublicKeyBytes, ValidatorId};
use std::sync::Arc;

/// Eligible-signer roster for consensus collection rounds.
pub struct RegistrySetProvider {
    registry: Arc<RegistryService<LedgerAuditSink>>,
}

impl RegistrySetProvider {
    pub fn new(registry: Arc<RegistryService<LedgerAuditSink>>) -> Self {
        Self { registry }
    }
}

impl ValidatorSetProvider for RegistrySetProvider {
    fn active_validators(&self) -> Vec<SignerDescriptor> {
        self.registry
            .active_validators()
            .into_iter()
            .map(|v| SignerDescriptor { id: v.identity, public_key: v.public_key })
            .collect()
    }

    fn is_active(&self, id: &ValidatorId) -> bool {
        self.registry.info(id).is_some_and(|info| info.eligible_now)
    }

    fn public_key_of(&self, id: &ValidatorId) -> Option<PublicKeyBytes> {
        self.registry.public_key_of(id)
    }

    fn was_active_at(&self, id: &ValidatorId, ts: u64) -> bool {
        self.registry.was_active_at(id, ts)
    }

    fn active_count_at(&self, ts: u64) -> usize {
        self.registry.active_count_at(ts)
    }
}

/// Key and activity lookups for the ledger's own verification paths.
pub struct RegistryDirectory {
    registry: Arc<RegistryService<LedgerAuditSink>>,
}

impl RegistryDirectory {
    pub fn new(registry: Arc<RegistryService<LedgerAuditSink>>) -> Self {
        Self { registry }
    }
}

impl ValidatorDirectory for RegistryDirectory {
    fn public_key_of(&self, id: &ValidatorId) -> Option<PublicKeyBytes> {
        self.registry.public_key_of(id)
    }

    fn was_active_at(&self, id: &ValidatorId, ts: u64) -> bool {
        self.registry.was_active_at(id, ts)
    }

    fn active_count_at(&self, ts: u64) -> usize {
        self.registry.active_count_at(ts)
    }
}
