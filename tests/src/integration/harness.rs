//! Full in-process node fixtures.
//!
//! [`council`] stands up one complete node: real Ed25519 signers, a live
//! registry, the consensus coordinator, and the ledger, joined through
//! the same port seams the runtime wires. The adapters here are the
//! test-sized equivalents of the runtime's composition glue; the
//! per-crate unit tests substitute scripted doubles at these seams, so
//! this module deliberately does not.

use async_trait::async_trait;
use cl_01_signer::{SignerApi, SignerKeypair, SigningService};
use cl_02_registry::{
    AuditSink, AuditSinkError, EligibilityPolicy, RegistryApi, RegistryService, TermBounds,
};
use cl_03_ledger::adapters::InMemoryRollupStore;
use cl_03_ledger::{
    AcceptOutcome, AppendOutcome, ConsensusPort, LedgerApi, LedgerConfig, LedgerService,
    PageStore, RollupSchedule, RollupStore, RollupWindow, ValidatorDirectory,
};
use cl_04_consensus::adapters::{LocalSignerHub, StaticReviewGate};
use cl_04_consensus::{
    BlockSigner, ConsensusApi, ConsensusConfig, ConsensusService, SignRequestError,
    SignerDescriptor, SigningPolicy, ValidatorSetProvider, ValidatorSignerPort,
};
use cl_05_sync::{
    AdmitOutcome, BlockVerifier, LedgerGateway, LoopbackHub, SyncConfig, SyncService,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use shared_bus::{InMemoryEventBus, LedgerEvent, Subscription};
use shared_types::{
    BlockSignature, ChainTip, ConsensusError, FinalizedBlock, FixedTimeSource, Hash, LedgerFault,
    Page, PageState, PublicKeyBytes, StorageError, Tier, ValidatorId, ValidatorRole,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Baseline test instant.
pub const T0: u64 = 1_700_000_000_000;
pub const DAY_MS: u64 = 86_400_000;

/// Submitter stamped on registry audit Pages, as the runtime stamps it.
pub const AUDIT_SUBMITTER: &str = "registry";

// =============================================================================
// STORES
// =============================================================================

/// Page chain in a shared `Vec`, so a test can keep a handle and rewrite
/// committed history the way no honest code path would.
#[derive(Clone, Default)]
pub struct SharedPageStore {
    pages: Arc<RwLock<Vec<Page>>>,
}

impl SharedPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite the committed Page at `index` in place.
    pub fn rewrite(&self, index: u64, mutate: impl FnOnce(&mut Page)) {
        let mut pages = self.pages.write();
        let page = pages.get_mut(index as usize).expect("page to rewrite");
        mutate(page);
    }
}

impl PageStore for SharedPageStore {
    fn append(&mut self, page: Page) -> Result<(), StorageError> {
        self.pages.write().push(page);
        Ok(())
    }

    fn update_state(&mut self, index: u64, state: PageState) -> Result<(), StorageError> {
        match self.pages.write().get_mut(index as usize) {
            Some(page) => {
                page.state = state;
                Ok(())
            }
            None => Err(StorageError::Decode(format!("no page at index {index}"))),
        }
    }

    fn page_at(&self, index: u64) -> Result<Option<Page>, StorageError> {
        Ok(self.pages.read().get(index as usize).cloned())
    }

    fn pages_in(&self, start: u64, end: u64) -> Result<Vec<Page>, StorageError> {
        let pages = self.pages.read();
        if start > end || start as usize >= pages.len() {
            return Ok(Vec::new());
        }
        let end = (end as usize).min(pages.len() - 1);
        Ok(pages[start as usize..=end].to_vec())
    }

    fn all(&self) -> Result<Vec<Page>, StorageError> {
        Ok(self.pages.read().clone())
    }

    fn len(&self) -> u64 {
        self.pages.read().len() as u64
    }

    fn last(&self) -> Result<Option<Page>, StorageError> {
        Ok(self.pages.read().last().cloned())
    }

    fn truncate_from(&mut self, index: u64) -> Result<Vec<Page>, StorageError> {
        let mut pages = self.pages.write();
        let index = (index as usize).min(pages.len());
        Ok(pages.split_off(index))
    }
}

// =============================================================================
// PORT ADAPTERS
// =============================================================================

/// Audit sink that lands lifecycle records on the node's own ledger. The
/// ledger is attached after construction because it needs the registry,
/// through the directory adapter, to exist first.
#[derive(Clone, Default)]
pub struct ChainAudit {
    ledger: Arc<OnceLock<Arc<LedgerService>>>,
}

impl ChainAudit {
    pub fn attach(&self, ledger: Arc<LedgerService>) {
        let _ = self.ledger.set(ledger);
    }
}

#[async_trait]
impl AuditSink for ChainAudit {
    async fn record(&self, action: &str, payload: Value) -> Result<(), AuditSinkError> {
        let Some(ledger) = self.ledger.get() else {
            return Err(AuditSinkError::Unavailable("ledger not attached".into()));
        };
        match ledger
            .append(action, payload, AUDIT_SUBMITTER)
            .await
            .map_err(|fault| AuditSinkError::Unavailable(fault.to_string()))?
        {
            AppendOutcome::Finalized(_) => Ok(()),
            AppendOutcome::Pending(_) => Err(AuditSinkError::Rejected {
                reason: "signature quorum pending".into(),
            }),
            AppendOutcome::Rejected { reason } => Err(AuditSinkError::Rejected { reason }),
        }
    }
}

/// The consensus coordinator's view of the registry.
pub struct RosterProvider {
    pub registry: Arc<RegistryService<ChainAudit>>,
}

impl ValidatorSetProvider for RosterProvider {
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

/// The ledger's re-verification view of the registry.
pub struct RosterDirectory {
    pub registry: Arc<RegistryService<ChainAudit>>,
}

impl ValidatorDirectory for RosterDirectory {
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

/// One held key, presented to the custody hub.
pub struct CouncilSigner(pub Arc<SigningService>);

impl BlockSigner for CouncilSigner {
    fn identity(&self) -> &ValidatorId {
        self.0.validator_id()
    }

    fn sign_block(&self, tier: Tier, block_hash: &Hash) -> BlockSignature {
        self.0.sign_block(tier, block_hash)
    }
}

/// Custody hub behind a switch that simulates every held signer going
/// unreachable at once, for park-and-retry flows.
pub struct CustodyOutage {
    inner: LocalSignerHub,
    down: AtomicBool,
}

impl CustodyOutage {
    pub fn over(inner: LocalSignerHub) -> Arc<Self> {
        Arc::new(Self { inner, down: AtomicBool::new(false) })
    }

    pub fn begin(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn end(&self) {
        self.down.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ValidatorSignerPort for CustodyOutage {
    async fn request_signature(
        &self,
        validator: &ValidatorId,
        tier: Tier,
        block_hash: &Hash,
    ) -> Result<BlockSignature, SignRequestError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(SignRequestError::Unreachable {
                validator: validator.clone(),
                detail: "signing host offline".into(),
            });
        }
        self.inner.request_signature(validator, tier, block_hash).await
    }
}

/// The ledger's signature source: one collection round per candidate.
pub struct RoundCollector(pub Arc<ConsensusService>);

#[async_trait]
impl ConsensusPort for RoundCollector {
    async fn collect(
        &self,
        tier: Tier,
        block_hash: Hash,
        index: u64,
    ) -> Result<Vec<BlockSignature>, ConsensusError> {
        self.0.collect(tier, block_hash, index).await
    }
}

/// The synchronizer's endorsement check.
pub struct QuorumVerifier(pub Arc<ConsensusService>);

impl BlockVerifier for QuorumVerifier {
    fn verify(&self, block: &FinalizedBlock) -> Result<usize, LedgerFault> {
        self.0.verify_finalized(block)
    }
}

/// The local ledger as the synchronizer sees it.
pub struct CouncilGateway(pub Arc<LedgerService>);

impl LedgerGateway for CouncilGateway {
    fn tip(&self) -> Result<ChainTip, LedgerFault> {
        self.0.tip()
    }

    fn page_at(&self, index: u64) -> Result<Option<Page>, LedgerFault> {
        self.0.page_at(index)
    }

    fn pages_in(&self, start: u64, end: u64) -> Result<Vec<Page>, LedgerFault> {
        self.0.pages_in(start, end)
    }

    fn admit(&self, block: FinalizedBlock) -> Result<AdmitOutcome, LedgerFault> {
        match self.0.accept_external(block)? {
            AcceptOutcome::Committed => Ok(AdmitOutcome::Committed),
            AcceptOutcome::AlreadyKnown => Ok(AdmitOutcome::AlreadyKnown),
        }
    }

    fn replace_suffix(
        &self,
        from_index: u64,
        replacement: Vec<Page>,
    ) -> Result<Vec<Page>, LedgerFault> {
        self.0.replace_suffix(from_index, replacement)
    }
}

// =============================================================================
// THE COUNCIL
// =============================================================================

/// One complete in-process node.
pub struct Council {
    pub clock: Arc<FixedTimeSource>,
    pub bus: Arc<InMemoryEventBus>,
    pub signers: Vec<Arc<SigningService>>,
    pub registry: Arc<RegistryService<ChainAudit>>,
    pub consensus: Arc<ConsensusService>,
    pub ledger: Arc<LedgerService>,
    pub outage: Arc<CustodyOutage>,
}

/// Deterministic council keys, one per seat.
pub fn seat_keys(members: usize) -> Vec<(ValidatorId, SignerKeypair)> {
    (0..members)
        .map(|i| {
            (
                ValidatorId::new(format!("seat-{i}")),
                SignerKeypair::from_seed(&[i as u8 + 1; 32]),
            )
        })
        .collect()
}

/// A schedule with every window closed.
pub fn no_rollups() -> RollupSchedule {
    RollupSchedule {
        chapter: RollupWindow::NEVER,
        book: RollupWindow::NEVER,
        part: RollupWindow::NEVER,
        series: RollupWindow::NEVER,
    }
}

/// Chapters sealed every `count` Pages, higher tiers never.
pub fn chapters_every(count: u64) -> RollupSchedule {
    RollupSchedule {
        chapter: RollupWindow { count: Some(count), duration_ms: None },
        ..no_rollups()
    }
}

fn roster_payload(
    series: &str,
    roster: &[(ValidatorId, PublicKeyBytes, ValidatorRole, TermBounds)],
) -> Value {
    let validators: Vec<Value> = roster
        .iter()
        .map(|(id, key, role, term)| {
            json!({
                "identity": id.as_str(),
                "public_key": hex::encode(key),
                "role": role.to_string(),
                "term": { "start": term.start, "until": term.until },
            })
        })
        .collect();
    json!({ "series": series, "validators": validators })
}

/// A council of `members` seats with in-memory stores, the first
/// `custody` of which this process can sign for.
pub async fn council(members: usize, custody: usize) -> Council {
    council_with(
        members,
        custody,
        no_rollups(),
        Box::new(SharedPageStore::new()),
        Box::new(InMemoryRollupStore::new()),
    )
    .await
}

/// Full wiring with caller-chosen stores and rollup schedule. Installs
/// genesis on both the registry and, when the page store is empty, the
/// ledger; a store that already holds a chain is picked up as-is.
pub async fn council_with(
    members: usize,
    custody: usize,
    schedule: RollupSchedule,
    pages: Box<dyn PageStore>,
    rollups: Box<dyn RollupStore>,
) -> Council {
    let clock = Arc::new(FixedTimeSource::at(T0));
    let bus = Arc::new(InMemoryEventBus::new());

    let signers: Vec<Arc<SigningService>> = seat_keys(members)
        .into_iter()
        .map(|(id, keypair)| Arc::new(SigningService::new(id, keypair, clock.clone())))
        .collect();

    let roster: Vec<(ValidatorId, PublicKeyBytes, ValidatorRole, TermBounds)> = signers
        .iter()
        .enumerate()
        .map(|(i, signer)| {
            (
                signer.validator_id().clone(),
                signer.public_key(),
                ValidatorRole::OFFICES[i % ValidatorRole::OFFICES.len()],
                TermBounds { start: T0 - DAY_MS, until: T0 + 365 * DAY_MS },
            )
        })
        .collect();

    let audit = ChainAudit::default();
    let registry = Arc::new(RegistryService::new(
        EligibilityPolicy::offices(),
        audit.clone(),
        bus.clone(),
        clock.clone(),
    ));
    registry.install_genesis(roster.clone()).expect("genesis roster");

    let mut hub =
        LocalSignerHub::new(SigningPolicy::AutoSign, Arc::new(StaticReviewGate::approving()));
    for signer in signers.iter().take(custody) {
        hub.add_signer(Arc::new(CouncilSigner(signer.clone())));
    }
    let outage = CustodyOutage::over(hub);

    let consensus = Arc::new(ConsensusService::new(
        ConsensusConfig { collection_window_ms: 500, signing_policy: SigningPolicy::AutoSign },
        Arc::new(RosterProvider { registry: registry.clone() }),
        outage.clone(),
    ));

    let genesis_needed = pages.is_empty();
    let ledger = Arc::new(LedgerService::new(
        LedgerConfig { rollup: schedule, ..LedgerConfig::default() },
        pages,
        rollups,
        Arc::new(RoundCollector(consensus.clone())),
        Arc::new(RosterDirectory { registry: registry.clone() }),
        bus.clone(),
        clock.clone(),
    ));
    audit.attach(ledger.clone());

    if genesis_needed {
        ledger
            .install_genesis(roster_payload("integration-council", &roster))
            .await
            .expect("genesis page");
    }

    Council { clock, bus, signers, registry, consensus, ledger, outage }
}

/// Attach a synchronizer for `node` to the loopback hub under `addr`.
pub fn join_network(
    hub: &Arc<LoopbackHub>,
    addr: &str,
    bootstrap: &[&str],
    node: &Council,
) -> Arc<SyncService> {
    let config = SyncConfig {
        self_addr: addr.to_string(),
        bootstrap_peers: bootstrap.iter().map(|p| p.to_string()).collect(),
        retry_base_ms: 5,
        ..SyncConfig::default()
    };
    let gateway = Arc::new(CouncilGateway(node.ledger.clone()));
    let service = Arc::new(SyncService::new(
        config,
        hub.transport_for(addr),
        gateway.clone(),
        Arc::new(QuorumVerifier(node.consensus.clone())),
        node.bus.clone(),
        node.clock.clone(),
    ));
    hub.register(addr, gateway, service.clone());
    service
}

/// Append one civic entry and require finalization.
pub async fn finalize_entry(node: &Council, action: &str, payload: Value) -> Page {
    match node
        .ledger
        .append(action, payload, "clerk-office")
        .await
        .expect("append accepted")
    {
        AppendOutcome::Finalized(page) => page,
        other => panic!("expected a finalized Page, got {other:?}"),
    }
}

/// Drain the subscription until an event satisfies `matches`.
pub async fn expect_event<F>(sub: &mut Subscription, matches: F) -> LedgerEvent
where
    F: Fn(&LedgerEvent) -> bool,
{
    loop {
        let event = tokio::time::timeout(Duration::from_millis(500), sub.recv())
            .await
            .expect("timed out waiting for a bus event")
            .expect("bus closed");
        if matches(&event) {
            return event;
        }
    }
}
