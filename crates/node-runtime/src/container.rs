//! # Node Container
//!
//! Builds the whole subsystem graph from one [`NodeConfig`] and owns it
//! for the life of the process: signer custody, registry, consensus,
//! ledger, and synchronizer, each behind its own port, wired together by
//! the adapters in [`crate::adapters`].
//!
//! The container is also the collaborator entry point: `append_entry`
//! screens submissions (reserved namespaces, duplicate suppression)
//! before they reach the ledger, and pushes finalized Pages to peers.

use crate::adapters::{
    ConsensusVerifier, CustodySigner, HttpPeerTransport, LedgerAuditSink, QuorumCollector,
    RegistryDirectory, RegistrySetProvider, SyncLedgerGateway,
};
use crate::config::NodeConfig;
use crate::genesis;
use anyhow::{bail, Context};
use cl_01_signer::adapters::FileSeedStore;
use cl_01_signer::{SignerApi, SignerKeypair, SigningService};
use cl_02_registry::{EligibilityPolicy, RegistryApi, RegistryService};
use cl_03_ledger::adapters::{
    FilePageStore, FileRollupStore, InMemoryPageStore, InMemoryRollupStore, StoreLock,
};
use cl_03_ledger::{
    AppendOutcome, ChainValidationReport, HistoryFilter, LedgerApi, LedgerService, PageStore,
    RollupStore,
};
use cl_04_consensus::adapters::{LocalSignerHub, StaticReviewGate};
use cl_04_consensus::ConsensusService;
use cl_05_sync::{SyncApi, SyncService};
use parking_lot::Mutex;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use shared_bus::{DedupCache, InMemoryEventBus};
use shared_types::{
    short_hash, to_canonical_bytes, ChainTip, FinalizedBlock, Hash, LedgerFault, Page,
    PublicKeyBytes, SystemTimeSource, TimeSource, ValidatorId,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Action prefixes the node reserves for itself. `validator.*` Pages come
/// only from the registry's audit sink and `ledger.*` only from genesis
/// installation; collaborator entries may use neither.
const RESERVED_PREFIXES: [&str; 2] = ["validator.", "ledger."];

/// The assembled node.
pub struct NodeContainer {
    config: NodeConfig,
    bus: Arc<InMemoryEventBus>,
    signers: Vec<Arc<SigningService>>,
    registry: Arc<RegistryService<LedgerAuditSink>>,
    consensus: Arc<ConsensusService>,
    ledger: Arc<LedgerService>,
    sync: Arc<SyncService>,
    submissions: Mutex<DedupCache>,
    clock: Arc<dyn TimeSource>,
    // Held for the lifetime of the container; dropping it releases the
    // data dir to the next process.
    _store_lock: Option<StoreLock>,
}

impl std::fmt::Debug for NodeContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContainer").finish_non_exhaustive()
    }
}

impl NodeContainer {
    /// Build and wire every subsystem, then bring the chain to a usable
    /// state: install genesis on a fresh authoritative node, rebuild the
    /// registry from the chain on a restart, or wait for peers on a
    /// bootstrapping replica.
    pub async fn build(config: NodeConfig) -> anyhow::Result<Arc<Self>> {
        config.validate()?;

        let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
        let bus = Arc::new(InMemoryEventBus::new());

        // Signer custody: the primary identity first, co-signers after.
        let mut signers: Vec<Arc<SigningService>> = Vec::new();
        if !config.identity.validator.is_empty() {
            let id = ValidatorId::new(config.identity.validator.clone());
            let seed = config.resolve_key_file(config.identity.key_file.as_deref(), "signer.seed");
            signers.push(Arc::new(build_signer(id, seed, clock.clone()).await?));
        }
        for co_signer in &config.identity.co_signers {
            let id = ValidatorId::new(co_signer.validator.clone());
            let default_name = format!("{}.seed", co_signer.validator);
            let seed = config.resolve_key_file(co_signer.key_file.as_deref(), &default_name);
            signers.push(Arc::new(build_signer(id, seed, clock.clone()).await?));
        }

        // Registry, auditing into the ledger once the ledger exists.
        let audit = LedgerAuditSink::detached();
        let policy = EligibilityPolicy::new(config.registry.eligible_roles.iter().copied())
            .context("building the eligibility policy")?;
        let registry =
            Arc::new(RegistryService::new(policy, audit.clone(), bus.clone(), clock.clone()));

        // Consensus over the custodied signers.
        let mut hub = LocalSignerHub::new(
            config.consensus.signing_policy,
            Arc::new(StaticReviewGate::approving()),
        );
        for signer in &signers {
            hub.add_signer(Arc::new(CustodySigner::new(signer.clone())));
        }
        let consensus = Arc::new(ConsensusService::new(
            config.consensus.clone(),
            Arc::new(RegistrySetProvider::new(registry.clone())),
            Arc::new(hub),
        ));

        // Ledger over file or memory stores.
        let (pages, rollups, store_lock) = open_stores(&config)?;
        let ledger = Arc::new(LedgerService::new(
            config.ledger.clone(),
            pages,
            rollups,
            Arc::new(QuorumCollector::new(consensus.clone())),
            Arc::new(RegistryDirectory::new(registry.clone())),
            bus.clone(),
            clock.clone(),
        ));
        audit.attach(ledger.clone());

        // Synchronizer over HTTP peers, advertising our public address.
        let mut sync_config = config.sync.clone();
        sync_config.self_addr = config.advertise_addr().to_string();
        let transport =
            HttpPeerTransport::new(sync_config.self_addr.clone(), config.node.request_timeout_ms)
                .context("building the peer HTTP client")?;
        let sync = Arc::new(SyncService::new(
            sync_config,
            Arc::new(transport),
            Arc::new(SyncLedgerGateway::new(ledger.clone(), registry.clone())),
            Arc::new(ConsensusVerifier::new(consensus.clone())),
            bus.clone(),
            clock.clone(),
        ));

        let container = Arc::new(Self {
            submissions: Mutex::new(DedupCache::with_config(
                config.node.dedup_ttl_ms,
                config.node.dedup_ttl_ms,
            )),
            config,
            bus,
            signers,
            registry,
            consensus,
            ledger,
            sync,
            clock,
            _store_lock: store_lock,
        });
        container.initialize_chain().await?;
        Ok(container)
    }

    async fn initialize_chain(&self) -> anyhow::Result<()> {
        let tip = self.ledger.tip().context("reading the chain tip")?;
        if tip.height > 0 {
            let replayed = genesis::rebuild_registry(self.ledger.as_ref(), &self.registry)
                .context("rebuilding the registry from the chain")?;
            info!(height = tip.height, replayed, "Chain loaded, registry rebuilt");
            return Ok(());
        }

        if self.config.genesis.validators.is_empty() {
            if self.config.sync.bootstrap_peers.is_empty() {
                bail!("empty chain, no genesis roster, and no bootstrap peers: nothing to serve");
            }
            info!("Empty chain and no genesis roster, waiting to bootstrap from peers");
            return Ok(());
        }

        let roster = genesis::roster_from_config(&self.config.genesis, &self.held_keys())?;
        let page = genesis::install(
            &self.config.genesis.series,
            roster,
            &self.registry,
            self.ledger.as_ref(),
        )
        .await?;
        info!(
            series = %self.config.genesis.series,
            validators = self.registry.active_validators().len(),
            hash = %short_hash(&page.hash),
            "Genesis installed"
        );
        Ok(())
    }

    fn held_keys(&self) -> BTreeMap<String, PublicKeyBytes> {
        self.signers
            .iter()
            .map(|s| (s.validator_id().to_string(), s.public_key()))
            .collect()
    }

    /// Submit one collaborator entry.
    ///
    /// Reserved namespaces and duplicate submissions inside the dedup
    /// window are refused without touching the chain. A finalized Page is
    /// pushed to peers in the background.
    pub async fn append_entry(
        &self,
        action: &str,
        payload: Value,
        submitter: &str,
    ) -> Result<AppendOutcome, LedgerFault> {
        if let Some(prefix) = RESERVED_PREFIXES.iter().find(|p| action.starts_with(**p)) {
            return Ok(AppendOutcome::Rejected {
                reason: format!("action namespace {prefix:?} is reserved"),
            });
        }

        let fingerprint = submission_fingerprint(action, &payload, submitter)?;
        if !self.submissions.lock().first_sighting(fingerprint, self.clock.now_ms()) {
            return Ok(AppendOutcome::Rejected { reason: "duplicate submission".into() });
        }

        let outcome = self.ledger.append(action, payload, submitter).await?;
        if let AppendOutcome::Finalized(page) = &outcome {
            self.broadcast(FinalizedBlock::Page(page.clone()));
        }
        Ok(outcome)
    }

    /// Push one finalized block to the peer set in the background.
    pub fn broadcast(&self, block: FinalizedBlock) {
        let sync = self.sync.clone();
        tokio::spawn(async move {
            if let Err(error) = sync.broadcast(&block).await {
                warn!(%error, "Broadcast failed");
            }
        });
    }

    /// Committed Pages matching `filter`.
    pub fn read_history(&self, filter: &HistoryFilter) -> Result<Vec<Page>, LedgerFault> {
        self.ledger.read_history(filter)
    }

    /// Full-chain integrity walk.
    pub fn validate_chain(&self) -> Result<ChainValidationReport, LedgerFault> {
        self.ledger.validate_chain()
    }

    /// Current Page-chain tip.
    pub fn chain_tip(&self) -> Result<ChainTip, LedgerFault> {
        self.ledger.tip()
    }

    /// Validators eligible to sign right now.
    pub fn active_validator_count(&self) -> usize {
        self.registry.active_validators().len()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RegistryService<LedgerAuditSink>> {
        &self.registry
    }

    pub fn consensus(&self) -> &Arc<ConsensusService> {
        &self.consensus
    }

    pub fn ledger(&self) -> &Arc<LedgerService> {
        &self.ledger
    }

    pub fn sync(&self) -> &Arc<SyncService> {
        &self.sync
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }
}

async fn build_signer(
    id: ValidatorId,
    seed_file: Option<PathBuf>,
    clock: Arc<dyn TimeSource>,
) -> anyhow::Result<SigningService> {
    match seed_file {
        Some(path) => {
            let store = FileSeedStore::new(path);
            SigningService::from_store(id.clone(), &store, clock)
                .await
                .with_context(|| format!("loading the seed for {id}"))
        }
        // No data dir and no explicit file: the key lives for this
        // process only.
        None => Ok(SigningService::new(id, SignerKeypair::generate(), clock)),
    }
}

type OpenedStores = (Box<dyn PageStore>, Box<dyn RollupStore>, Option<StoreLock>);

fn open_stores(config: &NodeConfig) -> anyhow::Result<OpenedStores> {
    match &config.node.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating data dir {}", dir.display()))?;
            let lock = StoreLock::acquire(dir).context("locking the data dir")?;
            let pages = FilePageStore::open(dir).context("opening the page store")?;
            let rollups = FileRollupStore::open(dir).context("opening the rollup stores")?;
            Ok((Box::new(pages), Box::new(rollups), Some(lock)))
        }
        None => {
            info!("No data dir configured, chain is in memory only");
            Ok((Box::new(InMemoryPageStore::new()), Box::new(InMemoryRollupStore::new()), None))
        }
    }
}

fn submission_fingerprint(
    action: &str,
    payload: &Value,
    submitter: &str,
) -> Result<Hash, LedgerFault> {
    let canonical = to_canonical_bytes(&json!({
        "action": action,
        "payload": payload,
        "submitter": submitter,
    }))?;
    Ok(Sha256::digest(&canonical).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenesisValidator, SELF_KEY};
    use cl_03_ledger::service::GENESIS_ACTION;
    use cl_04_consensus::SigningPolicy;
    use shared_types::ValidatorRole;

    fn standalone_config(validator: &str) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.identity.validator = validator.into();
        config.consensus.signing_policy = SigningPolicy::AutoSign;
        config.genesis.validators.push(GenesisValidator {
            identity: validator.into(),
            public_key: SELF_KEY.into(),
            role: ValidatorRole::Chair,
            term_start: 0,
            term_until: 4_102_444_800_000,
        });
        config
    }

    #[tokio::test]
    async fn test_standalone_node_installs_genesis() {
        let node = NodeContainer::build(standalone_config("chair-1")).await.unwrap();

        let tip = node.chain_tip().unwrap();
        assert_eq!(tip.height, 1);
        assert_eq!(node.active_validator_count(), 1);

        let page = node.ledger().page_at(0).unwrap().unwrap();
        assert_eq!(page.action, GENESIS_ACTION);
        assert!(page.signatures.is_empty());
        assert_eq!(page.payload["validators"][0]["identity"], "chair-1");
    }

    #[tokio::test]
    async fn test_appends_finalize_with_self_quorum() {
        let node = NodeContainer::build(standalone_config("chair-1")).await.unwrap();
        let outcome = node
            .append_entry("minutes.approved", json!({ "meeting": 12 }), "clerk-9")
            .await
            .unwrap();

        let AppendOutcome::Finalized(page) = outcome else {
            panic!("expected a finalized Page, got {outcome:?}");
        };
        assert_eq!(page.index, 1);
        assert_eq!(page.signatures.len(), 1);
        assert_eq!(page.signatures[0].validator.as_str(), "chair-1");
    }

    #[tokio::test]
    async fn test_co_signers_widen_the_quorum() {
        let mut config = standalone_config("chair-1");
        for identity in ["vice-1", "sec-1"] {
            config
                .identity
                .co_signers
                .push(crate::config::CoSigner { validator: identity.into(), key_file: None });
            config.genesis.validators.push(GenesisValidator {
                identity: identity.into(),
                public_key: SELF_KEY.into(),
                role: ValidatorRole::Secretary,
                term_start: 0,
                term_until: 4_102_444_800_000,
            });
        }

        let node = NodeContainer::build(config).await.unwrap();
        assert_eq!(node.active_validator_count(), 3);

        let outcome =
            node.append_entry("minutes.approved", json!({ "meeting": 1 }), "clerk-9").await.unwrap();
        let AppendOutcome::Finalized(page) = outcome else {
            panic!("expected a finalized Page, got {outcome:?}");
        };
        // Majority of three is two; stragglers may push it to three.
        assert!(page.signatures.len() >= 2);
    }

    #[tokio::test]
    async fn test_duplicate_submissions_are_refused() {
        let node = NodeContainer::build(standalone_config("chair-1")).await.unwrap();
        let entry = json!({ "meeting": 12 });

        let first = node.append_entry("minutes.approved", entry.clone(), "clerk-9").await.unwrap();
        assert!(matches!(first, AppendOutcome::Finalized(_)));

        let second = node.append_entry("minutes.approved", entry, "clerk-9").await.unwrap();
        let AppendOutcome::Rejected { reason } = second else {
            panic!("expected a rejection, got {second:?}");
        };
        assert!(reason.contains("duplicate"));
        assert_eq!(node.chain_tip().unwrap().height, 2);
    }

    #[tokio::test]
    async fn test_reserved_namespaces_are_refused() {
        let node = NodeContainer::build(standalone_config("chair-1")).await.unwrap();

        for action in ["validator.registered", "ledger.genesis"] {
            let outcome = node.append_entry(action, json!({}), "clerk-9").await.unwrap();
            assert!(
                matches!(outcome, AppendOutcome::Rejected { ref reason } if reason.contains("reserved")),
                "{action} should be refused"
            );
        }
        assert_eq!(node.chain_tip().unwrap().height, 1);
        assert_eq!(node.active_validator_count(), 1);
    }

    #[tokio::test]
    async fn test_build_refuses_a_node_with_nothing_to_serve() {
        // No chain, no roster, no peers to bootstrap from.
        let err = NodeContainer::build(NodeConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("nothing to serve"));
    }

    #[tokio::test]
    async fn test_restart_rebuilds_registry_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = standalone_config("chair-1");
        config.node.data_dir = Some(dir.path().to_path_buf());

        {
            let node = NodeContainer::build(config.clone()).await.unwrap();
            node.append_entry("minutes.approved", json!({ "n": 1 }), "clerk-9").await.unwrap();
            assert_eq!(node.chain_tip().unwrap().height, 2);
        }

        // Same data dir, fresh process: chain reloads, registry replays.
        let node = NodeContainer::build(config).await.unwrap();
        assert_eq!(node.chain_tip().unwrap().height, 2);
        assert_eq!(node.active_validator_count(), 1);

        let outcome =
            node.append_entry("minutes.approved", json!({ "n": 2 }), "clerk-9").await.unwrap();
        assert!(matches!(outcome, AppendOutcome::Finalized(_)));
        assert!(node.validate_chain().unwrap().ok);
    }
}
