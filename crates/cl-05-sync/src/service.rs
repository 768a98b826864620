//! # Peer Synchronizer Service
//!
//! Implements [`SyncApi`] over four outbound ports: the peer transport,
//! the local ledger, the endorsement verifier, and the event bus.
//!
//! ## Trust
//!
//! Nothing that arrives over the wire is trusted for its origin. Every
//! inbound block is re-verified (hash, linkage, endorsement quorum) before
//! the ledger sees it, and every fetched branch is validated in full
//! before fork choice runs. Blocks that fail are quarantined for audit,
//! never silently dropped and never auto-repaired.
//!
//! ## Concurrency
//!
//! Broadcast fans out to all healthy peers concurrently; discovery,
//! catch-up, and heartbeats run one peer at a time. Peer-table locks are
//! never held across network awaits.

use crate::domain::config::SyncConfig;
use crate::domain::fork::{self, ForkDecision};
use crate::domain::peers::{HealthMark, PeerRecord, PeerTable};
use crate::domain::report::{
    BroadcastReport, HealthReport, QuarantinedBlock, ReceiveOutcome, SyncOutcome, SyncReport,
};
use crate::ports::inbound::SyncApi;
use crate::ports::outbound::{AdmitOutcome, BlockVerifier, LedgerGateway, PeerTransport};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_bus::{DedupCache, EventPublisher, LedgerEvent};
use shared_types::{
    short_hash, ChainTip, FinalizedBlock, IntegrityError, LedgerFault, NetworkError, Page,
    StorageError, Tier, TimeSource, ZERO_HASH,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Peer Synchronizer service.
pub struct SyncService {
    config: SyncConfig,
    table: RwLock<PeerTable>,
    /// Rejected and displaced blocks, oldest first.
    quarantine: RwLock<Vec<QuarantinedBlock>>,
    /// Recently processed block hashes; drops gossip echoes early.
    seen: Mutex<DedupCache>,
    transport: Arc<dyn PeerTransport>,
    ledger: Arc<dyn LedgerGateway>,
    verifier: Arc<dyn BlockVerifier>,
    bus: Arc<dyn EventPublisher>,
    clock: Arc<dyn TimeSource>,
}

impl SyncService {
    pub fn new(
        config: SyncConfig,
        transport: Arc<dyn PeerTransport>,
        ledger: Arc<dyn LedgerGateway>,
        verifier: Arc<dyn BlockVerifier>,
        bus: Arc<dyn EventPublisher>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let table = PeerTable::new(
            config.self_addr.clone(),
            config.max_peers,
            config.failure_threshold,
        );
        info!(
            self_addr = %config.self_addr,
            bootstrap = config.bootstrap_peers.len(),
            max_peers = config.max_peers,
            "Peer synchronizer initialized"
        );
        Self {
            config,
            table: RwLock::new(table),
            quarantine: RwLock::new(Vec::new()),
            seen: Mutex::new(DedupCache::new()),
            transport,
            ledger,
            verifier,
            bus,
            clock,
        }
    }

    /// Surface a peer-table standing change on the bus.
    async fn note_mark(&self, addr: &str, mark: HealthMark) {
        let healthy = match mark {
            HealthMark::Unchanged => return,
            HealthMark::BecameHealthy => true,
            HealthMark::BecameUnhealthy => false,
            HealthMark::Pruned => {
                warn!(peer = addr, "Peer pruned after repeated failures");
                false
            }
        };
        self.bus
            .publish(LedgerEvent::PeerStatusChanged { peer: addr.to_string(), healthy })
            .await;
    }

    async fn fail_peer(&self, addr: &str) {
        let mark = self.table.write().mark_failure(addr);
        self.note_mark(addr, mark).await;
    }

    fn quarantine_block(&self, block: FinalizedBlock, peer: &str, reason: impl Into<String>) {
        let entry = QuarantinedBlock {
            peer: peer.to_string(),
            reason: reason.into(),
            at_ms: self.clock.now_ms(),
            block,
        };
        warn!(
            peer,
            block = %short_hash(&entry.block.hash()),
            reason = %entry.reason,
            "Block quarantined"
        );
        self.quarantine.write().push(entry);
    }

    /// Fetch a page range, marking the peer failed on transport errors.
    async fn fetch_range(
        &self,
        peer: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<Page>, LedgerFault> {
        match self.transport.fetch_pages(peer, from, to).await {
            Ok(pages) => Ok(pages),
            Err(err) => {
                self.fail_peer(peer).await;
                Err(err.into())
            }
        }
    }

    /// Fetch exactly the page at `index` from the peer.
    async fn remote_page(&self, peer: &str, index: u64) -> Result<Page, LedgerFault> {
        let mut pages = self.fetch_range(peer, index, index).await?;
        if pages.len() != 1 || pages[0].index != index {
            return Err(NetworkError::MalformedResponse {
                peer: peer.to_string(),
                detail: format!("asked for page {index}, got {} pages", pages.len()),
            }
            .into());
        }
        Ok(pages.remove(0))
    }

    fn local_page(&self, index: u64) -> Result<Page, LedgerFault> {
        self.ledger.page_at(index)?.ok_or_else(|| {
            StorageError::Decode(format!("page {index} missing below tip")).into()
        })
    }

    /// Binary-search the first index where the histories disagree. Both
    /// chains hold at least `shared` pages and are known to disagree at
    /// `shared - 1`.
    async fn first_divergent(&self, peer: &str, shared: u64) -> Result<u64, LedgerFault> {
        let mut lo = 0u64;
        let mut hi = shared - 1;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let remote = self.remote_page(peer, mid).await?;
            if self.local_page(mid)?.hash == remote.hash {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Fetch and commit pages `from..remote_height` in ascending batches.
    /// Every page commits individually, so interrupted passes keep their
    /// progress.
    async fn catch_up(&self, peer: &str, from: u64, remote_height: u64) -> Result<u64, LedgerFault> {
        let batch = self.config.fetch_batch.max(1);
        let mut applied = 0u64;
        let mut next = from;
        while next < remote_height {
            let to = remote_height.min(next + batch) - 1;
            let pages = self.fetch_range(peer, next, to).await?;
            if pages.is_empty() {
                return Err(NetworkError::MalformedResponse {
                    peer: peer.to_string(),
                    detail: format!("no pages served for {next}..={to}"),
                }
                .into());
            }
            for page in pages {
                let index = page.index;
                let block = FinalizedBlock::Page(page);
                if let Err(fault) = self.verifier.verify(&block) {
                    self.quarantine_block(block, peer, fault.to_string());
                    return Err(fault);
                }
                match self.ledger.admit(block)? {
                    AdmitOutcome::Committed => applied += 1,
                    AdmitOutcome::AlreadyKnown => {}
                }
                next = index + 1;
            }
        }
        Ok(applied)
    }

    /// Validate the remote branch from the fork point and let fork choice
    /// pick the survivor. The losing branch always lands in quarantine.
    async fn resolve_fork(
        &self,
        peer: &str,
        fork_index: u64,
        local: &ChainTip,
        remote: &ChainTip,
    ) -> Result<SyncReport, LedgerFault> {
        let anchor = if fork_index == 0 {
            ZERO_HASH
        } else {
            self.local_page(fork_index - 1)?.hash
        };

        let remote_branch = self.fetch_range(peer, fork_index, remote.height - 1).await?;
        let checked = fork::validate_segment(&anchor, fork_index, &remote_branch).and_then(|()| {
            remote_branch
                .iter()
                .try_for_each(|page| self.verifier.verify(&FinalizedBlock::Page(page.clone())).map(|_| ()))
        });
        if let Err(fault) = checked {
            warn!(peer, fork_index, error = %fault, "Remote branch failed validation");
            if let Some(head) = remote_branch.into_iter().next() {
                self.quarantine_block(FinalizedBlock::Page(head), peer, fault.to_string());
            }
            return Ok(SyncReport {
                peer: peer.to_string(),
                height_before: local.height,
                height_after: local.height,
                applied: 0,
                outcome: SyncOutcome::RejectedRemote { at_index: fork_index },
            });
        }

        let local_branch = self.ledger.pages_in(fork_index, local.height - 1)?;
        match fork::fork_choice(&local_branch, &remote_branch) {
            ForkDecision::AdoptRemote => {
                let adopted = remote_branch.len() as u64;
                let displaced = self.ledger.replace_suffix(fork_index, remote_branch)?;
                let quarantined = displaced.len();
                for page in displaced {
                    self.quarantine_block(FinalizedBlock::Page(page), peer, "displaced by fork choice");
                }
                let after = self.ledger.tip()?;
                warn!(
                    peer,
                    fork_index,
                    quarantined,
                    height = after.height,
                    "Fork resolved in favor of remote branch"
                );
                self.bus
                    .publish(LedgerEvent::ForkResolved {
                        from_index: fork_index,
                        new_tip: after.hash,
                        quarantined,
                    })
                    .await;
                Ok(SyncReport {
                    peer: peer.to_string(),
                    height_before: local.height,
                    height_after: after.height,
                    applied: adopted,
                    outcome: SyncOutcome::AdoptedRemote { from_index: fork_index, quarantined },
                })
            }
            ForkDecision::KeepLocal => {
                let quarantined = remote_branch.len();
                for page in remote_branch {
                    self.quarantine_block(FinalizedBlock::Page(page), peer, "lost fork choice");
                }
                info!(peer, fork_index, quarantined, "Fork resolved in favor of local branch");
                Ok(SyncReport {
                    peer: peer.to_string(),
                    height_before: local.height,
                    height_after: local.height,
                    applied: 0,
                    outcome: SyncOutcome::KeptLocal { at_index: fork_index, quarantined },
                })
            }
        }
    }

    fn report(peer: &str, before: u64, after: u64, applied: u64, outcome: SyncOutcome) -> SyncReport {
        SyncReport {
            peer: peer.to_string(),
            height_before: before,
            height_after: after,
            applied,
            outcome,
        }
    }
}

#[async_trait]
impl SyncApi for SyncService {
    async fn discover_peers(&self) -> usize {
        let now = self.clock.now_ms();
        let seeded = self
            .table
            .write()
            .merge(self.config.bootstrap_peers.iter().cloned(), now);

        let targets: Vec<String> = {
            let table = self.table.read();
            table.healthy_peers().into_iter().map(|p| p.addr).collect()
        };
        let mut gossiped = 0usize;
        for addr in targets {
            match self.transport.peer_list(&addr).await {
                Ok(addrs) => {
                    let now = self.clock.now_ms();
                    let mark = {
                        let mut table = self.table.write();
                        gossiped += table.merge(addrs, now);
                        table.mark_alive(&addr, now)
                    };
                    self.note_mark(&addr, mark).await;
                }
                Err(err) => {
                    debug!(peer = %addr, error = %err, "Peer list request failed");
                    self.fail_peer(&addr).await;
                }
            }
        }

        let known = self.table.read().len();
        info!(seeded, gossiped, known, "Peer discovery pass complete");
        known
    }

    async fn broadcast(&self, block: &FinalizedBlock) -> Result<BroadcastReport, NetworkError> {
        let hash = block.hash();
        let peers = self.table.read().healthy_peers();
        if peers.is_empty() {
            debug!(block = %short_hash(&hash), "No healthy peers; broadcast skipped");
            return Ok(BroadcastReport { delivered: 0, failed: 0 });
        }

        // Remember our own block so the gossip echo coming back from peers
        // is dropped without re-validation.
        self.seen.lock().first_sighting(hash, self.clock.now_ms());

        let attempts = self.config.retry_max.max(1);
        let base_ms = self.config.retry_base_ms;
        let mut deliveries: JoinSet<(String, Result<(), NetworkError>)> = JoinSet::new();
        for peer in &peers {
            let transport = Arc::clone(&self.transport);
            let addr = peer.addr.clone();
            let block = block.clone();
            deliveries.spawn(async move {
                let mut last = NetworkError::PeerUnreachable(addr.clone());
                for attempt in 0..attempts {
                    if attempt > 0 {
                        let backoff = base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                    match transport.send_block(&addr, &block).await {
                        Ok(()) => return (addr, Ok(())),
                        Err(err) => last = err,
                    }
                }
                (addr, Err(last))
            });
        }

        let mut delivered = 0usize;
        let mut failed = 0usize;
        while let Some(joined) = deliveries.join_next().await {
            let (addr, result) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(error = %err, "Delivery task failed");
                    failed += 1;
                    continue;
                }
            };
            match result {
                Ok(()) => {
                    delivered += 1;
                    let mark = self.table.write().mark_alive(&addr, self.clock.now_ms());
                    self.note_mark(&addr, mark).await;
                }
                Err(err) => {
                    failed += 1;
                    warn!(peer = %addr, error = %err, "Block delivery exhausted its attempts");
                    self.fail_peer(&addr).await;
                }
            }
        }

        if delivered == 0 {
            return Err(NetworkError::BroadcastExhausted {
                attempts,
                block: short_hash(&hash),
            });
        }
        info!(block = %short_hash(&hash), delivered, failed, "Block broadcast");
        Ok(BroadcastReport { delivered, failed })
    }

    async fn receive_block(
        &self,
        peer: &str,
        block: FinalizedBlock,
    ) -> Result<ReceiveOutcome, LedgerFault> {
        let now = self.clock.now_ms();
        let mark = {
            // First contact creates the table entry; inbound gossip is how
            // small deployments find each other.
            let mut table = self.table.write();
            table.upsert(peer, now);
            table.mark_alive(peer, now)
        };
        self.note_mark(peer, mark).await;

        let hash = block.hash();
        if !self.seen.lock().first_sighting(hash, now) {
            debug!(peer, block = %short_hash(&hash), "Gossip echo dropped");
            return Ok(ReceiveOutcome::Duplicate);
        }

        if let Err(fault) = self.verifier.verify(&block) {
            warn!(peer, block = %short_hash(&hash), error = %fault, "Peer block failed verification");
            self.quarantine_block(block, peer, fault.to_string());
            return Err(fault);
        }

        let index = block.index();
        let tier = block.tier();
        match self.ledger.admit(block.clone()) {
            Ok(AdmitOutcome::Committed) => {
                info!(peer, index, block = %short_hash(&hash), "Peer block committed");
                Ok(ReceiveOutcome::Committed { index })
            }
            Ok(AdmitOutcome::AlreadyKnown) => Ok(ReceiveOutcome::Duplicate),
            Err(LedgerFault::Integrity(IntegrityError::SequenceGap { expected, .. })) => {
                debug!(peer, index, local_height = expected, "Peer block is ahead of our tip");
                Ok(ReceiveOutcome::NeedsSync { tip_height: expected })
            }
            Err(LedgerFault::Integrity(err)) => {
                if matches!(err, IntegrityError::Divergence { .. }) {
                    self.bus
                        .publish(LedgerEvent::ChainDiverged { tier, index, peer: peer.to_string() })
                        .await;
                }
                warn!(peer, index, error = %err, "Peer block failed admission");
                self.quarantine_block(block, peer, err.to_string());
                Err(err.into())
            }
            Err(fault) => Err(fault),
        }
    }

    async fn sync(&self, peer: &str) -> Result<SyncReport, LedgerFault> {
        self.table.write().upsert(peer, self.clock.now_ms());

        let remote = match self.transport.chain_info(peer).await {
            Ok(info) => info,
            Err(err) => {
                self.fail_peer(peer).await;
                return Err(err.into());
            }
        };
        let mark = self
            .table
            .write()
            .mark_success(peer, self.clock.now_ms(), remote.height, remote.hash);
        self.note_mark(peer, mark).await;

        let local = self.ledger.tip()?;
        if remote.height == local.height && remote.hash == local.hash {
            debug!(peer, height = local.height, "Already in sync");
            return Ok(Self::report(peer, local.height, local.height, 0, SyncOutcome::AlreadyCurrent));
        }

        let shared = local.height.min(remote.height);
        if shared == 0 {
            if remote.height == 0 {
                // The remote chain is empty; it will pull from us on its
                // own schedule.
                return Ok(Self::report(peer, local.height, local.height, 0, SyncOutcome::AlreadyCurrent));
            }
            let applied = self.catch_up(peer, 0, remote.height).await?;
            let after = self.ledger.tip()?;
            info!(peer, applied, height = after.height, "Chain bootstrapped from peer");
            return Ok(Self::report(peer, local.height, after.height, applied, SyncOutcome::Advanced));
        }

        let last_shared = shared - 1;
        let probe = self.remote_page(peer, last_shared).await?;
        if self.local_page(last_shared)?.hash == probe.hash {
            if remote.height <= local.height {
                // The remote chain is a strict prefix of ours.
                return Ok(Self::report(peer, local.height, local.height, 0, SyncOutcome::AlreadyCurrent));
            }
            let applied = self.catch_up(peer, local.height, remote.height).await?;
            let after = self.ledger.tip()?;
            info!(peer, applied, height = after.height, "Caught up with peer");
            return Ok(Self::report(peer, local.height, after.height, applied, SyncOutcome::Advanced));
        }

        let fork_index = self.first_divergent(peer, shared).await?;
        warn!(peer, fork_index, "Chain divergence detected");
        self.bus
            .publish(LedgerEvent::ChainDiverged {
                tier: Tier::Page,
                index: fork_index,
                peer: peer.to_string(),
            })
            .await;
        self.resolve_fork(peer, fork_index, &local, &remote).await
    }

    async fn health_check(&self) -> HealthReport {
        let addrs = self.table.read().known_addrs();
        let mut healthy = 0usize;
        let mut pruned = 0usize;
        for addr in &addrs {
            match self.transport.health(addr).await {
                Ok(tip) => {
                    healthy += 1;
                    let mark = self
                        .table
                        .write()
                        .mark_success(addr, self.clock.now_ms(), tip.height, tip.hash);
                    self.note_mark(addr, mark).await;
                }
                Err(err) => {
                    debug!(peer = %addr, error = %err, "Heartbeat failed");
                    let mark = self.table.write().mark_failure(addr);
                    if mark == HealthMark::Pruned {
                        pruned += 1;
                    }
                    self.note_mark(addr, mark).await;
                }
            }
        }
        debug!(checked = addrs.len(), healthy, pruned, "Heartbeat sweep complete");
        HealthReport { checked: addrs.len(), healthy, pruned }
    }

    fn peers(&self) -> Vec<PeerRecord> {
        self.table.read().records()
    }

    fn quarantine(&self) -> Vec<QuarantinedBlock> {
        self.quarantine.read().clone()
    }
}
