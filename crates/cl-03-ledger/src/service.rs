//! # Ledger Service
//!
//! Application service layer that implements the `LedgerApi` trait.
//!
//! ## Write path
//!
//! An async append guard serializes whole submissions so two callers never
//! build candidates against the same tip. Signature collection always runs
//! outside every lock; only the final tip-check-then-append step holds the
//! store write lock. If an inbound synced block claims the candidate's
//! index during collection, the commit detects the moved tip, the
//! candidate is rebuilt at the new tip once, and a second collision
//! rejects the entry.
//!
//! ## Read path
//!
//! Queries take the store read lock only. Chain validation re-verifies
//! every stored signature itself and judges each block against the
//! validator set of its own finalization time.

use crate::domain::chain::{
    self, AcceptOutcome, AppendOutcome, ChainValidationReport, Divergence, HistoryFilter,
};
use crate::domain::config::LedgerConfig;
use crate::domain::rollup::due_window;
use crate::domain::validation::{validate_action, validate_payload, validate_submitter};
use crate::domain::verify::{self, Endorsement};
use crate::ports::inbound::LedgerApi;
use crate::ports::outbound::{ConsensusPort, PageStore, RollupStore, ValidatorDirectory};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared_bus::{EventPublisher, LedgerEvent};
use shared_types::{
    quorum, short_hash, BlockSignature, ChainTip, ConsensusError, FinalizedBlock, Hash,
    IntegrityError, LedgerFault, Page, PageState, RollupRecord, SealedRange, StorageError, Tier,
    TimeSource, ZERO_HASH,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Action label of the genesis Page.
pub const GENESIS_ACTION: &str = "ledger.genesis";

/// Submitter identity recorded on the genesis Page.
pub const GENESIS_SUBMITTER: &str = "system";

/// Both chains behind one lock so a commit sees a consistent view of the
/// Page tier and every rollup tier.
struct Stores {
    pages: Box<dyn PageStore>,
    rollups: Box<dyn RollupStore>,
}

/// One open lower-tier record, as seen by the rollup scheduler.
struct OpenMember {
    index: u64,
    timestamp: u64,
    hash: Hash,
}

/// Ledger Core service.
pub struct LedgerService {
    config: LedgerConfig,
    stores: RwLock<Stores>,
    /// Serializes submissions end to end. Never held while a lock on
    /// `stores` is held; always acquired first.
    append_guard: tokio::sync::Mutex<()>,
    /// Candidates that missed quorum, keyed by candidate hash.
    pending: Mutex<BTreeMap<Hash, Page>>,
    consensus: Arc<dyn ConsensusPort>,
    directory: Arc<dyn ValidatorDirectory>,
    bus: Arc<dyn EventPublisher>,
    clock: Arc<dyn TimeSource>,
}

impl LedgerService {
    pub fn new(
        config: LedgerConfig,
        pages: Box<dyn PageStore>,
        rollups: Box<dyn RollupStore>,
        consensus: Arc<dyn ConsensusPort>,
        directory: Arc<dyn ValidatorDirectory>,
        bus: Arc<dyn EventPublisher>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            stores: RwLock::new(Stores { pages, rollups }),
            append_guard: tokio::sync::Mutex::new(()),
            pending: Mutex::new(BTreeMap::new()),
            consensus,
            directory,
            bus,
            clock,
        }
    }

    fn tip_of(stores: &Stores) -> Result<ChainTip, StorageError> {
        Ok(match stores.pages.last()? {
            Some(page) => ChainTip { height: stores.pages.len(), hash: page.hash },
            None => ChainTip::empty(),
        })
    }

    /// Build, collect, and commit one entry. Caller has already validated
    /// the entry against the minimal schema.
    async fn submit(
        &self,
        action: &str,
        payload: Value,
        submitter: &str,
    ) -> Result<AppendOutcome, LedgerFault> {
        let _guard = self.append_guard.lock().await;

        let mut rebuilt = false;
        loop {
            // 1. Candidate against the current tip.
            let tip = Self::tip_of(&self.stores.read())?;
            if tip.height == 0 {
                return Ok(AppendOutcome::Rejected {
                    reason: "genesis not installed".into(),
                });
            }
            let mut candidate = Page::draft(
                tip.height,
                tip.hash,
                action,
                payload.clone(),
                submitter,
                self.clock.now_ms(),
            )?;
            candidate.state = PageState::PendingSignatures;

            self.bus
                .publish(LedgerEvent::PagePending {
                    index: candidate.index,
                    hash: candidate.hash,
                })
                .await;

            // 2. Signature collection, outside every lock.
            let signatures = match self
                .consensus
                .collect(Tier::Page, candidate.hash, candidate.index)
                .await
            {
                Ok(signatures) => signatures,
                Err(err) => return Ok(self.park(candidate, err).await),
            };

            candidate.signatures = signatures;
            candidate.state = PageState::Finalized;

            // 3. Atomic tip-check-then-append.
            match self.commit_page(&candidate) {
                Ok(()) => {
                    info!(
                        index = candidate.index,
                        hash = %short_hash(&candidate.hash),
                        action,
                        signatures = candidate.signatures.len(),
                        "Page finalized"
                    );
                    self.bus
                        .publish(LedgerEvent::PageFinalized {
                            index: candidate.index,
                            hash: candidate.hash,
                            signature_count: candidate.signatures.len(),
                        })
                        .await;
                    return Ok(AppendOutcome::Finalized(candidate));
                }
                Err(LedgerFault::Integrity(IntegrityError::StaleCandidate)) if !rebuilt => {
                    debug!(
                        index = candidate.index,
                        "Tip moved during signature collection; rebuilding candidate"
                    );
                    rebuilt = true;
                    continue;
                }
                Err(LedgerFault::Integrity(IntegrityError::StaleCandidate)) => {
                    warn!(action, "Entry lost its index twice; giving up");
                    return Ok(AppendOutcome::Rejected {
                        reason: IntegrityError::StaleCandidate.to_string(),
                    });
                }
                Err(fault) => return Err(fault),
            }
        }
    }

    /// Park a candidate that missed quorum and surface the miss.
    async fn park(&self, mut candidate: Page, err: ConsensusError) -> AppendOutcome {
        let (got, need) = match &err {
            ConsensusError::QuorumNotReached { got, need, .. }
            | ConsensusError::WindowElapsed { got, need, .. } => (*got, *need),
            _ => (0, quorum(self.directory.active_count_at(self.clock.now_ms()))),
        };
        warn!(
            index = candidate.index,
            hash = %short_hash(&candidate.hash),
            %err,
            "Quorum not reached; candidate parked for retry"
        );
        candidate.state = PageState::PendingSignatures;
        self.pending.lock().insert(candidate.hash, candidate.clone());
        self.bus
            .publish(LedgerEvent::QuorumFailed {
                tier: Tier::Page,
                index: candidate.index,
                got,
                need,
            })
            .await;
        AppendOutcome::Pending(candidate)
    }

    fn commit_page(&self, page: &Page) -> Result<(), LedgerFault> {
        let mut stores = self.stores.write();
        let expected = stores.pages.len();
        let tip_hash = stores.pages.last()?.map(|p| p.hash).unwrap_or(ZERO_HASH);
        if page.index != expected || page.prior_hash != tip_hash {
            return Err(IntegrityError::StaleCandidate.into());
        }
        stores.pages.append(page.clone())?;
        Ok(())
    }

    /// Finalized-but-not-rolled-up records of `tier`, ascending.
    fn open_members(stores: &Stores, tier: Tier) -> Result<Vec<OpenMember>, StorageError> {
        let members = if tier == Tier::Page {
            stores
                .pages
                .all()?
                .into_iter()
                .filter(|p| p.state == PageState::Finalized)
                .map(|p| OpenMember { index: p.index, timestamp: p.timestamp, hash: p.hash })
                .collect()
        } else {
            stores
                .rollups
                .records(tier)?
                .into_iter()
                .filter(|r| r.state == PageState::Finalized)
                .map(|r| OpenMember { index: r.index, timestamp: r.timestamp, hash: r.hash })
                .collect()
        };
        Ok(members)
    }

    /// Hashes of `tier`'s lower-tier records inside `range`, ascending.
    fn lower_hashes_in(
        stores: &Stores,
        tier: Tier,
        range: SealedRange,
    ) -> Result<Vec<Hash>, StorageError> {
        let hashes = match tier.lower() {
            Some(Tier::Page) | None => stores
                .pages
                .pages_in(range.start, range.end)?
                .into_iter()
                .map(|p| p.hash)
                .collect(),
            Some(lower) => stores
                .rollups
                .records(lower)?
                .into_iter()
                .filter(|r| range.contains(r.index))
                .map(|r| r.hash)
                .collect(),
        };
        Ok(hashes)
    }

    fn commit_rollup(&self, record: &RollupRecord, lower: Tier) -> Result<(), LedgerFault> {
        let mut stores = self.stores.write();
        let expected = stores.rollups.len(record.tier);
        let prior = stores.rollups.last(record.tier)?.map(|r| r.hash).unwrap_or(ZERO_HASH);
        if record.index != expected || record.prior_hash != prior {
            return Err(IntegrityError::StaleCandidate.into());
        }
        stores.rollups.append(record.clone())?;
        for index in record.range.start..=record.range.end {
            if lower == Tier::Page {
                stores.pages.update_state(index, PageState::RolledUp)?;
            } else {
                stores.rollups.update_state(lower, index, PageState::RolledUp)?;
            }
        }
        Ok(())
    }

    /// Re-verify a stored block's endorsements against the validator set
    /// of its finalization time (the latest signature timestamp).
    fn check_endorsements(
        &self,
        tier: Tier,
        index: u64,
        hash: &Hash,
        signatures: &[BlockSignature],
    ) -> Result<(), IntegrityError> {
        let finalized_at = signatures.iter().map(|s| s.timestamp).max().unwrap_or(0);
        let endorsements: Vec<Endorsement> = signatures
            .iter()
            .map(|s| Endorsement {
                signature: s.clone(),
                public_key: self.directory.public_key_of(&s.validator),
                signer_active: self.directory.was_active_at(&s.validator, s.timestamp),
            })
            .collect();
        let active = self.directory.active_count_at(finalized_at);
        verify::ensure_quorum(tier, index, hash, &endorsements, active).map(|_| ())
    }

    fn check_page(
        &self,
        expected_index: u64,
        prior: &Hash,
        page: &Page,
    ) -> Result<(), IntegrityError> {
        chain::verify_page_structure(expected_index, prior, page)?;
        if page.index == 0 {
            // Genesis carries no endorsements; the roster in its payload is
            // the trust root every later block is judged against.
            return Ok(());
        }
        self.check_endorsements(Tier::Page, page.index, &page.hash, &page.signatures)
    }

    fn check_rollup(
        &self,
        stores: &Stores,
        expected_index: u64,
        prior: &Hash,
        next_start: u64,
        record: &RollupRecord,
    ) -> Result<(), LedgerFault> {
        chain::verify_rollup_structure(expected_index, prior, next_start, record)?;
        let lower_hashes = Self::lower_hashes_in(stores, record.tier, record.range)?;
        chain::verify_rollup_members(record, &lower_hashes)?;
        self.check_endorsements(record.tier, record.index, &record.hash, &record.signatures)?;
        Ok(())
    }

    fn accept_external_page(&self, page: Page) -> Result<AcceptOutcome, LedgerFault> {
        // Quorum first: it needs no lock and rejects forgeries before we
        // touch shared state. Genesis is index 0 and exempt.
        if page.index > 0 {
            self.check_endorsements(Tier::Page, page.index, &page.hash, &page.signatures)?;
        }

        let mut stores = self.stores.write();
        let len = stores.pages.len();
        if page.index < len {
            let existing = stores.pages.page_at(page.index)?.ok_or_else(|| {
                StorageError::Decode(format!("page {} missing below tip", page.index))
            })?;
            if existing.hash == page.hash {
                return Ok(AcceptOutcome::AlreadyKnown);
            }
            return Err(IntegrityError::Divergence {
                tier: Tier::Page,
                index: page.index,
                local: short_hash(&existing.hash),
                remote: short_hash(&page.hash),
            }
            .into());
        }
        if page.index > len {
            return Err(IntegrityError::SequenceGap {
                tier: Tier::Page,
                expected: len,
                found: page.index,
            }
            .into());
        }

        let tip_hash = stores.pages.last()?.map(|p| p.hash).unwrap_or(ZERO_HASH);
        chain::verify_page_structure(len, &tip_hash, &page)?;

        let mut page = page;
        page.state = PageState::Finalized;
        info!(
            index = page.index,
            hash = %short_hash(&page.hash),
            "External Page admitted"
        );
        stores.pages.append(page)?;
        Ok(AcceptOutcome::Committed)
    }

    fn accept_external_rollup(&self, record: RollupRecord) -> Result<AcceptOutcome, LedgerFault> {
        let Some(lower) = record.tier.lower() else {
            return Err(IntegrityError::BadRollupRange {
                tier: record.tier,
                index: record.index,
                start: record.range.start,
                end: record.range.end,
            }
            .into());
        };
        self.check_endorsements(record.tier, record.index, &record.hash, &record.signatures)?;

        {
            let mut stores = self.stores.write();
            let len = stores.rollups.len(record.tier);
            if record.index < len {
                let existing = stores
                    .rollups
                    .records(record.tier)?
                    .into_iter()
                    .find(|r| r.index == record.index)
                    .ok_or_else(|| {
                        StorageError::Decode(format!(
                            "{} record {} missing below tip",
                            record.tier, record.index
                        ))
                    })?;
                if existing.hash == record.hash {
                    return Ok(AcceptOutcome::AlreadyKnown);
                }
                return Err(IntegrityError::Divergence {
                    tier: record.tier,
                    index: record.index,
                    local: short_hash(&existing.hash),
                    remote: short_hash(&record.hash),
                }
                .into());
            }
            if record.index > len {
                return Err(IntegrityError::SequenceGap {
                    tier: record.tier,
                    expected: len,
                    found: record.index,
                }
                .into());
            }

            let last = stores.rollups.last(record.tier)?;
            let prior = last.as_ref().map(|r| r.hash).unwrap_or(ZERO_HASH);
            let next_start = last.as_ref().map(|r| r.range.end + 1).unwrap_or(0);
            chain::verify_rollup_structure(len, &prior, next_start, &record)?;
            let lower_hashes = Self::lower_hashes_in(&stores, record.tier, record.range)?;
            chain::verify_rollup_members(&record, &lower_hashes)?;

            let mut record = record;
            record.state = PageState::Finalized;
            info!(
                tier = %record.tier,
                index = record.index,
                hash = %short_hash(&record.hash),
                "External rollup admitted"
            );
            let range = record.range;
            stores.rollups.append(record)?;
            for index in range.start..=range.end {
                if lower == Tier::Page {
                    stores.pages.update_state(index, PageState::RolledUp)?;
                } else {
                    stores.rollups.update_state(lower, index, PageState::RolledUp)?;
                }
            }
        }
        Ok(AcceptOutcome::Committed)
    }
}

#[async_trait]
impl LedgerApi for LedgerService {
    async fn append(
        &self,
        action: &str,
        payload: Value,
        submitter: &str,
    ) -> Result<AppendOutcome, LedgerFault> {
        // Validation failures reject at the gate, they are never retried.
        let gate = validate_action(action)
            .and_then(|()| validate_submitter(submitter))
            .and_then(|()| validate_payload(&payload, self.config.max_payload_bytes));
        if let Err(err) = gate {
            debug!(action, %err, "Entry rejected");
            return Ok(AppendOutcome::Rejected { reason: err.to_string() });
        }

        self.submit(action, payload, submitter).await
    }

    async fn rollup(&self, tier: Tier) -> Result<Option<RollupRecord>, LedgerFault> {
        let Some(lower) = tier.lower() else {
            return Ok(None);
        };
        let Some(window) = self.config.rollup.window_for(tier) else {
            return Ok(None);
        };

        // 1. Snapshot the open lower-tier records and this tier's tip.
        let (open, next_index, prior_hash) = {
            let stores = self.stores.read();
            let open = Self::open_members(&stores, lower)?;
            let next_index = stores.rollups.len(tier);
            let prior_hash = stores.rollups.last(tier)?.map(|r| r.hash).unwrap_or(ZERO_HASH);
            (open, next_index, prior_hash)
        };

        // 2. Window arithmetic over timestamps only.
        let stamps: Vec<u64> = open.iter().map(|m| m.timestamp).collect();
        let Some(due) = due_window(&window, &stamps, self.clock.now_ms()) else {
            return Ok(None);
        };

        let members = &open[..due.members];
        let range = SealedRange {
            start: members[0].index,
            end: members[due.members - 1].index,
        };
        let mut record = RollupRecord::seal(
            tier,
            next_index,
            prior_hash,
            range,
            members.iter().map(|m| m.hash).collect(),
            self.clock.now_ms(),
        )?;

        info!(
            %tier,
            index = record.index,
            start = range.start,
            end = range.end,
            trigger = ?due.trigger,
            "Sealing rollup window"
        );

        // 3. Rollups collect their own quorum. A miss propagates and the
        //    window stays open; the retry re-seals the identical range.
        let signatures = self.consensus.collect(tier, record.hash, record.index).await?;
        record.signatures = signatures;
        record.state = PageState::Finalized;

        // 4. Commit and mark the constituents.
        self.commit_rollup(&record, lower)?;

        self.bus
            .publish(LedgerEvent::RollupSealed {
                tier,
                index: record.index,
                hash: record.hash,
                range,
            })
            .await;
        Ok(Some(record))
    }

    fn validate_chain(&self) -> Result<ChainValidationReport, LedgerFault> {
        let stores = self.stores.read();
        let mut checked_pages = 0u64;
        let mut checked_rollups = 0u64;

        let pages = stores.pages.all()?;
        let mut prior = ZERO_HASH;
        for (i, page) in pages.iter().enumerate() {
            if let Err(fault) = self.check_page(i as u64, &prior, page) {
                warn!(index = page.index, %fault, "Chain validation found a divergence");
                return Ok(ChainValidationReport::diverged(
                    checked_pages,
                    checked_rollups,
                    Divergence { tier: Tier::Page, index: page.index, fault },
                ));
            }
            prior = page.hash;
            checked_pages += 1;
        }

        for tier in Tier::ROLLUPS {
            let records = stores.rollups.records(tier)?;
            let mut prior = ZERO_HASH;
            let mut next_start = 0u64;
            for (i, record) in records.iter().enumerate() {
                match self.check_rollup(&stores, i as u64, &prior, next_start, record) {
                    Ok(()) => {}
                    Err(LedgerFault::Integrity(fault)) => {
                        warn!(%tier, index = record.index, %fault, "Chain validation found a divergence");
                        return Ok(ChainValidationReport::diverged(
                            checked_pages,
                            checked_rollups,
                            Divergence { tier, index: record.index, fault },
                        ));
                    }
                    Err(other) => return Err(other),
                }
                prior = record.hash;
                next_start = record.range.end + 1;
                checked_rollups += 1;
            }
        }

        debug!(checked_pages, checked_rollups, "Chain validation clean");
        Ok(ChainValidationReport::clean(checked_pages, checked_rollups))
    }

    fn read_history(&self, filter: &HistoryFilter) -> Result<Vec<Page>, LedgerFault> {
        let stores = self.stores.read();
        Ok(stores
            .pages
            .all()?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect())
    }

    fn tip(&self) -> Result<ChainTip, LedgerFault> {
        Ok(Self::tip_of(&self.stores.read())?)
    }

    fn page_at(&self, index: u64) -> Result<Option<Page>, LedgerFault> {
        Ok(self.stores.read().pages.page_at(index)?)
    }

    fn pages_in(&self, start: u64, end: u64) -> Result<Vec<Page>, LedgerFault> {
        Ok(self.stores.read().pages.pages_in(start, end)?)
    }

    fn rollup_records(&self, tier: Tier) -> Result<Vec<RollupRecord>, LedgerFault> {
        Ok(self.stores.read().rollups.records(tier)?)
    }

    fn list_pending(&self) -> Vec<Page> {
        self.pending.lock().values().cloned().collect()
    }

    async fn retry_pending(&self, hash: &Hash) -> Result<AppendOutcome, LedgerFault> {
        let parked = self.pending.lock().remove(hash);
        let Some(page) = parked else {
            return Ok(AppendOutcome::Rejected {
                reason: format!("no pending candidate {}", short_hash(hash)),
            });
        };
        info!(
            hash = %short_hash(hash),
            action = %page.action,
            "Retrying parked candidate"
        );
        // Content is reused; index, prior-hash and hash are rebuilt at the
        // current tip inside submit.
        self.submit(&page.action, page.payload.clone(), &page.submitter).await
    }

    fn accept_external(&self, block: FinalizedBlock) -> Result<AcceptOutcome, LedgerFault> {
        match block {
            FinalizedBlock::Page(page) => self.accept_external_page(page),
            FinalizedBlock::Rollup(record) => self.accept_external_rollup(record),
        }
    }

    fn replace_suffix(
        &self,
        from_index: u64,
        replacement: Vec<Page>,
    ) -> Result<Vec<Page>, LedgerFault> {
        if replacement.is_empty() {
            return Err(IntegrityError::WrongState {
                state: "empty replacement".into(),
                required: "non-empty winning suffix".into(),
            }
            .into());
        }

        let mut stores = self.stores.write();
        let len = stores.pages.len();
        if from_index >= len {
            return Err(IntegrityError::SequenceGap {
                tier: Tier::Page,
                expected: len.saturating_sub(1),
                found: from_index,
            }
            .into());
        }

        // Rollup-sealed history is immutable; fork resolution may only
        // touch the unsealed suffix.
        for page in stores.pages.pages_in(from_index, len - 1)? {
            if page.state == PageState::RolledUp {
                return Err(IntegrityError::WrongState {
                    state: format!("{:?}", page.state),
                    required: format!("{:?}", PageState::Finalized),
                }
                .into());
            }
        }

        // The replacement must anchor on the page right before the fork
        // point and hold up to the same scrutiny as any external block.
        let anchor = if from_index == 0 {
            ZERO_HASH
        } else {
            stores
                .pages
                .page_at(from_index - 1)?
                .ok_or_else(|| {
                    StorageError::Decode(format!("page {} missing below tip", from_index - 1))
                })?
                .hash
        };
        let mut prior = anchor;
        for (offset, page) in replacement.iter().enumerate() {
            let expected = from_index + offset as u64;
            chain::verify_page_structure(expected, &prior, page)?;
            if page.index > 0 {
                self.check_endorsements(Tier::Page, page.index, &page.hash, &page.signatures)?;
            }
            prior = page.hash;
        }

        let quarantined = stores.pages.truncate_from(from_index)?;
        for page in replacement {
            let mut page = page;
            page.state = PageState::Finalized;
            stores.pages.append(page)?;
        }
        warn!(
            from_index,
            quarantined = quarantined.len(),
            "Fork resolved; local suffix replaced and quarantined"
        );
        Ok(quarantined)
    }

    async fn install_genesis(&self, payload: Value) -> Result<Page, LedgerFault> {
        validate_payload(&payload, self.config.max_payload_bytes)?;

        let page = {
            let mut stores = self.stores.write();
            if !stores.pages.is_empty() {
                return Err(IntegrityError::WrongState {
                    state: "populated chain".into(),
                    required: "empty chain".into(),
                }
                .into());
            }
            let mut page = Page::draft(
                0,
                ZERO_HASH,
                GENESIS_ACTION,
                payload,
                GENESIS_SUBMITTER,
                self.clock.now_ms(),
            )?;
            page.state = PageState::Finalized;
            stores.pages.append(page.clone())?;
            page
        };

        info!(hash = %short_hash(&page.hash), "Genesis Page installed");
        self.bus
            .publish(LedgerEvent::GenesisInstalled { hash: page.hash, timestamp: page.timestamp })
            .await;
        Ok(page)
    }
}
