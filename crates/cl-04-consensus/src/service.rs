//! # Consensus Coordination Service
//!
//! Application service layer that implements the `ConsensusApi` trait.
//!
//! ## Architecture
//!
//! This is the hexagonal "application service" that:
//! - Implements the inbound port (`ConsensusApi`)
//! - Uses the outbound ports (`ValidatorSetProvider`, `ValidatorSignerPort`)
//! - Delegates tallying and signature verification to the domain layer
//!
//! ## Concurrency
//!
//! Each collection round owns a `JoinSet` of signing requests, one per
//! snapshotted validator. Responses are tallied as they land and the round
//! resolves at quorum without waiting for the rest; stragglers that have
//! already completed by then are kept, the rest are aborted. The round as
//! a whole runs against a deadline so a silent validator set can never
//! wedge the caller.

use crate::domain::collection::{signature_verifies, CollectionTally, TallyVerdict};
use crate::domain::config::ConsensusConfig;
use crate::domain::errors::SignRequestError;
use crate::ports::inbound::ConsensusApi;
use crate::ports::outbound::{ValidatorSetProvider, ValidatorSignerPort};
use async_trait::async_trait;
use shared_types::{
    quorum, short_hash, BlockSignature, ConsensusError, FinalizedBlock, Hash, IntegrityError,
    LedgerFault, Tier,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Consensus Coordinator bound to one validator set and one signer port.
pub struct ConsensusService {
    config: ConsensusConfig,
    validators: Arc<dyn ValidatorSetProvider>,
    signers: Arc<dyn ValidatorSignerPort>,
}

impl ConsensusService {
    /// Create a coordinator. The configured posture is logged once here so
    /// an operator can read a node's trust settings off its startup log.
    pub fn new(
        config: ConsensusConfig,
        validators: Arc<dyn ValidatorSetProvider>,
        signers: Arc<dyn ValidatorSignerPort>,
    ) -> Self {
        info!(
            window_ms = config.collection_window_ms,
            policy = %config.signing_policy,
            "Consensus coordinator initialized"
        );
        Self { config, validators, signers }
    }

    /// Feed one joined signing task into the tally.
    fn absorb(
        &self,
        tally: &mut CollectionTally,
        joined: Result<Result<BlockSignature, SignRequestError>, JoinError>,
    ) {
        match joined {
            Ok(Ok(sig)) => {
                let signer = sig.validator.clone();
                let verdict = tally.offer(sig, self.validators.is_active(&signer));
                match verdict {
                    TallyVerdict::Counted => debug!(validator = %signer, "Signature counted"),
                    other => warn!(validator = %signer, verdict = ?other, "Signature discarded"),
                }
            }
            Ok(Err(err)) => debug!(%err, "Validator contributed no signature"),
            Err(err) => warn!(%err, "Signing request task failed"),
        }
    }

    /// Count the distinct valid endorsements on a stored block and compare
    /// them to the quorum of the block's own finalization era.
    fn check_quorum(
        &self,
        tier: Tier,
        index: u64,
        hash: &Hash,
        signatures: &[BlockSignature],
    ) -> Result<usize, IntegrityError> {
        // Finalization time is the latest signature; the validator set as
        // of that moment decides how many endorsements were required.
        let finalized_at = signatures.iter().map(|s| s.timestamp).max().unwrap_or(0);
        let need = quorum(self.validators.active_count_at(finalized_at));

        let mut counted: BTreeSet<&shared_types::ValidatorId> = BTreeSet::new();
        for sig in signatures {
            if sig.tier != tier || sig.block_hash != *hash {
                continue;
            }
            if !self.validators.was_active_at(&sig.validator, sig.timestamp) {
                continue;
            }
            let Some(key) = self.validators.public_key_of(&sig.validator) else {
                continue;
            };
            if !signature_verifies(tier, hash, &key, sig) {
                continue;
            }
            counted.insert(&sig.validator);
        }

        let got = counted.len();
        if got < need {
            return Err(IntegrityError::InsufficientQuorum { tier, index, got, need });
        }
        Ok(got)
    }
}

#[async_trait]
impl ConsensusApi for ConsensusService {
    async fn collect(
        &self,
        tier: Tier,
        block_hash: Hash,
        index: u64,
    ) -> Result<Vec<BlockSignature>, ConsensusError> {
        // 1. Snapshot the eligible set; quorum derives from its size
        let snapshot = self.validators.active_validators();
        if snapshot.is_empty() {
            return Err(ConsensusError::NoEligibleValidators);
        }
        let mut tally = CollectionTally::new(tier, block_hash, &snapshot);
        let need = tally.required();
        debug!(
            %tier,
            index,
            block = %short_hash(&block_hash),
            signers = snapshot.len(),
            need,
            "Collection round opened"
        );

        // 2. Fan one signing request out per snapshot member
        let mut requests: JoinSet<Result<BlockSignature, SignRequestError>> = JoinSet::new();
        for signer in &snapshot {
            let port = Arc::clone(&self.signers);
            let id = signer.id.clone();
            requests.spawn(async move { port.request_signature(&id, tier, &block_hash).await });
        }

        // 3. Tally responses until quorum, exhaustion, or the deadline
        let deadline = Instant::now() + Duration::from_millis(self.config.collection_window_ms);
        while !tally.quorate() {
            match tokio::time::timeout_at(deadline, requests.join_next()).await {
                Err(_) => {
                    requests.abort_all();
                    warn!(%tier, index, got = tally.counted(), need, "Collection window elapsed");
                    return Err(ConsensusError::WindowElapsed {
                        window_ms: self.config.collection_window_ms,
                        got: tally.counted(),
                        need,
                    });
                }
                Ok(None) => break,
                Ok(Some(joined)) => self.absorb(&mut tally, joined),
            }
        }

        if !tally.quorate() {
            warn!(%tier, index, got = tally.counted(), need, "All validators answered short of quorum");
            return Err(ConsensusError::QuorumNotReached {
                tier,
                index,
                got: tally.counted(),
                need,
            });
        }

        // 4. Keep stragglers that already finished; abandon the rest
        while let Some(done) = requests.try_join_next() {
            self.absorb(&mut tally, done);
        }
        requests.abort_all();

        let signatures = tally.into_signatures();
        info!(
            %tier,
            index,
            block = %short_hash(&block_hash),
            signatures = signatures.len(),
            need,
            "Quorum reached"
        );
        Ok(signatures)
    }

    fn verify_finalized(&self, block: &FinalizedBlock) -> Result<usize, LedgerFault> {
        match block {
            FinalizedBlock::Page(page) => {
                if page.compute_hash()? != page.hash {
                    return Err(
                        IntegrityError::HashMismatch { tier: Tier::Page, index: page.index }.into()
                    );
                }
                if page.index == 0 {
                    // Genesis predates any signer set; its payload is the
                    // trust root later blocks are judged against.
                    return Ok(0);
                }
                self.check_quorum(Tier::Page, page.index, &page.hash, &page.signatures)
                    .map_err(Into::into)
            }
            FinalizedBlock::Rollup(record) => {
                if record.compute_hash()? != record.hash {
                    return Err(IntegrityError::HashMismatch {
                        tier: record.tier,
                        index: record.index,
                    }
                    .into());
                }
                self.check_quorum(record.tier, record.index, &record.hash, &record.signatures)
                    .map_err(Into::into)
            }
        }
    }
}
