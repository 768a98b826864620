//! Bridges into the consensus subsystem.

use async_trait::async_trait;
use cl_01_signer::SignerApi;
use cl_03_ledger::ConsensusPort;
use cl_04_consensus::{BlockSigner, ConsensusApi};
use cl_05_sync::BlockVerifier;
use shared_types::{
    BlockSignature, ConsensusError, FinalizedBlock, Hash, LedgerFault, Tier, ValidatorId,
};
use std::sync::Arc;

/// The ledger's signature source: one collection round per candidate.
pub struct QuorumCollector {
    consensus: Arc<dyn ConsensusApi>,
}

impl QuorumCollector {
    pub fn new(consensus: Arc<dyn ConsensusApi>) -> Self {
        Self { consensus }
    }
}

#[async_trait]
impl ConsensusPort for QuorumCollector {
    async fn collect(
        &self,
        tier: Tier,
        block_hash: Hash,
        index: u64,
    ) -> Result<Vec<BlockSignature>, ConsensusError> {
        self.consensus.collect(tier, block_hash, index).await
    }
}

/// The synchronizer's endorsement check, backed by the same consensus
/// service that collects live quorums.
pub struct ConsensusVerifier {
    consensus: Arc<dyn ConsensusApi>,
}

impl ConsensusVerifier {
    pub fn new(consensus: Arc<dyn ConsensusApi>) -> Self {
        Self { consensus }
    }
}

impl BlockVerifier for ConsensusVerifier {
    fn verify(&self, block: &FinalizedBlock) -> Result<usize, LedgerFault> {
        self.consensus.verify_finalized(block)
    }
}

/// One custodied signer, presented to the consensus hub.
pub struct CustodySigner {
    signer: Arc<dyn SignerApi>,
}

impl CustodySigner {
    pub fn new(signer: Arc<dyn SignerApi>) -> Self {
        Self { signer }
    }
}

impl BlockSigner for CustodySigner {
    fn identity(&self) -> &ValidatorId {
        self.signer.validator_id()
    }

    fn sign_block(&self, tier: Tier, block_hash: &Hash) -> BlockSignature {
        self.signer.sign_block(tier, block_hash)
    }
}
