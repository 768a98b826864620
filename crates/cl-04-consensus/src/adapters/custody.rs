//! In-process signer custody.
//!
//! `LocalSignerHub` resolves signing requests against the custody handles
//! this process holds. A single-validator node holds exactly one; test
//! and demo deployments may hold a whole roster. The hub applies the
//! configured signing policy before any key is touched, so an operator
//! running under `review` never issues an unattended signature.

use crate::domain::config::SigningPolicy;
use crate::domain::errors::SignRequestError;
use crate::ports::outbound::{BlockSigner, ReviewGate, ValidatorSignerPort};
use async_trait::async_trait;
use shared_types::{short_hash, BlockSignature, Hash, Tier, ValidatorId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// [`ValidatorSignerPort`] over locally held custody.
pub struct LocalSignerHub {
    policy: SigningPolicy,
    gate: Arc<dyn ReviewGate>,
    signers: BTreeMap<ValidatorId, Arc<dyn BlockSigner>>,
}

impl LocalSignerHub {
    /// Create an empty hub with the given posture.
    pub fn new(policy: SigningPolicy, gate: Arc<dyn ReviewGate>) -> Self {
        info!(%policy, "Local signer custody initialized");
        Self { policy, gate, signers: BTreeMap::new() }
    }

    /// Take custody of one signer, keyed by its identity.
    pub fn add_signer(&mut self, signer: Arc<dyn BlockSigner>) {
        self.signers.insert(signer.identity().clone(), signer);
    }

    /// Whether this process can sign as `id`.
    pub fn holds(&self, id: &ValidatorId) -> bool {
        self.signers.contains_key(id)
    }
}

#[async_trait]
impl ValidatorSignerPort for LocalSignerHub {
    async fn request_signature(
        &self,
        validator: &ValidatorId,
        tier: Tier,
        block_hash: &Hash,
    ) -> Result<BlockSignature, SignRequestError> {
        let Some(signer) = self.signers.get(validator) else {
            return Err(SignRequestError::NoCustody(validator.clone()));
        };

        if self.policy == SigningPolicy::Review
            && !self.gate.approve(validator, tier, block_hash).await
        {
            info!(
                validator = %validator,
                %tier,
                block = %short_hash(block_hash),
                "Review declined signing request"
            );
            return Err(SignRequestError::ReviewDeclined(validator.clone()));
        }

        let signature = signer.sign_block(tier, block_hash);
        info!(
            validator = %validator,
            %tier,
            block = %short_hash(block_hash),
            policy = %self.policy,
            "Signature issued"
        );
        Ok(signature)
    }
}

/// A review gate with a fixed answer.
///
/// `declining` is the conservative wiring for headless nodes kept on
/// `review` policy: the node abstains from endorsing and quorum must come
/// from validators whose operators chose otherwise.
pub struct StaticReviewGate {
    decision: bool,
}

impl StaticReviewGate {
    /// Approve every request.
    pub fn approving() -> Self {
        Self { decision: true }
    }

    /// Decline every request.
    pub fn declining() -> Self {
        Self { decision: false }
    }
}

#[async_trait]
impl ReviewGate for StaticReviewGate {
    async fn approve(&self, _validator: &ValidatorId, _tier: Tier, _block_hash: &Hash) -> bool {
        self.decision
    }
}
