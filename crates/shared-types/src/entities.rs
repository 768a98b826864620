//! # Core Domain Entities
//!
//! Defines the ledger records and validator vocabulary shared by every
//! subsystem.
//!
//! ## Clusters
//!
//! - **Ledger**: `Page`, `RollupRecord`, `SealedRange`, `Tier`, `PageState`
//! - **Consensus**: `BlockSignature`, `signing_message`, `ChainTip`
//! - **Validators**: `ValidatorId`, `ValidatorRole`, `ValidatorStatus`
//!
//! Hash computations live on the record types themselves so that the ledger
//! (building), consensus (signing), and sync (re-validating) subsystems can
//! never drift apart on what a record's hash means.

use crate::canonical::to_canonical_bytes;
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type SignatureBytes = [u8; 64];

/// A 32-byte Ed25519 public key.
pub type PublicKeyBytes = [u8; 32];

/// The all-zero hash used as the prior-hash of genesis records.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Domain-separation prefix for block signing messages.
pub const SIGNING_DOMAIN: &[u8] = b"cl.block.v1";

/// Short hex form of a hash for log output.
pub fn short_hash(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}

/// SHA-256 of `prior ‖ content`, the chain-hash primitive for every tier.
pub fn chain_hash(prior: &Hash, content: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(prior);
    hasher.update(content);
    hasher.finalize().into()
}

/// The exact byte message a validator signs to endorse a block.
///
/// Domain-separated so a signature over a Page hash can never be replayed
/// as an endorsement of a rollup (or of anything outside this protocol).
pub fn signing_message(tier: Tier, block_hash: &Hash) -> Vec<u8> {
    let mut msg = Vec::with_capacity(SIGNING_DOMAIN.len() + 1 + block_hash.len());
    msg.extend_from_slice(SIGNING_DOMAIN);
    msg.push(tier.as_byte());
    msg.extend_from_slice(block_hash);
    msg
}

/// Simple-majority quorum for `active` validators: `floor(n / 2) + 1`.
///
/// 5 validators need 3 signatures, 7 need 4, 1 needs 1. Every subsystem
/// that checks endorsements uses this one definition.
pub fn quorum(active: usize) -> usize {
    active / 2 + 1
}

// =============================================================================
// VALIDATOR VOCABULARY
// =============================================================================

/// Unique identity of a registered validator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidatorId(pub String);

impl ValidatorId {
    /// Construct from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ValidatorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Closed set of roles a registrant may hold.
///
/// Only elected or appointed offices are ever eligible to co-sign blocks;
/// `Member` and `Observer` exist so the registry can describe everyone it
/// has been asked about, but no eligibility policy may ever include them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorRole {
    /// Elected chair of the assembly.
    Chair,
    /// Elected vice chair.
    ViceChair,
    /// Appointed secretary.
    Secretary,
    /// Appointed treasurer.
    Treasurer,
    /// Elected council member.
    CouncilMember,
    /// Ordinary member. Never eligible to sign.
    Member,
    /// External observer. Never eligible to sign.
    Observer,
}

impl ValidatorRole {
    /// Whether this role is an elected/appointed office at all.
    ///
    /// This is the outer bound on any eligibility policy: a policy may
    /// narrow the office set, never widen it past this predicate.
    pub fn is_office(self) -> bool {
        !matches!(self, ValidatorRole::Member | ValidatorRole::Observer)
    }

    /// All office roles, in declaration order.
    pub const OFFICES: [ValidatorRole; 5] = [
        ValidatorRole::Chair,
        ValidatorRole::ViceChair,
        ValidatorRole::Secretary,
        ValidatorRole::Treasurer,
        ValidatorRole::CouncilMember,
    ];
}

impl std::fmt::Display for ValidatorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValidatorRole::Chair => "chair",
            ValidatorRole::ViceChair => "vice_chair",
            ValidatorRole::Secretary => "secretary",
            ValidatorRole::Treasurer => "treasurer",
            ValidatorRole::CouncilMember => "council_member",
            ValidatorRole::Member => "member",
            ValidatorRole::Observer => "observer",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of a validator. Records are never deleted; status
/// transitions are appended to the audit history instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    /// May sign, subject to term bounds.
    Active,
    /// May not sign. Reactivation is possible within the term.
    Inactive,
}

// =============================================================================
// TIERS AND STATES
// =============================================================================

/// Storage tier of a ledger record.
///
/// `Page` is the hot tier; each higher tier aggregates a contiguous, closed
/// range of the tier below it into one hash-linked record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Atomic action records.
    Page,
    /// Aggregates a closed range of Pages.
    Chapter,
    /// Aggregates a closed range of Chapters.
    Book,
    /// Aggregates a closed range of Books.
    Part,
    /// Aggregates a closed range of Parts.
    Series,
}

impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Tier; 5] = [Tier::Page, Tier::Chapter, Tier::Book, Tier::Part, Tier::Series];

    /// Rollup tiers only (everything above `Page`), lowest first.
    pub const ROLLUPS: [Tier; 4] = [Tier::Chapter, Tier::Book, Tier::Part, Tier::Series];

    /// The tier this tier aggregates, if any.
    pub fn lower(self) -> Option<Tier> {
        match self {
            Tier::Page => None,
            Tier::Chapter => Some(Tier::Page),
            Tier::Book => Some(Tier::Chapter),
            Tier::Part => Some(Tier::Book),
            Tier::Series => Some(Tier::Part),
        }
    }

    /// The tier that aggregates this tier, if any.
    pub fn higher(self) -> Option<Tier> {
        match self {
            Tier::Page => Some(Tier::Chapter),
            Tier::Chapter => Some(Tier::Book),
            Tier::Book => Some(Tier::Part),
            Tier::Part => Some(Tier::Series),
            Tier::Series => None,
        }
    }

    /// Stable single-byte tag used in signing messages.
    pub fn as_byte(self) -> u8 {
        match self {
            Tier::Page => 0,
            Tier::Chapter => 1,
            Tier::Book => 2,
            Tier::Part => 3,
            Tier::Series => 4,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::Page => "page",
            Tier::Chapter => "chapter",
            Tier::Book => "book",
            Tier::Part => "part",
            Tier::Series => "series",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a ledger record.
///
/// `Draft → PendingSignatures → Finalized → RolledUp`, terminal once rolled
/// up. Content is frozen from `Finalized` onward; only the storage tier of
/// the record changes after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    /// Candidate under construction; not yet offered for signatures.
    Draft,
    /// Signature collection in progress or stalled short of quorum.
    PendingSignatures,
    /// Quorum reached and committed; content immutable.
    Finalized,
    /// Absorbed into a higher-tier rollup. Terminal.
    RolledUp,
}

impl PageState {
    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: PageState) -> bool {
        matches!(
            (self, next),
            (PageState::Draft, PageState::PendingSignatures)
                | (PageState::PendingSignatures, PageState::Finalized)
                | (PageState::Finalized, PageState::RolledUp)
        )
    }
}

// =============================================================================
// SIGNATURES
// =============================================================================

/// One validator's endorsement of one block at one tier.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSignature {
    /// Identity of the signing validator.
    pub validator: ValidatorId,
    /// Hash of the endorsed block.
    pub block_hash: Hash,
    /// Tier of the endorsed block.
    pub tier: Tier,
    /// Unix-ms timestamp at which the signature was produced.
    pub timestamp: u64,
    /// Ed25519 signature over `signing_message(tier, block_hash)`.
    #[serde_as(as = "Bytes")]
    pub signature: SignatureBytes,
}

// =============================================================================
// LEDGER RECORDS
// =============================================================================

/// Atomic action record, the unit at the hot tier.
///
/// `hash` commits to `prior_hash` and the canonical bytes of the content
/// fields (`index`, `action`, `payload`, `submitter`, `timestamp`).
/// Signatures and state are bookkeeping, never hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Gap-free, monotonically increasing sequence index.
    pub index: u64,
    /// Hash of the preceding Page; `ZERO_HASH` for genesis.
    pub prior_hash: Hash,
    /// `chain_hash(prior_hash, canonical(content))`.
    pub hash: Hash,
    /// Action type label, e.g. `"entry.custom"` or `"validator.registered"`.
    pub action: String,
    /// Opaque caller payload. Must be a JSON object without floats.
    pub payload: serde_json::Value,
    /// Identity of the submitting party.
    pub submitter: String,
    /// Unix-ms timestamp at candidate creation.
    pub timestamp: u64,
    /// Validator endorsements collected for this Page.
    pub signatures: Vec<BlockSignature>,
    /// Lifecycle state.
    pub state: PageState,
}

/// The hashed content fields of a [`Page`], borrowed.
#[derive(Serialize)]
struct PageContent<'a> {
    index: u64,
    action: &'a str,
    payload: &'a serde_json::Value,
    submitter: &'a str,
    timestamp: u64,
}

impl Page {
    /// Build a draft Page and compute its hash against `prior_hash`.
    pub fn draft(
        index: u64,
        prior_hash: Hash,
        action: impl Into<String>,
        payload: serde_json::Value,
        submitter: impl Into<String>,
        timestamp: u64,
    ) -> Result<Self, ValidationError> {
        let mut page = Self {
            index,
            prior_hash,
            hash: ZERO_HASH,
            action: action.into(),
            payload,
            submitter: submitter.into(),
            timestamp,
            signatures: Vec::new(),
            state: PageState::Draft,
        };
        page.hash = page.compute_hash()?;
        Ok(page)
    }

    /// Recompute the hash from the current content fields.
    ///
    /// For an untampered Page this always equals `self.hash`.
    pub fn compute_hash(&self) -> Result<Hash, ValidationError> {
        let content = PageContent {
            index: self.index,
            action: &self.action,
            payload: &self.payload,
            submitter: &self.submitter,
            timestamp: self.timestamp,
        };
        let bytes = to_canonical_bytes(&content)?;
        Ok(chain_hash(&self.prior_hash, &bytes))
    }
}

/// Closed, inclusive range of lower-tier indexes sealed by a rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRange {
    /// First sealed lower-tier index.
    pub start: u64,
    /// Last sealed lower-tier index (inclusive).
    pub end: u64,
}

impl SealedRange {
    /// Number of records in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges are never empty; present for clippy symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `index` falls inside the range.
    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index <= self.end
    }
}

/// One rollup record at `Chapter` tier or above.
///
/// The hash is a pure function of the constituent lower-tier hashes plus
/// this record's own prior-hash; the timestamp is operational metadata and
/// deliberately excluded so that re-sealing the same closed range is
/// idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupRecord {
    /// Tier of this record (`Chapter` and above).
    pub tier: Tier,
    /// Gap-free, per-tier sequence index.
    pub index: u64,
    /// Hash of the preceding rollup at the same tier; `ZERO_HASH` first.
    pub prior_hash: Hash,
    /// `chain_hash(prior_hash, canonical{tier, index, range, member_hashes})`.
    pub hash: Hash,
    /// Closed lower-tier range this record seals.
    pub range: SealedRange,
    /// Hashes of the sealed lower-tier records, in ascending index order.
    pub member_hashes: Vec<Hash>,
    /// Unix-ms timestamp at sealing. Not part of the hash.
    pub timestamp: u64,
    /// Validator endorsements collected for this rollup.
    pub signatures: Vec<BlockSignature>,
    /// Lifecycle state.
    pub state: PageState,
}

/// The hashed content fields of a [`RollupRecord`], borrowed.
#[derive(Serialize)]
struct RollupContent<'a> {
    tier: Tier,
    index: u64,
    range: SealedRange,
    member_hashes: &'a [Hash],
}

impl RollupRecord {
    /// Build a pending rollup over `member_hashes` and compute its hash.
    pub fn seal(
        tier: Tier,
        index: u64,
        prior_hash: Hash,
        range: SealedRange,
        member_hashes: Vec<Hash>,
        timestamp: u64,
    ) -> Result<Self, ValidationError> {
        let mut record = Self {
            tier,
            index,
            prior_hash,
            hash: ZERO_HASH,
            range,
            member_hashes,
            timestamp,
            signatures: Vec::new(),
            state: PageState::PendingSignatures,
        };
        record.hash = record.compute_hash()?;
        Ok(record)
    }

    /// Recompute the hash from tier, index, range, and member hashes.
    pub fn compute_hash(&self) -> Result<Hash, ValidationError> {
        let content = RollupContent {
            tier: self.tier,
            index: self.index,
            range: self.range,
            member_hashes: &self.member_hashes,
        };
        let bytes = to_canonical_bytes(&content)?;
        Ok(chain_hash(&self.prior_hash, &bytes))
    }
}

/// A finalized block of either kind, as exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalizedBlock {
    /// A finalized hot-tier Page.
    Page(Page),
    /// A finalized rollup record.
    Rollup(RollupRecord),
}

impl FinalizedBlock {
    /// Tier of the wrapped record.
    pub fn tier(&self) -> Tier {
        match self {
            FinalizedBlock::Page(_) => Tier::Page,
            FinalizedBlock::Rollup(r) => r.tier,
        }
    }

    /// Hash of the wrapped record.
    pub fn hash(&self) -> Hash {
        match self {
            FinalizedBlock::Page(p) => p.hash,
            FinalizedBlock::Rollup(r) => r.hash,
        }
    }

    /// Sequence index of the wrapped record within its tier.
    pub fn index(&self) -> u64 {
        match self {
            FinalizedBlock::Page(p) => p.index,
            FinalizedBlock::Rollup(r) => r.index,
        }
    }
}

// =============================================================================
// CHAIN TIP
// =============================================================================

/// Height and tip hash of the hot tier.
///
/// `height` counts committed Pages, so the next index equals `height` and
/// an empty chain is `{height: 0, hash: ZERO_HASH}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    /// Number of committed Pages.
    pub height: u64,
    /// Hash of the last committed Page, or `ZERO_HASH` when empty.
    pub hash: Hash,
}

impl ChainTip {
    /// The empty-chain tip.
    pub fn empty() -> Self {
        Self { height: 0, hash: ZERO_HASH }
    }
}

impl Default for ChainTip {
    fn default() -> Self {
        Self::empty()
    }
}
