//! # Error Taxonomy
//!
//! Five operational error families plus a storage family, and the
//! [`LedgerFault`] umbrella that subsystem boundaries return.
//!
//! The split is by *caller remedy*, not by module: a [`ValidationError`]
//! means fix the input, an [`AuthorizationError`] means fix the signer set,
//! a [`ConsensusError`] means retry or re-quorum, an [`IntegrityError`]
//! means stop trusting local state, and a [`NetworkError`] means the peer
//! or transport misbehaved.

use crate::entities::{Tier, ValidatorId, ValidatorRole};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input was malformed before any ledger state was consulted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("payload must be a JSON object, got {got}")]
    PayloadNotObject { got: &'static str },

    #[error("payload exceeds maximum size: {size} > {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("floating-point numbers are not canonicalizable")]
    NonCanonicalNumber,

    #[error("action label is empty or malformed: {0:?}")]
    BadActionLabel(String),

    #[error("submitter identity is empty")]
    EmptySubmitter,

    #[error("canonical serialization failed: {0}")]
    Serialization(String),

    #[error("public key is malformed: {0}")]
    MalformedKey(String),

    #[error("signature encoding is malformed: {0}")]
    MalformedSignature(String),

    #[error("term bounds are inverted: start {start} > end {end}")]
    InvertedTerm { start: u64, end: u64 },
}

/// The actor exists but is not allowed to do what was asked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthorizationError {
    #[error("validator {0} is not registered")]
    UnknownValidator(ValidatorId),

    #[error("validator {0} is inactive")]
    InactiveValidator(ValidatorId),

    #[error("validator {id} term expired at {term_end}, signature at {at}")]
    TermExpired { id: ValidatorId, term_end: u64, at: u64 },

    #[error("validator {id} term starts at {term_start}, signature at {at}")]
    TermNotStarted { id: ValidatorId, term_start: u64, at: u64 },

    #[error("role {role} is not eligible to sign")]
    IneligibleRole { role: ValidatorRole },

    #[error("role {role} can never hold signing eligibility")]
    RoleNeverEligible { role: ValidatorRole },

    #[error("validator {0} already registered")]
    DuplicateValidator(ValidatorId),

    #[error("validator {0} is already active")]
    AlreadyActive(ValidatorId),
}

/// Agreement could not be reached or demonstrated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsensusError {
    #[error("quorum not reached for {tier} block {index}: {got}/{need} signatures")]
    QuorumNotReached { tier: Tier, index: u64, got: usize, need: usize },

    #[error("no eligible validators are active")]
    NoEligibleValidators,

    #[error("duplicate signature from {0} discarded")]
    DuplicateSignature(ValidatorId),

    #[error("signature from {validator} does not verify")]
    BadSignature { validator: ValidatorId },

    #[error("signature endorses hash {got} but block hash is {want}")]
    WrongBlockHash { got: String, want: String },

    #[error("collection window of {window_ms}ms elapsed with {got}/{need} signatures")]
    WindowElapsed { window_ms: u64, got: usize, need: usize },
}

/// Local or received state contradicts the chain's own rules.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum IntegrityError {
    #[error("{tier} record {index}: stored hash does not match recomputed hash")]
    HashMismatch { tier: Tier, index: u64 },

    #[error("{tier} record {index}: prior_hash does not match predecessor")]
    BrokenLink { tier: Tier, index: u64 },

    #[error("{tier} sequence gap: expected index {expected}, found {found}")]
    SequenceGap { tier: Tier, expected: u64, found: u64 },

    #[error("{tier} record {index}: rollup range {start}..={end} is malformed")]
    BadRollupRange { tier: Tier, index: u64, start: u64, end: u64 },

    #[error("{tier} record {index}: member hash set does not match sealed records")]
    MemberHashMismatch { tier: Tier, index: u64 },

    #[error("chain tip moved while candidate was collecting signatures")]
    StaleCandidate,

    #[error("{tier} record {index}: finalized block carries {got}/{need} valid signatures")]
    InsufficientQuorum { tier: Tier, index: u64, got: usize, need: usize },

    #[error("record is in state {state} but operation requires {required}")]
    WrongState { state: String, required: String },

    #[error("divergent history at {tier} index {index}: local {local}, remote {remote}")]
    Divergence { tier: Tier, index: u64, local: String, remote: String },
}

/// A peer or the transport between peers failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    #[error("peer {0} is unreachable")]
    PeerUnreachable(String),

    #[error("peer {0} is not in the peer table")]
    UnknownPeer(String),

    #[error("request to {peer} timed out after {ms}ms")]
    Timeout { peer: String, ms: u64 },

    #[error("peer {peer} sent a malformed response: {detail}")]
    MalformedResponse { peer: String, detail: String },

    #[error("broadcast exhausted {attempts} attempts for block {block}")]
    BroadcastExhausted { attempts: u32, block: String },

    #[error("peer {peer} rejected block: {reason}")]
    Rejected { peer: String, reason: String },
}

/// Durable storage failed beneath the ledger.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding failed: {0}")]
    Encode(String),

    #[error("record decoding failed: {0}")]
    Decode(String),

    #[error("checksum mismatch in {file} at offset {offset}")]
    ChecksumMismatch { file: String, offset: u64 },

    #[error("store is locked by another process")]
    Locked,
}

/// Umbrella error crossing subsystem boundaries.
///
/// Converts from every family with `?`; services surface this type so a
/// caller can match on which family fired without knowing the internals.
#[derive(Debug, Error)]
pub enum LedgerFault {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LedgerFault {
    /// Short stable label for log fields and HTTP error bodies.
    pub fn family(&self) -> &'static str {
        match self {
            LedgerFault::Validation(_) => "validation",
            LedgerFault::Authorization(_) => "authorization",
            LedgerFault::Consensus(_) => "consensus",
            LedgerFault::Integrity(_) => "integrity",
            LedgerFault::Network(_) => "network",
            LedgerFault::Storage(_) => "storage",
        }
    }
}
