//! JSON bodies of the peer HTTP surface.
//!
//! Served by [`crate::http`] and consumed by
//! [`crate::adapters::HttpPeerTransport`], so both ends share one set of
//! shapes. Hashes travel as lowercase hex strings.

use serde::{Deserialize, Serialize};
use shared_types::FinalizedBlock;

/// Request header carrying the client-generated correlation id, so one
/// exchange can be matched across both nodes' logs.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// `GET /health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthBody {
    /// Always `"ok"` when the node answers.
    pub status: String,
    /// Number of Pages on the chain.
    pub height: u64,
    /// Hex hash of the newest Page, or the zero hash on an empty chain.
    pub tip_hash: String,
}

/// `GET /chain/info` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfoBody {
    /// Number of Pages on the chain.
    pub height: u64,
    /// Hex hash of the newest Page.
    pub tip_hash: String,
    /// Validators currently eligible to sign.
    pub active_validators: usize,
}

/// `POST /block` request: one finalized block pushed by a peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEnvelope {
    /// Advertised address of the sending node.
    pub from: String,
    /// The block itself.
    pub block: FinalizedBlock,
}

/// One entry of the `GET /peers` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSummary {
    /// Peer address.
    pub addr: String,
    /// Whether the last heartbeat succeeded.
    pub healthy: bool,
    /// Chain height the peer last reported.
    pub height: u64,
    /// Tip hash the peer last reported, hex.
    pub tip_hash: String,
    /// When the peer last answered, unix-ms.
    pub last_seen_ms: u64,
}

/// Error payload returned with non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub error: String,
}
