//! Synchronizer configuration.

use serde::{Deserialize, Serialize};

/// Tuning for the peer synchronizer.
///
/// Every field has a default, so an empty config table yields a working
/// standalone node; a deployment only overrides what it must.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Address this node publishes to peers. The peer table never stores
    /// it, so gossip loops cannot re-add self.
    pub self_addr: String,

    /// Addresses contacted at startup, before gossip finds anyone else.
    pub bootstrap_peers: Vec<String>,

    /// Hard cap on the peer table size.
    pub max_peers: usize,

    /// Consecutive failed contacts before a peer is dropped from the table.
    pub failure_threshold: u32,

    /// Delivery attempts per peer per broadcast, the first included.
    pub retry_max: u32,

    /// Backoff before the second delivery attempt, in milliseconds. It
    /// doubles on each further attempt.
    pub retry_base_ms: u64,

    /// Pages requested per fetch during catch-up.
    pub fetch_batch: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            self_addr: String::new(),
            bootstrap_peers: Vec::new(),
            max_peers: 64,
            failure_threshold: 3,
            retry_max: 3,
            retry_base_ms: 250,
            fetch_batch: 256,
        }
    }
}
