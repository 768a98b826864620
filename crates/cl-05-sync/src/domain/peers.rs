//! Peer table: who we know, how healthy they look, what height they claim.
//!
//! A peer is a lookup and relationship entry only. It never owns ledger
//! data; it mirrors what the remote node reported about itself.

use serde::{Deserialize, Serialize};
use shared_types::{Hash, ZERO_HASH};
use std::collections::BTreeMap;

/// What we know about one remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Reachable address, e.g. `"127.0.0.1:9301"`.
    pub addr: String,

    /// False after a failed contact, true again after any success.
    pub healthy: bool,

    /// Failed contacts since the last success.
    pub consecutive_failures: u32,

    /// Unix-ms of the most recent contact, in either direction.
    pub last_seen_ms: u64,

    /// Chain height the peer last reported.
    pub height: u64,

    /// Tip hash the peer last reported. `ZERO_HASH` until first reported.
    pub tip: Hash,
}

impl PeerRecord {
    fn first_contact(addr: &str, now_ms: u64) -> Self {
        Self {
            addr: addr.to_string(),
            healthy: true,
            consecutive_failures: 0,
            last_seen_ms: now_ms,
            height: 0,
            tip: ZERO_HASH,
        }
    }
}

/// How one success or failure changed a peer's standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthMark {
    /// Standing unchanged.
    Unchanged,
    /// Crossed from unhealthy back to healthy.
    BecameHealthy,
    /// Crossed from healthy to unhealthy.
    BecameUnhealthy,
    /// Hit the failure threshold and left the table.
    Pruned,
}

/// Bounded table of known peers, keyed by address.
///
/// The node's own address is rejected on insert, so a gossiped list that
/// includes us cannot loop back into the table. A new peer starts healthy;
/// it earns removal through consecutive failures, never through age.
#[derive(Debug)]
pub struct PeerTable {
    self_addr: String,
    capacity: usize,
    failure_threshold: u32,
    peers: BTreeMap<String, PeerRecord>,
}

impl PeerTable {
    /// An empty table. A `failure_threshold` of zero is treated as one.
    pub fn new(self_addr: impl Into<String>, capacity: usize, failure_threshold: u32) -> Self {
        Self {
            self_addr: self_addr.into(),
            capacity,
            failure_threshold: failure_threshold.max(1),
            peers: BTreeMap::new(),
        }
    }

    /// Record contact with `addr`, inserting it if new. Returns true only
    /// for a genuinely new peer. Self, empty addresses, and inserts past
    /// the capacity cap are refused.
    pub fn upsert(&mut self, addr: &str, now_ms: u64) -> bool {
        if addr.is_empty() || addr == self.self_addr {
            return false;
        }
        if let Some(record) = self.peers.get_mut(addr) {
            record.last_seen_ms = record.last_seen_ms.max(now_ms);
            return false;
        }
        if self.peers.len() >= self.capacity {
            return false;
        }
        self.peers
            .insert(addr.to_string(), PeerRecord::first_contact(addr, now_ms));
        true
    }

    /// Merge a gossiped address list. Returns how many peers were new.
    pub fn merge(&mut self, addrs: impl IntoIterator<Item = String>, now_ms: u64) -> usize {
        addrs.into_iter().filter(|a| self.upsert(a, now_ms)).count()
    }

    /// Record a successful contact that carried no chain information.
    pub fn mark_alive(&mut self, addr: &str, now_ms: u64) -> HealthMark {
        let Some(record) = self.peers.get_mut(addr) else {
            return HealthMark::Unchanged;
        };
        record.consecutive_failures = 0;
        record.last_seen_ms = record.last_seen_ms.max(now_ms);
        if record.healthy {
            HealthMark::Unchanged
        } else {
            record.healthy = true;
            HealthMark::BecameHealthy
        }
    }

    /// Record a successful contact that also reported the peer's chain
    /// position.
    pub fn mark_success(&mut self, addr: &str, now_ms: u64, height: u64, tip: Hash) -> HealthMark {
        let mark = self.mark_alive(addr, now_ms);
        if let Some(record) = self.peers.get_mut(addr) {
            record.height = height;
            record.tip = tip;
        }
        mark
    }

    /// Record a failed contact. At the failure threshold the peer is
    /// removed from the table entirely.
    pub fn mark_failure(&mut self, addr: &str) -> HealthMark {
        let Some(record) = self.peers.get_mut(addr) else {
            return HealthMark::Unchanged;
        };
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        if record.consecutive_failures >= self.failure_threshold {
            self.peers.remove(addr);
            return HealthMark::Pruned;
        }
        if record.healthy {
            record.healthy = false;
            HealthMark::BecameUnhealthy
        } else {
            HealthMark::Unchanged
        }
    }

    /// Peers currently considered reachable.
    pub fn healthy_peers(&self) -> Vec<PeerRecord> {
        self.peers.values().filter(|p| p.healthy).cloned().collect()
    }

    /// Every tracked record, healthy or not.
    pub fn records(&self) -> Vec<PeerRecord> {
        self.peers.values().cloned().collect()
    }

    /// Every tracked address.
    pub fn known_addrs(&self) -> Vec<String> {
        self.peers.keys().cloned().collect()
    }

    /// The record for `addr`, if tracked.
    pub fn get(&self, addr: &str) -> Option<&PeerRecord> {
        self.peers.get(addr)
    }

    /// Whether `addr` is tracked.
    pub fn contains(&self, addr: &str) -> bool {
        self.peers.contains_key(addr)
    }

    /// Number of tracked peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
