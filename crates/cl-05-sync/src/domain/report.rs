//! Outcome types the synchronizer reports to its callers.

use serde::{Deserialize, Serialize};
use shared_types::FinalizedBlock;

/// Result of one synchronization pass against a single peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Peer the pass ran against.
    pub peer: String,
    /// Local chain height before the pass.
    pub height_before: u64,
    /// Local chain height after the pass.
    pub height_after: u64,
    /// Blocks fetched from the peer and committed locally.
    pub applied: u64,
    /// How the pass ended.
    pub outcome: SyncOutcome,
}

/// Terminal state of a synchronization pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing to exchange; the chains already agree.
    AlreadyCurrent,
    /// Missing Pages were fetched and appended.
    Advanced,
    /// A fork was found and the remote branch won; the displaced local
    /// suffix is in quarantine.
    AdoptedRemote {
        /// First replaced index.
        from_index: u64,
        /// Displaced local Pages retained for audit.
        quarantined: usize,
    },
    /// A fork was found and the local branch won; the losing remote branch
    /// is in quarantine.
    KeptLocal {
        /// First divergent index.
        at_index: u64,
        /// Rejected remote Pages retained for audit.
        quarantined: usize,
    },
    /// The remote branch failed validation and never reached fork choice.
    RejectedRemote {
        /// First divergent index.
        at_index: u64,
    },
}

/// Result of pushing one block to the healthy peer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    /// Peers that took the block.
    pub delivered: usize,
    /// Peers that exhausted every delivery attempt.
    pub failed: usize,
}

/// Result of one heartbeat sweep over the peer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Peers probed.
    pub checked: usize,
    /// Peers that answered.
    pub healthy: usize,
    /// Peers dropped for hitting the failure threshold.
    pub pruned: usize,
}

/// How an inbound gossiped block was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiveOutcome {
    /// Verified and committed at `index`.
    Committed {
        /// Committed sequence index.
        index: u64,
    },
    /// A gossip echo, or already committed with the same hash.
    Duplicate,
    /// The block is ahead of the local tip; a catch-up pass against the
    /// sender must close the gap first.
    NeedsSync {
        /// Local height at the time of receipt.
        tip_height: u64,
    },
}

/// A rejected block, retained for operator audit instead of discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantinedBlock {
    /// The rejected record.
    pub block: FinalizedBlock,
    /// Peer that presented it.
    pub peer: String,
    /// Why it was rejected.
    pub reason: String,
    /// Unix-ms when it entered quarantine.
    pub at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_report_serializes_with_tagged_outcome() {
        let report = SyncReport {
            peer: "b:9300".into(),
            height_before: 4,
            height_after: 6,
            applied: 3,
            outcome: SyncOutcome::AdoptedRemote { from_index: 3, quarantined: 1 },
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["kind"], "adopted_remote");
        assert_eq!(json["outcome"]["from_index"], 3);

        let back: SyncReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
