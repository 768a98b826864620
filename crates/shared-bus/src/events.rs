//! # Ledger Events
//!
//! Defines all event types that flow through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::{Hash, SealedRange, Tier, ValidatorId, ValidatorRole};

/// All events that can be published to the event bus.
///
/// Events are notifications after the fact; nothing in the system blocks
/// on an event being consumed. Request/response interactions go through
/// ports instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LedgerEvent {
    // =========================================================================
    // SUBSYSTEM 3: LEDGER CORE
    // =========================================================================
    /// A candidate Page entered signature collection.
    PagePending {
        /// Candidate's sequence index.
        index: u64,
        /// Candidate's hash.
        hash: Hash,
    },

    /// A Page reached quorum and was committed.
    PageFinalized {
        /// Committed index.
        index: u64,
        /// Committed hash.
        hash: Hash,
        /// Number of endorsements carried at commit.
        signature_count: usize,
    },

    /// A rollup record was sealed over a closed lower-tier range.
    RollupSealed {
        /// Tier of the new record.
        tier: Tier,
        /// Per-tier index of the new record.
        index: u64,
        /// Hash of the new record.
        hash: Hash,
        /// Lower-tier range it seals.
        range: SealedRange,
    },

    /// The genesis Page was installed on an empty chain.
    GenesisInstalled {
        /// Genesis hash.
        hash: Hash,
        /// Genesis timestamp.
        timestamp: u64,
    },

    // =========================================================================
    // SUBSYSTEM 2: VALIDATOR REGISTRY
    // =========================================================================
    /// A validator was registered.
    ValidatorRegistered {
        /// New validator's identity.
        id: ValidatorId,
        /// Role granted at registration.
        role: ValidatorRole,
    },

    /// A validator was deactivated.
    ValidatorDeactivated {
        /// Deactivated validator's identity.
        id: ValidatorId,
    },

    /// A previously deactivated validator was reactivated.
    ValidatorReactivated {
        /// Reactivated validator's identity.
        id: ValidatorId,
    },

    // =========================================================================
    // SUBSYSTEM 4: CONSENSUS COORDINATOR
    // =========================================================================
    /// Signature collection ended short of quorum.
    QuorumFailed {
        /// Tier of the abandoned candidate.
        tier: Tier,
        /// Index of the abandoned candidate.
        index: u64,
        /// Signatures gathered before the window closed.
        got: usize,
        /// Signatures required.
        need: usize,
    },

    // =========================================================================
    // SUBSYSTEM 5: PEER SYNCHRONIZER
    // =========================================================================
    /// A peer crossed the healthy/unhealthy boundary.
    PeerStatusChanged {
        /// Peer identity.
        peer: String,
        /// Whether the peer is now considered healthy.
        healthy: bool,
    },

    /// A received chain disagrees with local history at a finalized index.
    ChainDiverged {
        /// Tier at which the divergence was found.
        tier: Tier,
        /// First divergent index.
        index: u64,
        /// Peer that presented the divergent history.
        peer: String,
    },

    /// Fork choice replaced the local suffix with a remote one.
    ForkResolved {
        /// First replaced index.
        from_index: u64,
        /// New tip hash after adoption.
        new_tip: Hash,
        /// Number of local Pages quarantined.
        quarantined: usize,
    },

    // =========================================================================
    // CRITICAL EVENTS (DLQ)
    // =========================================================================
    /// Critical error requiring operator attention.
    CriticalFault {
        /// The subsystem that encountered the error.
        subsystem_id: u8,
        /// Error description.
        error: String,
    },
}

impl LedgerEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::PagePending { .. }
            | Self::PageFinalized { .. }
            | Self::RollupSealed { .. }
            | Self::GenesisInstalled { .. } => EventTopic::Ledger,
            Self::ValidatorRegistered { .. }
            | Self::ValidatorDeactivated { .. }
            | Self::ValidatorReactivated { .. } => EventTopic::Registry,
            Self::QuorumFailed { .. } => EventTopic::Consensus,
            Self::PeerStatusChanged { .. }
            | Self::ChainDiverged { .. }
            | Self::ForkResolved { .. } => EventTopic::Sync,
            Self::CriticalFault { .. } => EventTopic::DeadLetterQueue,
        }
    }

    /// Get the originating subsystem ID.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self {
            Self::ValidatorRegistered { .. }
            | Self::ValidatorDeactivated { .. }
            | Self::ValidatorReactivated { .. } => 2,
            Self::PagePending { .. }
            | Self::PageFinalized { .. }
            | Self::RollupSealed { .. }
            | Self::GenesisInstalled { .. } => 3,
            Self::QuorumFailed { .. } => 4,
            Self::PeerStatusChanged { .. }
            | Self::ChainDiverged { .. }
            | Self::ForkResolved { .. } => 5,
            Self::CriticalFault { subsystem_id, .. } => *subsystem_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Subsystem 3 events (Page and rollup lifecycle).
    Ledger,
    /// Subsystem 2 events (validator lifecycle).
    Registry,
    /// Subsystem 4 events (quorum outcomes).
    Consensus,
    /// Subsystem 5 events (peers and fork handling).
    Sync,
    /// Dead Letter Queue for critical errors.
    DeadLetterQueue,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Source subsystems to include. Empty means all sources.
    pub source_subsystems: Vec<u8>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            source_subsystems: Vec::new(),
        }
    }

    /// Create a filter for events from specific subsystems.
    #[must_use]
    pub fn from_subsystems(subsystems: Vec<u8>) -> Self {
        Self {
            topics: Vec::new(),
            source_subsystems: subsystems,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let source_match = self.source_subsystems.is_empty()
            || self.source_subsystems.contains(&event.source_subsystem());

        topic_match && source_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ZERO_HASH;

    fn finalized_event() -> LedgerEvent {
        LedgerEvent::PageFinalized {
            index: 1,
            hash: ZERO_HASH,
            signature_count: 3,
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        let event = finalized_event();
        assert_eq!(event.topic(), EventTopic::Ledger);
        assert_eq!(event.source_subsystem(), 3);

        let event = LedgerEvent::ValidatorDeactivated { id: ValidatorId::new("v1") };
        assert_eq!(event.topic(), EventTopic::Registry);
        assert_eq!(event.source_subsystem(), 2);
    }

    #[test]
    fn test_filter_all() {
        let filter = EventFilter::all();
        assert!(filter.matches(&finalized_event()));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Sync]);

        let sync_event = LedgerEvent::PeerStatusChanged {
            peer: "node-b".into(),
            healthy: false,
        };
        assert!(filter.matches(&sync_event));
        assert!(!filter.matches(&finalized_event()));
    }

    #[test]
    fn test_filter_by_subsystem() {
        let filter = EventFilter::from_subsystems(vec![3, 4]);

        assert!(filter.matches(&finalized_event())); // subsystem 3

        let registry_event = LedgerEvent::ValidatorRegistered {
            id: ValidatorId::new("v1"),
            role: ValidatorRole::Chair,
        };
        assert!(!filter.matches(&registry_event)); // subsystem 2
    }

    #[test]
    fn test_critical_fault_carries_source() {
        let event = LedgerEvent::CriticalFault {
            subsystem_id: 5,
            error: "peer table empty".into(),
        };
        assert_eq!(event.topic(), EventTopic::DeadLetterQueue);
        assert_eq!(event.source_subsystem(), 5);
    }
}
