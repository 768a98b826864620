//! Consensus coordinator configuration.

use serde::{Deserialize, Serialize};

/// How the local custody adapter answers signing requests.
///
/// This is deliberately explicit configuration rather than a default
/// behavior: a node that endorses blocks unattended and a node whose
/// operator reviews each request are different trust postures, and the
/// choice is logged at startup and on every signature issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningPolicy {
    /// Sign every well-formed request without consultation.
    AutoSign,
    /// Consult the review gate per request; a decline contributes no
    /// signature and the candidate simply waits on the other validators.
    Review,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        SigningPolicy::Review
    }
}

impl std::fmt::Display for SigningPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningPolicy::AutoSign => f.write_str("auto_sign"),
            SigningPolicy::Review => f.write_str("review"),
        }
    }
}

/// Tunables for one collection round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Upper bound on one collection round, in milliseconds. When it
    /// elapses short of quorum the round fails with `WindowElapsed` and
    /// the candidate stays pending; it is never force-committed.
    pub collection_window_ms: u64,
    /// Policy applied by the local custody adapter.
    pub signing_policy: SigningPolicy,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self { collection_window_ms: 5_000, signing_policy: SigningPolicy::default() }
    }
}
