//! Chain structure: append outcomes, history filtering, and the pure
//! structural checks behind `validate_chain`.
//!
//! Everything here is synchronous and side-effect free. Cryptographic
//! signature verification lives in [`super::verify`]; walking the stores
//! and wiring the two together is the service's job.

use serde::{Deserialize, Serialize};
use shared_types::{Hash, IntegrityError, Page, PageState, RollupRecord, Tier};

/// Definite, typed result of an `append` call. Callers never have to guess
/// what happened to their entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppendOutcome {
    /// Quorum reached; the Page is committed at its index.
    Finalized(Page),
    /// Quorum was not reached inside the window. The Page is parked for
    /// operator attention and can be resubmitted via `retry_pending`.
    Pending(Page),
    /// The entry was refused outright and nothing was recorded.
    Rejected { reason: String },
}

impl AppendOutcome {
    /// The Page involved, if the entry got far enough to have one.
    pub fn page(&self) -> Option<&Page> {
        match self {
            AppendOutcome::Finalized(page) | AppendOutcome::Pending(page) => Some(page),
            AppendOutcome::Rejected { .. } => None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, AppendOutcome::Finalized(_))
    }
}

/// Result of admitting one peer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptOutcome {
    /// The block extended our chain and was committed.
    Committed,
    /// We already hold an identical block at that index; nothing changed.
    AlreadyKnown,
}

/// First point at which a chain walk stopped agreeing with itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub tier: Tier,
    pub index: u64,
    pub fault: IntegrityError,
}

/// Result of a full `validate_chain` walk across every tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainValidationReport {
    /// True when every tier checked out from genesis to tip.
    pub ok: bool,
    /// Pages examined before the walk ended.
    pub checked_pages: u64,
    /// Rollup records examined before the walk ended.
    pub checked_rollups: u64,
    /// The first mismatch found; the walk stops here.
    pub first_divergence: Option<Divergence>,
}

impl ChainValidationReport {
    pub fn clean(checked_pages: u64, checked_rollups: u64) -> Self {
        Self { ok: true, checked_pages, checked_rollups, first_divergence: None }
    }

    pub fn diverged(checked_pages: u64, checked_rollups: u64, divergence: Divergence) -> Self {
        Self { ok: false, checked_pages, checked_rollups, first_divergence: Some(divergence) }
    }
}

/// Predicate over Pages for `read_history`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Lowest index to include.
    pub from_index: Option<u64>,
    /// Highest index to include (inclusive).
    pub to_index: Option<u64>,
    /// Exact action label to match.
    pub action: Option<String>,
    /// Exact submitter identity to match.
    pub submitter: Option<String>,
    /// Lifecycle state to match.
    pub state: Option<PageState>,
}

impl HistoryFilter {
    /// Matches every Page.
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.from_index = Some(from);
        self.to_index = Some(to);
        self
    }

    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[must_use]
    pub fn submitter(mut self, submitter: impl Into<String>) -> Self {
        self.submitter = Some(submitter.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: PageState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn matches(&self, page: &Page) -> bool {
        if self.from_index.is_some_and(|from| page.index < from) {
            return false;
        }
        if self.to_index.is_some_and(|to| page.index > to) {
            return false;
        }
        if self.action.as_deref().is_some_and(|a| a != page.action) {
            return false;
        }
        if self.submitter.as_deref().is_some_and(|s| s != page.submitter) {
            return false;
        }
        if self.state.is_some_and(|s| s != page.state) {
            return false;
        }
        true
    }
}

/// Structural check for one Page during a chain walk.
///
/// Verifies the gap-free sequence, the prior-hash link, and that the stored
/// hash still matches a recomputation over the stored content. A payload
/// that no longer canonicalizes counts as a hash mismatch: the stored hash
/// cannot have been produced from that content.
pub fn verify_page_structure(
    expected_index: u64,
    prior_hash: &Hash,
    page: &Page,
) -> Result<(), IntegrityError> {
    if page.index != expected_index {
        return Err(IntegrityError::SequenceGap {
            tier: Tier::Page,
            expected: expected_index,
            found: page.index,
        });
    }
    if page.prior_hash != *prior_hash {
        return Err(IntegrityError::BrokenLink { tier: Tier::Page, index: page.index });
    }
    let recomputed = page
        .compute_hash()
        .map_err(|_| IntegrityError::HashMismatch { tier: Tier::Page, index: page.index })?;
    if recomputed != page.hash {
        return Err(IntegrityError::HashMismatch { tier: Tier::Page, index: page.index });
    }
    Ok(())
}

/// Structural check for one rollup record during a chain walk.
///
/// `expected_range_start` is the index right after the previous record's
/// sealed range (0 for the first record); rollup ranges must tile the lower
/// tier without gaps or overlaps.
pub fn verify_rollup_structure(
    expected_index: u64,
    prior_hash: &Hash,
    expected_range_start: u64,
    record: &RollupRecord,
) -> Result<(), IntegrityError> {
    let tier = record.tier;
    if record.index != expected_index {
        return Err(IntegrityError::SequenceGap {
            tier,
            expected: expected_index,
            found: record.index,
        });
    }
    if record.prior_hash != *prior_hash {
        return Err(IntegrityError::BrokenLink { tier, index: record.index });
    }
    if record.range.start > record.range.end || record.range.start != expected_range_start {
        return Err(IntegrityError::BadRollupRange {
            tier,
            index: record.index,
            start: record.range.start,
            end: record.range.end,
        });
    }
    if record.member_hashes.len() as u64 != record.range.len() {
        return Err(IntegrityError::MemberHashMismatch { tier, index: record.index });
    }
    let recomputed = record
        .compute_hash()
        .map_err(|_| IntegrityError::HashMismatch { tier, index: record.index })?;
    if recomputed != record.hash {
        return Err(IntegrityError::HashMismatch { tier, index: record.index });
    }
    Ok(())
}

/// Compare a rollup's member hashes against the lower-tier hashes actually
/// stored for its range, in ascending index order.
pub fn verify_rollup_members(
    record: &RollupRecord,
    lower_hashes: &[Hash],
) -> Result<(), IntegrityError> {
    if record.member_hashes != lower_hashes {
        return Err(IntegrityError::MemberHashMismatch {
            tier: record.tier,
            index: record.index,
        });
    }
    Ok(())
}

/// Rebuild a Page draft content-for-content at a new position in the chain.
///
/// Used when a candidate loses its index to an inbound synced block: the
/// entry itself is still good, only its index and prior-hash are stale.
pub fn rebuild_candidate(
    page: &Page,
    index: u64,
    prior_hash: Hash,
    timestamp: u64,
) -> Result<Page, shared_types::ValidationError> {
    Page::draft(
        index,
        prior_hash,
        page.action.clone(),
        page.payload.clone(),
        page.submitter.clone(),
        timestamp,
    )
}
