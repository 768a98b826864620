//! Deterministic fork choice and remote-branch validation.
//!
//! Two partitioned nodes can each finalize a different, individually
//! quorum-valid Page at the same index. After reconnection both sides must
//! pick the same winner without negotiating, so the choice rule is a total
//! order over branches: length, then finalization time of the first
//! divergent Page, then its hash as the final tiebreak.

use shared_types::{Hash, IntegrityError, LedgerFault, Page, Tier};
use std::cmp::Ordering;

/// Which branch survives a fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkDecision {
    /// The local suffix stays; the remote branch is the rejected
    /// alternative.
    KeepLocal,
    /// The remote branch replaces the local suffix.
    AdoptRemote,
}

/// A Page's finalization instant: the newest endorsement it carries.
pub fn finalized_at(page: &Page) -> u64 {
    page.signatures.iter().map(|s| s.timestamp).max().unwrap_or(0)
}

/// Decide between two individually valid branches over the same ancestor.
/// Both slices start at the first divergent index.
///
/// The longer branch wins. At equal length the branch whose first
/// divergent Page finalized earlier wins; at equal time the smaller first
/// hash wins, so the outcome is identical no matter which side evaluates
/// it.
pub fn fork_choice(local: &[Page], remote: &[Page]) -> ForkDecision {
    if remote.is_empty() {
        return ForkDecision::KeepLocal;
    }
    if local.is_empty() {
        return ForkDecision::AdoptRemote;
    }

    match remote.len().cmp(&local.len()) {
        Ordering::Greater => ForkDecision::AdoptRemote,
        Ordering::Less => ForkDecision::KeepLocal,
        Ordering::Equal => {
            let ours = &local[0];
            let theirs = &remote[0];
            match finalized_at(theirs).cmp(&finalized_at(ours)) {
                Ordering::Less => ForkDecision::AdoptRemote,
                Ordering::Greater => ForkDecision::KeepLocal,
                Ordering::Equal if theirs.hash < ours.hash => ForkDecision::AdoptRemote,
                Ordering::Equal => ForkDecision::KeepLocal,
            }
        }
    }
}

/// Structural check of a fetched branch before any of it is judged:
/// gap-free ascending indices from `start_index`, prior-hash linkage from
/// `anchor`, and every stored hash matching its recomputed value.
///
/// Endorsement quorums are a per-block concern checked separately by the
/// caller.
pub fn validate_segment(
    anchor: &Hash,
    start_index: u64,
    pages: &[Page],
) -> Result<(), LedgerFault> {
    let mut prior = *anchor;
    let mut expected = start_index;
    for page in pages {
        if page.index != expected {
            return Err(IntegrityError::SequenceGap {
                tier: Tier::Page,
                expected,
                found: page.index,
            }
            .into());
        }
        if page.prior_hash != prior {
            return Err(IntegrityError::BrokenLink {
                tier: Tier::Page,
                index: page.index,
            }
            .into());
        }
        if page.compute_hash()? != page.hash {
            return Err(IntegrityError::HashMismatch {
                tier: Tier::Page,
                index: page.index,
            }
            .into());
        }
        prior = page.hash;
        expected += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BlockSignature, PageState, ValidatorId, ZERO_HASH};

    const STAMP: u64 = 1_700_000_000_000;

    fn entry(index: u64, prior: Hash, tag: &str, finalized_ms: u64) -> Page {
        let payload = serde_json::json!({ "entry": tag });
        let mut page = Page::draft(index, prior, "entry.custom", payload, "clerk", STAMP).unwrap();
        page.state = PageState::Finalized;
        page.signatures.push(BlockSignature {
            validator: ValidatorId::new("v0"),
            block_hash: page.hash,
            tier: Tier::Page,
            timestamp: finalized_ms,
            signature: [0u8; 64],
        });
        page
    }

    fn branch(start_index: u64, anchor: Hash, tags: &[&str], finalized_ms: u64) -> Vec<Page> {
        let mut pages = Vec::with_capacity(tags.len());
        let mut prior = anchor;
        for (offset, tag) in tags.iter().enumerate() {
            let page = entry(start_index + offset as u64, prior, tag, finalized_ms);
            prior = page.hash;
            pages.push(page);
        }
        pages
    }

    #[test]
    fn test_finalized_at_is_newest_endorsement() {
        let mut page = entry(0, ZERO_HASH, "a", STAMP + 10);
        page.signatures.push(BlockSignature {
            validator: ValidatorId::new("v1"),
            block_hash: page.hash,
            tier: Tier::Page,
            timestamp: STAMP + 40,
            signature: [0u8; 64],
        });
        assert_eq!(finalized_at(&page), STAMP + 40);

        page.signatures.clear();
        assert_eq!(finalized_at(&page), 0);
    }

    #[test]
    fn test_longer_branch_wins_regardless_of_timing() {
        let local = branch(3, [1u8; 32], &["a"], STAMP);
        let remote = branch(3, [1u8; 32], &["x", "y"], STAMP + 99_999);

        assert_eq!(fork_choice(&local, &remote), ForkDecision::AdoptRemote);
        assert_eq!(fork_choice(&remote, &local), ForkDecision::KeepLocal);
    }

    #[test]
    fn test_equal_length_earlier_finalization_wins() {
        let local = branch(3, [1u8; 32], &["a"], STAMP + 500);
        let remote = branch(3, [1u8; 32], &["x"], STAMP + 100);

        assert_eq!(fork_choice(&local, &remote), ForkDecision::AdoptRemote);
        assert_eq!(fork_choice(&remote, &local), ForkDecision::KeepLocal);
    }

    #[test]
    fn test_full_tie_breaks_on_hash_and_both_sides_agree() {
        let local = branch(3, [1u8; 32], &["a"], STAMP);
        let remote = branch(3, [1u8; 32], &["x"], STAMP);
        assert_ne!(local[0].hash, remote[0].hash);

        let here = fork_choice(&local, &remote);
        let there = fork_choice(&remote, &local);
        if remote[0].hash < local[0].hash {
            assert_eq!(here, ForkDecision::AdoptRemote);
            assert_eq!(there, ForkDecision::KeepLocal);
        } else {
            assert_eq!(here, ForkDecision::KeepLocal);
            assert_eq!(there, ForkDecision::AdoptRemote);
        }
    }

    #[test]
    fn test_empty_remote_branch_never_wins() {
        let local = branch(3, [1u8; 32], &["a"], STAMP);
        assert_eq!(fork_choice(&local, &[]), ForkDecision::KeepLocal);
        assert_eq!(fork_choice(&[], &local), ForkDecision::AdoptRemote);
    }

    #[test]
    fn test_validate_segment_accepts_well_formed_branch() {
        let pages = branch(5, [2u8; 32], &["a", "b", "c"], STAMP);
        assert!(validate_segment(&[2u8; 32], 5, &pages).is_ok());
        assert!(validate_segment(&ZERO_HASH, 0, &[]).is_ok());
    }

    #[test]
    fn test_validate_segment_flags_index_gap() {
        let mut pages = branch(5, [2u8; 32], &["a", "b"], STAMP);
        pages[1].index = 9;

        let err = validate_segment(&[2u8; 32], 5, &pages).unwrap_err();
        assert!(matches!(
            err,
            LedgerFault::Integrity(IntegrityError::SequenceGap { expected: 6, found: 9, .. })
        ));
    }

    #[test]
    fn test_validate_segment_flags_broken_link() {
        let mut pages = branch(5, [2u8; 32], &["a", "b"], STAMP);
        pages[1].prior_hash = [7u8; 32];

        let err = validate_segment(&[2u8; 32], 5, &pages).unwrap_err();
        assert!(matches!(
            err,
            LedgerFault::Integrity(IntegrityError::BrokenLink { index: 6, .. })
        ));
    }

    #[test]
    fn test_validate_segment_flags_content_tamper() {
        let mut pages = branch(5, [2u8; 32], &["a", "b"], STAMP);
        pages[0].payload = serde_json::json!({ "entry": "doctored" });

        let err = validate_segment(&[2u8; 32], 5, &pages).unwrap_err();
        assert!(matches!(
            err,
            LedgerFault::Integrity(IntegrityError::HashMismatch { index: 5, .. })
        ));
    }
}
