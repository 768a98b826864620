//! Signature collection outcomes, driven end to end.
//!
//! Real Ed25519 keys, a live registry behind the consensus coordinator,
//! and the ledger's append flow on top: quorum reached, quorum missed,
//! park and retry, and submission dedup under contention.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{council, expect_event, finalize_entry};
    use cl_03_ledger::{AppendOutcome, LedgerApi};
    use parking_lot::Mutex;
    use serde_json::json;
    use sha2::{Digest, Sha256};
    use shared_bus::{DedupCache, EventFilter, EventTopic, LedgerEvent};
    use shared_types::{to_canonical_bytes, Hash, PageState, Tier, TimeSource};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_three_of_five_seats_finalize_an_entry() {
        let node = council(5, 3).await;
        let mut events = node.bus.subscribe(EventFilter::topics(vec![EventTopic::Ledger]));

        let page = finalize_entry(&node, "minutes.approved", json!({"session": 12})).await;

        assert_eq!(page.index, 1);
        assert_eq!(page.state, PageState::Finalized);
        let endorsers: BTreeSet<&str> =
            page.signatures.iter().map(|s| s.validator.as_str()).collect();
        assert_eq!(endorsers.len(), 3, "a simple majority of five is three");
        assert_eq!(page.signatures.len(), endorsers.len());

        let finalized = expect_event(&mut events, |e| {
            matches!(e, LedgerEvent::PageFinalized { index: 1, .. })
        })
        .await;
        assert!(matches!(
            finalized,
            LedgerEvent::PageFinalized { signature_count: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_two_of_five_seats_park_the_entry() {
        let node = council(5, 2).await;
        let mut events = node.bus.subscribe(EventFilter::topics(vec![EventTopic::Consensus]));

        let outcome = node
            .ledger
            .append("minutes.approved", json!({"session": 13}), "clerk-office")
            .await
            .unwrap();

        let page = match outcome {
            AppendOutcome::Pending(page) => page,
            other => panic!("expected a parked candidate, got {other:?}"),
        };
        assert_eq!(page.state, PageState::PendingSignatures);
        assert!(page.signatures.len() < 3);

        // The chain did not move; the candidate waits for the operator.
        assert_eq!(node.ledger.tip().unwrap().height, 1);
        let parked = node.ledger.list_pending();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].hash, page.hash);

        let failure = expect_event(&mut events, |e| {
            matches!(e, LedgerEvent::QuorumFailed { tier: Tier::Page, .. })
        })
        .await;
        assert!(matches!(failure, LedgerEvent::QuorumFailed { need: 3, .. }));
    }

    #[tokio::test]
    async fn test_parked_entry_finalizes_once_custody_returns() {
        let node = council(5, 3).await;

        node.outage.begin();
        let outcome = node
            .ledger
            .append("ordinance.passed", json!({"number": 41}), "clerk-office")
            .await
            .unwrap();
        let parked = match outcome {
            AppendOutcome::Pending(page) => page,
            other => panic!("expected a parked candidate, got {other:?}"),
        };
        assert_eq!(node.ledger.tip().unwrap().height, 1);

        node.outage.end();
        let retried = node.ledger.retry_pending(&parked.hash).await.unwrap();
        let page = match retried {
            AppendOutcome::Finalized(page) => page,
            other => panic!("expected finalization on retry, got {other:?}"),
        };

        assert_eq!(page.index, 1);
        assert_eq!(page.action, parked.action);
        assert_eq!(page.payload, parked.payload);
        assert_eq!(page.signatures.len(), 3);
        assert!(node.ledger.list_pending().is_empty());
        assert_eq!(node.ledger.tip().unwrap().height, 2);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_submissions_admit_one() {
        // The runtime fingerprints {action, payload, submitter} and claims
        // the fingerprint in a single-use set before appending. Every
        // claimant but one must lose, no matter the interleaving.
        let node = Arc::new(council(5, 5).await);
        let submissions = Arc::new(Mutex::new(DedupCache::with_config(60_000, 60_000)));

        let entry = json!({"case": "2024-117", "disposition": "granted"});
        let fingerprint: Hash = Sha256::digest(
            to_canonical_bytes(&json!({
                "action": "petition.resolved",
                "payload": entry,
                "submitter": "clerk-office",
            }))
            .unwrap(),
        )
        .into();

        let mut attempts = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let node = Arc::clone(&node);
            let submissions = Arc::clone(&submissions);
            let entry = entry.clone();
            attempts.spawn(async move {
                let now = node.clock.now_ms();
                if !submissions.lock().first_sighting(fingerprint, now) {
                    return None;
                }
                Some(
                    node.ledger
                        .append("petition.resolved", entry, "clerk-office")
                        .await
                        .unwrap(),
                )
            });
        }

        let mut admitted = 0;
        while let Some(result) = attempts.join_next().await {
            if let Some(AppendOutcome::Finalized(_)) = result.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
        assert_eq!(node.ledger.tip().unwrap().height, 2);
    }
}
