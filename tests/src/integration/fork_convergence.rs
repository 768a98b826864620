//! Two councils on a loopback network: replication and fork healing.
//!
//! Both nodes are seeded with the same roster and the same clock, so
//! their genesis Pages agree byte for byte. A partition then lets each
//! finalize its own index 1, and the heal must converge on the branch
//! that finalized earlier, quarantining the loser.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{
        council, expect_event, finalize_entry, join_network, Council, T0,
    };
    use cl_03_ledger::LedgerApi;
    use cl_05_sync::{BroadcastReport, LoopbackHub, SyncApi, SyncOutcome, SyncService};
    use serde_json::json;
    use shared_bus::{EventFilter, EventTopic, LedgerEvent};
    use shared_types::FinalizedBlock;
    use std::sync::Arc;

    const ADDR_A: &str = "a:9300";
    const ADDR_B: &str = "b:9300";

    async fn paired() -> (Council, Council, Arc<SyncService>, Arc<SyncService>, Arc<LoopbackHub>) {
        let a = council(5, 5).await;
        let b = council(5, 5).await;
        let hub = LoopbackHub::new();
        let sync_a = join_network(&hub, ADDR_A, &[ADDR_B], &a);
        let sync_b = join_network(&hub, ADDR_B, &[ADDR_A], &b);
        sync_a.discover_peers().await;
        sync_b.discover_peers().await;
        (a, b, sync_a, sync_b, hub)
    }

    #[tokio::test]
    async fn test_seeded_councils_share_a_genesis() {
        let (a, b, sync_a, sync_b, _hub) = paired().await;

        assert_eq!(a.ledger.tip().unwrap(), b.ledger.tip().unwrap());
        assert_eq!(sync_a.peers().len(), 1);
        assert_eq!(sync_b.peers().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_replicates_a_finalized_page() {
        let (a, b, sync_a, _sync_b, _hub) = paired().await;

        let page = finalize_entry(&a, "minutes.approved", json!({"session": 1})).await;
        let report = sync_a
            .broadcast(&FinalizedBlock::Page(page.clone()))
            .await
            .unwrap();

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 0 });
        assert_eq!(b.ledger.tip().unwrap(), a.ledger.tip().unwrap());
        let replica = b.ledger.page_at(1).unwrap().expect("replicated Page");
        assert_eq!(replica.hash, page.hash);
        assert_eq!(replica.action, "minutes.approved");
    }

    #[tokio::test]
    async fn test_partition_heals_toward_the_earlier_finalization() {
        let (a, b, sync_a, sync_b, hub) = paired().await;

        // Partition: each side finalizes its own index 1. A stamps its
        // Page ten seconds after genesis, B twenty.
        hub.set_offline(ADDR_B, true);
        a.clock.set(T0 + 10_000);
        let kept = finalize_entry(&a, "minutes.approved", json!({"session": 1, "side": "a"})).await;
        b.clock.set(T0 + 20_000);
        let displaced =
            finalize_entry(&b, "minutes.approved", json!({"session": 1, "side": "b"})).await;
        assert_ne!(kept.hash, displaced.hash);

        hub.set_offline(ADDR_B, false);
        let mut sync_events = b.bus.subscribe(EventFilter::topics(vec![EventTopic::Sync]));

        let report = sync_b.sync(ADDR_A).await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::AdoptedRemote { from_index: 1, quarantined: 1 });

        // B now carries A's branch; its own Page sits in quarantine.
        assert_eq!(b.ledger.tip().unwrap(), a.ledger.tip().unwrap());
        assert_eq!(b.ledger.page_at(1).unwrap().unwrap().hash, kept.hash);
        let quarantine = sync_b.quarantine();
        assert_eq!(quarantine.len(), 1);
        assert!(matches!(
            &quarantine[0].block,
            FinalizedBlock::Page(p) if p.hash == displaced.hash
        ));

        expect_event(&mut sync_events, |e| {
            matches!(e, LedgerEvent::ChainDiverged { index: 1, .. })
        })
        .await;
        expect_event(&mut sync_events, |e| {
            matches!(e, LedgerEvent::ForkResolved { from_index: 1, .. })
        })
        .await;

        // The winner has nothing to pull back.
        let back = sync_a.sync(ADDR_B).await.unwrap();
        assert_eq!(back.outcome, SyncOutcome::AlreadyCurrent);
    }
}
