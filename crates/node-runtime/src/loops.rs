//! Background loops of a running node.
//!
//! Each loop is one spawned task owned by [`crate::runtime::NodeRuntime`]
//! and cancelled through its shutdown signal. They only touch the
//! container's public surface, so everything here is also reachable from
//! an operator console or a test.

use crate::container::NodeContainer;
use cl_03_ledger::LedgerApi;
use cl_05_sync::{SyncApi, SyncOutcome};
use shared_bus::EventFilter;
use shared_types::{FinalizedBlock, Tier};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Seal due rollup windows, lowest tier first, and announce each sealed
/// record to peers. A failed attempt leaves the window open; the next
/// tick retries the identical range.
pub async fn rollup_loop(node: Arc<NodeContainer>) {
    let mut ticker =
        tokio::time::interval(Duration::from_millis(node.config().node.rollup_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        for tier in Tier::ROLLUPS {
            match node.ledger().rollup(tier).await {
                Ok(Some(record)) => {
                    info!(%tier, index = record.index, "Rollup sealed");
                    node.broadcast(FinalizedBlock::Rollup(record));
                }
                Ok(None) => {}
                Err(error) => warn!(%tier, %error, "Rollup attempt failed"),
            }
        }
    }
}

/// Periodic pull reconciliation: refresh the peer table, then sync from
/// the healthy peer with the tallest chain.
pub async fn sync_loop(node: Arc<NodeContainer>) {
    let mut ticker =
        tokio::time::interval(Duration::from_millis(node.config().node.sync_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        node.sync().discover_peers().await;

        let best =
            node.sync().peers().into_iter().filter(|p| p.healthy).max_by_key(|p| p.height);
        let Some(peer) = best else { continue };

        match node.sync().sync(&peer.addr).await {
            Ok(report) if matches!(report.outcome, SyncOutcome::AlreadyCurrent) => {}
            Ok(report) => info!(
                peer = %report.peer,
                applied = report.applied,
                height = report.height_after,
                outcome = ?report.outcome,
                "Sync pass finished"
            ),
            Err(error) => warn!(peer = %peer.addr, %error, "Sync pass failed"),
        }
    }
}

/// Heartbeat every known peer and prune the persistently dead.
pub async fn heartbeat_loop(node: Arc<NodeContainer>) {
    let mut ticker =
        tokio::time::interval(Duration::from_millis(node.config().node.heartbeat_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let report = node.sync().health_check().await;
        if report.pruned > 0 {
            info!(
                checked = report.checked,
                healthy = report.healthy,
                pruned = report.pruned,
                "Peer health pass"
            );
        } else {
            debug!(checked = report.checked, healthy = report.healthy, "Peer health pass");
        }
    }
}

/// Journal every bus event. Keeping one subscriber alive for the process
/// lifetime also means publishes always have a receiver.
pub async fn event_loop(node: Arc<NodeContainer>) {
    let mut subscription = node.bus().subscribe(EventFilter::all());
    while let Some(event) = subscription.recv().await {
        debug!(topic = ?event.topic(), event = ?event, "Bus event");
    }
}
