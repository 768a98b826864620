//! Restart behavior with file-backed stores.
//!
//! A council is torn down mid-history and rebuilt over the same data
//! directory. The reopened chain must carry the old tip, remember which
//! Chapters were already sealed, and keep accepting entries where the
//! old process left off.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{chapters_every, council_with, finalize_entry, T0};
    use cl_03_ledger::adapters::{FilePageStore, FileRollupStore};
    use cl_03_ledger::{LedgerApi, PageStore, RollupStore};
    use serde_json::json;
    use shared_types::{SealedRange, Tier};
    use std::path::Path;

    fn page_store(dir: &Path) -> Box<dyn PageStore> {
        Box::new(FilePageStore::open(dir).unwrap())
    }

    fn rollup_store(dir: &Path) -> Box<dyn RollupStore> {
        Box::new(FileRollupStore::open(dir).unwrap())
    }

    #[tokio::test]
    async fn test_chain_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();

        // First life: genesis, four minutes, one sealed Chapter.
        let tip_before = {
            let node = council_with(
                3,
                3,
                chapters_every(2),
                page_store(dir.path()),
                rollup_store(dir.path()),
            )
            .await;
            for session in 1..=4u64 {
                node.clock.advance(60_000);
                finalize_entry(&node, "minutes.approved", json!({"session": session})).await;
            }
            let sealed = node
                .ledger
                .rollup(Tier::Chapter)
                .await
                .unwrap()
                .expect("two Pages make a Chapter due");
            assert_eq!(sealed.range, SealedRange { start: 0, end: 1 });
            node.ledger.tip().unwrap()
        };

        // Second life over the same directory. Genesis must not run again.
        let node = council_with(
            3,
            3,
            chapters_every(2),
            page_store(dir.path()),
            rollup_store(dir.path()),
        )
        .await;
        assert_eq!(node.ledger.tip().unwrap(), tip_before);
        assert_eq!(node.ledger.rollup_records(Tier::Chapter).unwrap().len(), 1);
        assert!(node.ledger.validate_chain().unwrap().ok);

        // The wall clock moved on while the node was down.
        node.clock.set(T0 + 300_000);

        // Sealing resumes after the remembered Chapter, not from zero.
        let sealed = node
            .ledger
            .rollup(Tier::Chapter)
            .await
            .unwrap()
            .expect("the backlog left a due window");
        assert_eq!(sealed.range, SealedRange { start: 2, end: 3 });

        let page = finalize_entry(&node, "minutes.approved", json!({"session": 5})).await;
        assert_eq!(page.index, 5);

        let report = node.ledger.validate_chain().unwrap();
        assert!(report.ok);
        assert_eq!(report.checked_pages, 6);
        assert_eq!(report.checked_rollups, 2);
    }
}
