//! In-memory store adapters.
//!
//! The default for tests and for nodes run without a data directory.
//! Production persistence lives in `file.rs`; both implement the same
//! ports, so the service never knows which one it has.

use crate::ports::outbound::{PageStore, RollupStore};
use shared_types::{Page, PageState, RollupRecord, StorageError, Tier};
use std::collections::BTreeMap;

/// Page chain held in a `Vec`; index equals position.
#[derive(Default)]
pub struct InMemoryPageStore {
    pages: Vec<Page>,
}

impl InMemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageStore for InMemoryPageStore {
    fn append(&mut self, page: Page) -> Result<(), StorageError> {
        self.pages.push(page);
        Ok(())
    }

    fn update_state(&mut self, index: u64, state: PageState) -> Result<(), StorageError> {
        match self.pages.get_mut(index as usize) {
            Some(page) => {
                page.state = state;
                Ok(())
            }
            None => Err(StorageError::Decode(format!("no page at index {index}"))),
        }
    }

    fn page_at(&self, index: u64) -> Result<Option<Page>, StorageError> {
        Ok(self.pages.get(index as usize).cloned())
    }

    fn pages_in(&self, start: u64, end: u64) -> Result<Vec<Page>, StorageError> {
        if start > end {
            return Ok(Vec::new());
        }
        let start = start as usize;
        let end = (end as usize).min(self.pages.len().saturating_sub(1));
        if start >= self.pages.len() {
            return Ok(Vec::new());
        }
        Ok(self.pages[start..=end].to_vec())
    }

    fn all(&self) -> Result<Vec<Page>, StorageError> {
        Ok(self.pages.clone())
    }

    fn len(&self) -> u64 {
        self.pages.len() as u64
    }

    fn last(&self) -> Result<Option<Page>, StorageError> {
        Ok(self.pages.last().cloned())
    }

    fn truncate_from(&mut self, index: u64) -> Result<Vec<Page>, StorageError> {
        let index = (index as usize).min(self.pages.len());
        Ok(self.pages.split_off(index))
    }
}

/// One `Vec` chain per rollup tier.
#[derive(Default)]
pub struct InMemoryRollupStore {
    chains: BTreeMap<Tier, Vec<RollupRecord>>,
}

impl InMemoryRollupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RollupStore for InMemoryRollupStore {
    fn append(&mut self, record: RollupRecord) -> Result<(), StorageError> {
        self.chains.entry(record.tier).or_default().push(record);
        Ok(())
    }

    fn update_state(
        &mut self,
        tier: Tier,
        index: u64,
        state: PageState,
    ) -> Result<(), StorageError> {
        match self
            .chains
            .get_mut(&tier)
            .and_then(|chain| chain.get_mut(index as usize))
        {
            Some(record) => {
                record.state = state;
                Ok(())
            }
            None => Err(StorageError::Decode(format!("no {tier} record at index {index}"))),
        }
    }

    fn records(&self, tier: Tier) -> Result<Vec<RollupRecord>, StorageError> {
        Ok(self.chains.get(&tier).cloned().unwrap_or_default())
    }

    fn last(&self, tier: Tier) -> Result<Option<RollupRecord>, StorageError> {
        Ok(self.chains.get(&tier).and_then(|chain| chain.last().cloned()))
    }

    fn len(&self, tier: Tier) -> u64 {
        self.chains.get(&tier).map_or(0, |chain| chain.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::ZERO_HASH;

    fn page(index: u64) -> Page {
        Page::draft(
            index,
            ZERO_HASH,
            "entry.custom",
            json!({"seq": index}),
            "clerk-01",
            1_700_000_000_000 + index,
        )
        .unwrap()
    }

    #[test]
    fn test_page_store_round_trip() {
        let mut store = InMemoryPageStore::new();
        for i in 0..4 {
            store.append(page(i)).unwrap();
        }

        assert_eq!(store.len(), 4);
        assert_eq!(store.page_at(2).unwrap().unwrap().index, 2);
        assert!(store.page_at(9).unwrap().is_none());
        assert_eq!(store.last().unwrap().unwrap().index, 3);
        assert_eq!(store.pages_in(1, 2).unwrap().len(), 2);
        assert_eq!(store.pages_in(2, 99).unwrap().len(), 2);
        assert!(store.pages_in(9, 12).unwrap().is_empty());
    }

    #[test]
    fn test_page_store_state_and_truncate() {
        let mut store = InMemoryPageStore::new();
        for i in 0..4 {
            store.append(page(i)).unwrap();
        }

        store.update_state(1, PageState::RolledUp).unwrap();
        assert_eq!(store.page_at(1).unwrap().unwrap().state, PageState::RolledUp);
        assert!(store.update_state(9, PageState::RolledUp).is_err());

        let removed = store.truncate_from(2).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].index, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_rollup_store_keeps_tiers_separate() {
        let mut store = InMemoryRollupStore::new();
        let chapter = RollupRecord::seal(
            Tier::Chapter,
            0,
            ZERO_HASH,
            shared_types::SealedRange { start: 0, end: 1 },
            vec![[1u8; 32], [2u8; 32]],
            1_700_000_000_000,
        )
        .unwrap();
        store.append(chapter.clone()).unwrap();

        assert_eq!(store.len(Tier::Chapter), 1);
        assert_eq!(store.len(Tier::Book), 0);
        assert!(store.records(Tier::Book).unwrap().is_empty());
        assert_eq!(store.last(Tier::Chapter).unwrap().unwrap().hash, chapter.hash);

        store.update_state(Tier::Chapter, 0, PageState::RolledUp).unwrap();
        assert_eq!(
            store.records(Tier::Chapter).unwrap()[0].state,
            PageState::RolledUp
        );
    }
}
