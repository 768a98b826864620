//! File-backed store adapters.
//!
//! Chains are held in memory and written through to disk on every
//! mutation. The on-disk shape is an ordered record stream, one frame per
//! record: `[len: u32 LE][crc32: u32 LE][bincode bytes]`. Rewrites go
//! through a temp file, `sync_all`, then an atomic rename, so a crash
//! leaves either the old file or the new one, never a half-written mix.
//!
//! `serde_json::Value` cannot travel through bincode (it needs a
//! self-describing format), so the Page payload is stored as a JSON
//! string inside the bincode frame.

use crate::ports::outbound::{PageStore, RollupStore};
use serde::{Deserialize, Serialize};
use shared_types::{BlockSignature, Hash, Page, PageState, RollupRecord, StorageError, Tier};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const PAGES_FILE: &str = "pages.bin";

/// Frame one record into `buf`.
fn push_record(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(bytes).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Walk a record stream, verifying each frame's checksum.
fn read_records(path: &Path, bytes: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
    let file = path.display().to_string();
    let mut records = Vec::new();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        if cursor + 8 > bytes.len() {
            return Err(StorageError::Decode(format!(
                "{file}: truncated frame header at offset {cursor}"
            )));
        }
        let len = u32::from_le_bytes(
            bytes[cursor..cursor + 4]
                .try_into()
                .map_err(|_| StorageError::Decode(format!("{file}: bad frame length")))?,
        ) as usize;
        let stored_crc = u32::from_le_bytes(
            bytes[cursor + 4..cursor + 8]
                .try_into()
                .map_err(|_| StorageError::Decode(format!("{file}: bad frame checksum")))?,
        );
        cursor += 8;

        if cursor + len > bytes.len() {
            return Err(StorageError::Decode(format!(
                "{file}: truncated record at offset {cursor}"
            )));
        }
        let body = &bytes[cursor..cursor + len];
        if crc32fast::hash(body) != stored_crc {
            return Err(StorageError::ChecksumMismatch { file, offset: cursor as u64 });
        }
        records.push(body.to_vec());
        cursor += len;
    }

    Ok(records)
}

/// Rewrite `path` atomically with the framed `buf`.
fn write_atomic(path: &Path, buf: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp = path.with_extension("tmp");
    let mut file = fs::File::create(&temp)?;
    file.write_all(buf)?;
    file.sync_all()?;
    fs::rename(&temp, path)?;
    Ok(())
}

/// Disk shape of a Page. Identical to [`Page`] except that the payload is
/// carried as a JSON string.
#[derive(Serialize, Deserialize)]
struct StoredPage {
    index: u64,
    prior_hash: Hash,
    hash: Hash,
    action: String,
    payload_json: String,
    submitter: String,
    timestamp: u64,
    signatures: Vec<BlockSignature>,
    state: PageState,
}

impl StoredPage {
    fn from_page(page: &Page) -> Result<Self, StorageError> {
        Ok(Self {
            index: page.index,
            prior_hash: page.prior_hash,
            hash: page.hash,
            action: page.action.clone(),
            payload_json: serde_json::to_string(&page.payload)
                .map_err(|e| StorageError::Encode(e.to_string()))?,
            submitter: page.submitter.clone(),
            timestamp: page.timestamp,
            signatures: page.signatures.clone(),
            state: page.state,
        })
    }

    fn into_page(self) -> Result<Page, StorageError> {
        Ok(Page {
            index: self.index,
            prior_hash: self.prior_hash,
            hash: self.hash,
            action: self.action,
            payload: serde_json::from_str(&self.payload_json)
                .map_err(|e| StorageError::Decode(e.to_string()))?,
            submitter: self.submitter,
            timestamp: self.timestamp,
            signatures: self.signatures,
            state: self.state,
        })
    }
}

/// Page chain persisted to `<data_dir>/pages.bin`.
pub struct FilePageStore {
    pages: Vec<Page>,
    path: PathBuf,
}

impl FilePageStore {
    /// Open the store, loading any existing chain.
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let path = data_dir.join(PAGES_FILE);
        let pages = Self::load(&path)?;
        if !pages.is_empty() {
            info!(path = %path.display(), pages = pages.len(), "Loaded page chain");
        }
        Ok(Self { pages, path })
    }

    fn load(path: &Path) -> Result<Vec<Page>, StorageError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(path)?;
        read_records(path, &bytes)?
            .into_iter()
            .map(|body| {
                bincode::deserialize::<StoredPage>(&body)
                    .map_err(|e| StorageError::Decode(e.to_string()))?
                    .into_page()
            })
            .collect()
    }

    fn save(&self) -> Result<(), StorageError> {
        let mut buf = Vec::new();
        for page in &self.pages {
            let body = bincode::serialize(&StoredPage::from_page(page)?)
                .map_err(|e| StorageError::Encode(e.to_string()))?;
            push_record(&mut buf, &body);
        }
        write_atomic(&self.path, &buf)
    }
}

impl PageStore for FilePageStore {
    fn append(&mut self, page: Page) -> Result<(), StorageError> {
        self.pages.push(page);
        self.save()
    }

    fn update_state(&mut self, index: u64, state: PageState) -> Result<(), StorageError> {
        match self.pages.get_mut(index as usize) {
            Some(page) => {
                page.state = state;
                self.save()
            }
            None => Err(StorageError::Decode(format!("no page at index {index}"))),
        }
    }

    fn page_at(&self, index: u64) -> Result<Option<Page>, StorageError> {
        Ok(self.pages.get(index as usize).cloned())
    }

    fn pages_in(&self, start: u64, end: u64) -> Result<Vec<Page>, StorageError> {
        if start > end || start as usize >= self.pages.len() {
            return Ok(Vec::new());
        }
        let end = (end as usize).min(self.pages.len() - 1);
        Ok(self.pages[start as usize..=end].to_vec())
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
        let removed = self.pages.split_off(index);
        self.save()?;
        Ok(removed)
    }
}

/// Rollup chains persisted to `<data_dir>/<tier>.bin`, one file per tier.
pub struct FileRollupStore {
    chains: BTreeMap<Tier, Vec<RollupRecord>>,
    dir: PathBuf,
}

impl FileRollupStore {
    /// Open the store, loading every tier file that exists.
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let mut chains = BTreeMap::new();
        for tier in Tier::ROLLUPS {
            let path = Self::tier_path(data_dir, tier);
            if !path.exists() {
                continue;
            }
            let bytes = fs::read(&path)?;
            let records: Vec<RollupRecord> = read_records(&path, &bytes)?
                .into_iter()
                .map(|body| {
                    bincode::deserialize(&body).map_err(|e| StorageError::Decode(e.to_string()))
                })
                .collect::<Result<_, _>>()?;
            if !records.is_empty() {
                info!(%tier, records = records.len(), "Loaded rollup chain");
                chains.insert(tier, records);
            }
        }
        Ok(Self { chains, dir: data_dir.to_path_buf() })
    }

    fn tier_path(dir: &Path, tier: Tier) -> PathBuf {
        dir.join(format!("{tier}.bin"))
    }

    fn save_tier(&self, tier: Tier) -> Result<(), StorageError> {
        let mut buf = Vec::new();
        for record in self.chains.get(&tier).map_or(&[][..], |c| c.as_slice()) {
            let body = bincode::serialize(record)
                .map_err(|e| StorageError::Encode(e.to_string()))?;
            push_record(&mut buf, &body);
        }
        write_atomic(&Self::tier_path(&self.dir, tier), &buf)
    }
}

impl RollupStore for FileRollupStore {
    fn append(&mut self, record: RollupRecord) -> Result<(), StorageError> {
        let tier = record.tier;
        self.chains.entry(tier).or_default().push(record);
        self.save_tier(tier)
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
                self.save_tier(tier)
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
