//! Genesis roster handling and registry reconstruction.
//!
//! The registry is derived state: its source of truth is the chain. The
//! genesis Page carries the bootstrap roster in its payload, and every
//! later lifecycle change is a `validator.*` Page submitted by the
//! registry's audit sink. This module turns the configured roster into
//! that payload at first boot and replays the chain back into a fresh
//! registry on every later start.
//!
//! Roster entries use the exact shape of the `validator.registered` audit
//! payload, so one replay path in `cl-02` covers both.

use crate::adapters::audit::REGISTRY_SUBMITTER;
use crate::adapters::LedgerAuditSink;
use crate::config::{GenesisSection, SELF_KEY};
use anyhow::{bail, Context};
use cl_02_registry::{RegistryService, TermBounds};
use cl_03_ledger::{HistoryFilter, LedgerApi};
use serde_json::{json, Value};
use shared_types::{Page, PublicKeyBytes, ValidatorId, ValidatorRole};
use std::collections::BTreeMap;

/// One resolved roster entry, in the form `RegistryService::install_genesis`
/// takes.
pub type RosterEntry = (ValidatorId, PublicKeyBytes, ValidatorRole, TermBounds);

/// Resolve the configured roster into concrete keys. [`SELF_KEY`] entries
/// resolve against the seeds this node custodies.
pub fn roster_from_config(
    section: &GenesisSection,
    held_keys: &BTreeMap<String, PublicKeyBytes>,
) -> anyhow::Result<Vec<RosterEntry>> {
    let mut roster = Vec::with_capacity(section.validators.len());
    for entry in &section.validators {
        let key = if entry.public_key == SELF_KEY {
            *held_keys.get(&entry.identity).with_context(|| {
                format!(
                    "genesis key for {:?} is {SELF_KEY:?} but no seed for it is held",
                    entry.identity
                )
            })?
        } else {
            decode_hex_key(&entry.public_key)
                .with_context(|| format!("genesis key for {:?}", entry.identity))?
        };
        roster.push((
            ValidatorId::new(entry.identity.clone()),
            key,
            entry.role,
            TermBounds { start: entry.term_start, until: entry.term_until },
        ));
    }
    Ok(roster)
}

fn decode_hex_key(hex_key: &str) -> anyhow::Result<PublicKeyBytes> {
    let bytes = hex::decode(hex_key).context("key is not hex")?;
    bytes.try_into().map_err(|_| anyhow::anyhow!("key must be 32 bytes"))
}

/// Build the genesis Page payload for a roster.
pub fn genesis_payload(series: &str, roster: &[RosterEntry]) -> Value {
    let validators: Vec<Value> = roster
        .iter()
        .map(|(identity, key, role, term)| {
            json!({
                "identity": identity.as_str(),
                "public_key": hex::encode(key),
                "role": role.to_string(),
                "term": { "start": term.start, "until": term.until },
            })
        })
        .collect();
    json!({ "series": series, "validators": validators })
}

/// Install genesis into the registry and commit the genesis Page.
///
/// The roster goes into the registry first so the chain's validator
/// directory is populated before anything else can append.
pub async fn install(
    series: &str,
    roster: Vec<RosterEntry>,
    registry: &RegistryService<LedgerAuditSink>,
    ledger: &dyn LedgerApi,
) -> anyhow::Result<Page> {
    if roster.is_empty() {
        bail!("genesis roster is empty");
    }
    let payload = genesis_payload(series, &roster);
    registry.install_genesis(roster).context("installing the genesis roster")?;
    let page = ledger.install_genesis(payload).await.context("committing the genesis Page")?;
    Ok(page)
}

/// Re-apply a genesis payload's roster at the Page's recorded timestamp.
pub fn replay_roster(
    registry: &RegistryService<LedgerAuditSink>,
    payload: &Value,
    at: u64,
) -> anyhow::Result<usize> {
    let entries = payload
        .get("validators")
        .and_then(Value::as_array)
        .context("genesis payload has no validators array")?;
    for entry in entries {
        registry
            .replay("validator.registered", entry, at)
            .context("replaying a genesis roster entry")?;
    }
    Ok(entries.len())
}

/// Rebuild registry state from the chain: the genesis roster plus every
/// lifecycle Page, each applied at its Page's own timestamp so historical
/// activity checks land where they did live.
///
/// Returns the number of transitions replayed; zero on an empty chain.
pub fn rebuild_registry(
    ledger: &dyn LedgerApi,
    registry: &RegistryService<LedgerAuditSink>,
) -> anyhow::Result<usize> {
    let Some(genesis) = ledger.page_at(0).context("reading the genesis Page")? else {
        return Ok(0);
    };
    let mut replayed = replay_roster(registry, &genesis.payload, genesis.timestamp)?;

    let lifecycle = HistoryFilter::all().submitter(REGISTRY_SUBMITTER);
    for page in ledger.read_history(&lifecycle).context("reading lifecycle Pages")? {
        if !page.action.starts_with("validator.") {
            continue;
        }
        registry
            .replay(&page.action, &page.payload, page.timestamp)
            .with_context(|| format!("replaying {} from Page {}", page.action, page.index))?;
        replayed += 1;
    }
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenesisValidator;
    use cl_02_registry::{EligibilityPolicy, RegistryApi};
    use shared_bus::InMemoryEventBus;
    use shared_types::FixedTimeSource;
    use std::sync::Arc;

    fn section(entries: Vec<GenesisValidator>) -> GenesisSection {
        GenesisSection { series: "test-series".into(), validators: entries }
    }

    fn entry(identity: &str, public_key: &str) -> GenesisValidator {
        GenesisValidator {
            identity: identity.into(),
            public_key: public_key.into(),
            role: ValidatorRole::Chair,
            term_start: 0,
            term_until: 1_000_000,
        }
    }

    fn fresh_registry(at: u64) -> RegistryService<LedgerAuditSink> {
        RegistryService::new(
            EligibilityPolicy::default(),
            LedgerAuditSink::detached(),
            Arc::new(InMemoryEventBus::new()),
            Arc::new(FixedTimeSource::at(at)),
        )
    }

    #[test]
    fn test_roster_resolves_self_against_held_seeds() {
        let mut held = BTreeMap::new();
        held.insert("chair-1".to_string(), [9u8; 32]);

        let roster = roster_from_config(
            &section(vec![entry("chair-1", SELF_KEY), entry("clerk-1", &hex::encode([4u8; 32]))]),
            &held,
        )
        .unwrap();

        assert_eq!(roster[0].1, [9u8; 32]);
        assert_eq!(roster[1].1, [4u8; 32]);
    }

    #[test]
    fn test_roster_rejects_unheld_self_and_bad_hex() {
        let held = BTreeMap::new();
        assert!(roster_from_config(&section(vec![entry("ghost", SELF_KEY)]), &held).is_err());
        assert!(roster_from_config(&section(vec![entry("chair-1", "zz")]), &held).is_err());
    }

    #[test]
    fn test_payload_entries_replay_into_a_registry() {
        let roster = vec![(
            ValidatorId::new("chair-1"),
            [9u8; 32],
            ValidatorRole::Chair,
            TermBounds { start: 0, until: 1_000_000 },
        )];
        let payload = genesis_payload("test-series", &roster);
        assert_eq!(payload["series"], "test-series");

        let registry = fresh_registry(500);
        assert_eq!(replay_roster(&registry, &payload, 100).unwrap(), 1);
        assert!(registry.was_active_at(&ValidatorId::new("chair-1"), 100));
        assert!(!registry.was_active_at(&ValidatorId::new("chair-1"), 99));
    }

    #[test]
    fn test_replay_roster_rejects_a_rosterless_payload() {
        let registry = fresh_registry(500);
        assert!(replay_roster(&registry, &json!({ "series": "x" }), 100).is_err());
    }
}
