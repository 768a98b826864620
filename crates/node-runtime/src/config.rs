//! # Node Configuration
//!
//! One TOML file describes a node end to end: network addresses, storage
//! location, signer custody, the genesis roster, and the tuning tables of
//! the subsystem crates. Every field has a default, so `civic-ledger`
//! with no file at all runs a memory-only standalone node.
//!
//! Environment variables override the file for the knobs a deployment
//! script most often needs to vary per instance: `CL_CONFIG` (file path),
//! `CL_HTTP_PORT`, `CL_DATA_DIR`, and `CL_BOOTSTRAP` (comma-separated
//! peer addresses).

use cl_03_ledger::LedgerConfig;
use cl_04_consensus::ConsensusConfig;
use cl_05_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use shared_types::ValidatorRole;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Placeholder accepted in `genesis.validators.public_key` for identities
/// whose seed lives on this node: the key is read from the keystore at
/// startup instead of being spelled out in the file.
pub const SELF_KEY: &str = "self";

/// Errors surfaced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {error}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        error: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("config file is not valid TOML: {0}")]
    Parse(String),

    /// The file parsed but describes an unusable node.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Process-level settings: addresses, storage, loop intervals.
    pub node: NodeSection,
    /// Which validator identities this node signs as.
    pub identity: IdentitySection,
    /// Bootstrap roster for a brand-new series.
    pub genesis: GenesisSection,
    /// Registry policy.
    pub registry: RegistrySection,
    /// Ledger tuning, passed through to `cl-03`.
    pub ledger: LedgerConfig,
    /// Consensus tuning, passed through to `cl-04`.
    pub consensus: ConsensusConfig,
    /// Synchronizer tuning, passed through to `cl-05`. `self_addr` and
    /// any `CL_BOOTSTRAP` override are filled in from `[node]` at build.
    pub sync: SyncConfig,
}

/// `[node]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Address the HTTP peer surface binds.
    pub listen: String,
    /// Address published to peers; defaults to `listen`.
    pub advertise: Option<String>,
    /// Storage directory. `None` keeps the chain in memory only.
    pub data_dir: Option<PathBuf>,
    /// How often the rollup scheduler checks for due windows.
    pub rollup_interval_ms: u64,
    /// How often a sync pass runs against the best-known peer.
    pub sync_interval_ms: u64,
    /// How often every known peer is heartbeated.
    pub heartbeat_interval_ms: u64,
    /// Timeout for one peer HTTP request.
    pub request_timeout_ms: u64,
    /// How long a submission fingerprint suppresses resubmission.
    pub dedup_ttl_ms: u64,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9300".into(),
            advertise: None,
            data_dir: None,
            rollup_interval_ms: 10_000,
            sync_interval_ms: 30_000,
            heartbeat_interval_ms: 15_000,
            request_timeout_ms: 5_000,
            dedup_ttl_ms: 60_000,
        }
    }
}

/// `[identity]` table.
///
/// A civic deployment commonly runs one authoritative signing node which
/// custodies several council members' seeds, plus replicating peers that
/// custody none. `co_signers` lists the additional identities this
/// process signs as.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    /// Primary validator identity of this node. Empty means the node
    /// holds no signer and only replicates.
    pub validator: String,
    /// Seed file for the primary identity. Relative paths resolve under
    /// `node.data_dir`; absent means `<data_dir>/signer.seed`, or an
    /// ephemeral in-memory key when there is no data dir.
    pub key_file: Option<PathBuf>,
    /// Further identities whose seeds this node custodies.
    pub co_signers: Vec<CoSigner>,
}

/// One `[[identity.co_signers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoSigner {
    /// Validator identity.
    pub validator: String,
    /// Seed file, resolved like `identity.key_file`; absent defaults to
    /// `<data_dir>/<validator>.seed`.
    pub key_file: Option<PathBuf>,
}

/// `[genesis]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisSection {
    /// Name recorded in the genesis Page payload.
    pub series: String,
    /// Bootstrap validator roster. May be empty on a node that joins an
    /// existing series through its bootstrap peers.
    pub validators: Vec<GenesisValidator>,
}

impl Default for GenesisSection {
    fn default() -> Self {
        Self { series: "civic-ledger".into(), validators: Vec::new() }
    }
}

/// One `[[genesis.validators]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Validator identity.
    pub identity: String,
    /// Ed25519 public key, 64 hex characters, or [`SELF_KEY`] for an
    /// identity custodied by this node.
    pub public_key: String,
    /// Office held.
    pub role: ValidatorRole,
    /// Term start, unix-ms.
    pub term_start: u64,
    /// Term end, unix-ms, exclusive.
    pub term_until: u64,
}

/// `[registry]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// Roles admitted to the validator registry. Must be office roles.
    pub eligible_roles: Vec<ValidatorRole>,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self { eligible_roles: ValidatorRole::OFFICES.to_vec() }
    }
}

impl NodeConfig {
    /// Read and parse one TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|error| ConfigError::Io { path: path.to_path_buf(), error })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build configuration from the environment: `CL_CONFIG` names the
    /// file (defaults apply without it), then the per-instance overrides
    /// are applied on top.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("CL_CONFIG") {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `CL_HTTP_PORT`, `CL_DATA_DIR` and `CL_BOOTSTRAP`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CL_HTTP_PORT") {
            match override_port(&self.node.listen, &port) {
                Some(listen) => self.node.listen = listen,
                None => warn!(%port, "CL_HTTP_PORT is not a valid port, keeping configured address"),
            }
        }
        if let Ok(dir) = std::env::var("CL_DATA_DIR") {
            self.node.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(peers) = std::env::var("CL_BOOTSTRAP") {
            self.sync.bootstrap_peers = split_peer_list(&peers);
        }
    }

    /// Address published to peers.
    pub fn advertise_addr(&self) -> &str {
        self.node.advertise.as_deref().unwrap_or(&self.node.listen)
    }

    /// Where the seed for `identity` lives, given its configured
    /// `key_file`. `None` means an ephemeral in-memory keypair.
    pub fn resolve_key_file(&self, key_file: Option<&Path>, default_name: &str) -> Option<PathBuf> {
        match (&self.node.data_dir, key_file) {
            (_, Some(path)) if path.is_absolute() => Some(path.to_path_buf()),
            (Some(dir), Some(path)) => Some(dir.join(path)),
            (Some(dir), None) => Some(dir.join(default_name)),
            (None, Some(path)) => Some(path.to_path_buf()),
            (None, None) => None,
        }
    }

    /// Identities this node custodies seeds for: the primary first, then
    /// the co-signers in file order.
    pub fn held_identities(&self) -> Vec<&str> {
        let mut held = Vec::with_capacity(1 + self.identity.co_signers.len());
        if !self.identity.validator.is_empty() {
            held.push(self.identity.validator.as_str());
        }
        held.extend(self.identity.co_signers.iter().map(|c| c.validator.as_str()));
        held
    }

    /// Reject configurations that cannot produce a working node.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_addr(&self.node.listen, "listen")?;
        if let Some(advertise) = &self.node.advertise {
            check_addr(advertise, "advertise")?;
        }

        for (value, what) in [
            (self.node.rollup_interval_ms, "node.rollup_interval_ms"),
            (self.node.sync_interval_ms, "node.sync_interval_ms"),
            (self.node.heartbeat_interval_ms, "node.heartbeat_interval_ms"),
            (self.node.request_timeout_ms, "node.request_timeout_ms"),
            (self.node.dedup_ttl_ms, "node.dedup_ttl_ms"),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{what} must be nonzero")));
            }
        }

        let held = self.held_identities();
        for co_signer in &self.identity.co_signers {
            if co_signer.validator.is_empty() {
                return Err(ConfigError::Invalid("co-signer identity is empty".into()));
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for identity in &held {
            if !seen.insert(*identity) {
                return Err(ConfigError::Invalid(format!(
                    "identity {identity:?} is listed more than once"
                )));
            }
        }

        let mut roster_ids = std::collections::BTreeSet::new();
        for entry in &self.genesis.validators {
            if entry.identity.is_empty() {
                return Err(ConfigError::Invalid("genesis validator identity is empty".into()));
            }
            if !roster_ids.insert(entry.identity.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "genesis roster lists {:?} twice",
                    entry.identity
                )));
            }
            if entry.public_key == SELF_KEY {
                if !held.contains(&entry.identity.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "genesis key for {:?} is {SELF_KEY:?} but this node holds no seed for it",
                        entry.identity
                    )));
                }
            } else if !matches!(hex::decode(&entry.public_key).map(|b| b.len()), Ok(32)) {
                return Err(ConfigError::Invalid(format!(
                    "genesis key for {:?} must be 64 hex characters or {SELF_KEY:?}",
                    entry.identity
                )));
            }
            if entry.term_start >= entry.term_until {
                return Err(ConfigError::Invalid(format!(
                    "genesis term for {:?} is inverted: {} >= {}",
                    entry.identity, entry.term_start, entry.term_until
                )));
            }
        }

        if self.registry.eligible_roles.is_empty() {
            return Err(ConfigError::Invalid("registry.eligible_roles is empty".into()));
        }
        for role in &self.registry.eligible_roles {
            if !role.is_office() {
                return Err(ConfigError::Invalid(format!(
                    "role {role} can never hold signing eligibility"
                )));
            }
        }

        Ok(())
    }
}

fn check_addr(addr: &str, what: &str) -> Result<(), ConfigError> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        return Err(ConfigError::Invalid(format!("{what} address {addr:?} must be host:port")));
    };
    if host.is_empty() {
        return Err(ConfigError::Invalid(format!("{what} address {addr:?} has no host")));
    }
    if port.parse::<u16>().is_err() {
        return Err(ConfigError::Invalid(format!("{what} port {port:?} is not a valid port")));
    }
    Ok(())
}

fn override_port(listen: &str, port: &str) -> Option<String> {
    let port: u16 = port.parse().ok()?;
    let (host, _) = listen.rsplit_once(':')?;
    Some(format!("{host}:{port}"))
}

fn split_peer_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
