//! # Registry Service
//!
//! Application service layer that implements the `RegistryApi` trait.
//!
//! ## Transition atomicity
//!
//! A lifecycle transition must end up in both the in-memory state and the
//! audit trail, or in neither. The write lock cannot be held across the
//! async audit call, so transitions claim their state change under the
//! lock first, then record through the sink, and roll the claim back if
//! the sink fails. The early claim also makes concurrent duplicate
//! registrations lose deterministically.

use crate::domain::eligibility::EligibilityPolicy;
use crate::domain::entities::{
    LifecycleRecord, LifecycleTransition, TermBounds, Validator, ValidatorInfo,
};
use crate::domain::errors::RegistryError;
use crate::ports::inbound::RegistryApi;
use crate::ports::outbound::AuditSink;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_bus::{EventPublisher, LedgerEvent};
use shared_types::{
    AuthorizationError, PublicKeyBytes, TimeSource, ValidationError, ValidatorId, ValidatorRole,
    ValidatorStatus,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Validator Registry Service.
pub struct RegistryService<A: AuditSink> {
    state: RwLock<BTreeMap<ValidatorId, Validator>>,
    policy: EligibilityPolicy,
    audit: A,
    bus: Arc<dyn EventPublisher>,
    clock: Arc<dyn TimeSource>,
}

impl<A: AuditSink> RegistryService<A> {
    /// Create an empty registry.
    pub fn new(
        policy: EligibilityPolicy,
        audit: A,
        bus: Arc<dyn EventPublisher>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            state: RwLock::new(BTreeMap::new()),
            policy,
            audit,
            bus,
            clock,
        }
    }

    /// Install the bootstrap validator set without audit Pages.
    ///
    /// Used exactly once, before the ledger accepts appends; the runtime
    /// records these validators in the genesis Page payload instead.
    /// All-or-nothing: every entry is validated before any is inserted.
    pub fn install_genesis(
        &self,
        entries: Vec<(ValidatorId, PublicKeyBytes, ValidatorRole, TermBounds)>,
    ) -> Result<usize, RegistryError> {
        let now = self.clock.now_ms();

        for (identity, _, role, term) in &entries {
            term.validate()?;
            self.policy.ensure_permits(*role)?;
            if self.state.read().contains_key(identity) {
                return Err(AuthorizationError::DuplicateValidator(identity.clone()).into());
            }
        }

        let mut state = self.state.write();
        let count = entries.len();
        for (identity, public_key, role, term) in entries {
            if state.contains_key(&identity) {
                return Err(AuthorizationError::DuplicateValidator(identity).into());
            }
            info!(validator = %identity, %role, "Genesis validator installed");
            state.insert(
                identity.clone(),
                Validator {
                    identity,
                    public_key,
                    role,
                    status: ValidatorStatus::Active,
                    term,
                    registered_at: now,
                    history: vec![LifecycleRecord {
                        transition: LifecycleTransition::Registered,
                        at: now,
                        reason: "genesis".into(),
                    }],
                },
            );
        }
        Ok(count)
    }

    /// Drop every registered validator.
    ///
    /// Only meaningful right before a full [`replay`](Self::replay) pass:
    /// when the chain that feeds replay has been rewritten, for example
    /// after adopting a peer's branch, the state derived from the old
    /// chain must go with it.
    pub fn reset(&self) {
        self.state.write().clear();
    }

    /// Re-apply one lifecycle transition recorded on the chain.
    ///
    /// Used at startup to rebuild registry state from the ledger's audit
    /// Pages. The chain already finalized these transitions, so replay
    /// skips the eligibility policy (the policy in force now may be
    /// narrower than the one in force then), records nothing through the
    /// audit sink, and publishes no events. `at` is the Page's original
    /// timestamp; term and activity checks are evaluated against it.
    pub fn replay(&self, action: &str, payload: &Value, at: u64) -> Result<(), RegistryError> {
        match action {
            "validator.registered" => {
                let record: RegisteredPayload = parse_payload(action, payload)?;
                record.term.validate()?;
                let identity = ValidatorId::new(record.identity);
                let public_key = decode_key(&record.public_key)?;

                let mut state = self.state.write();
                if state.contains_key(&identity) {
                    return Err(AuthorizationError::DuplicateValidator(identity).into());
                }
                state.insert(
                    identity.clone(),
                    Validator {
                        identity,
                        public_key,
                        role: record.role,
                        status: ValidatorStatus::Active,
                        term: record.term,
                        registered_at: at,
                        history: vec![LifecycleRecord {
                            transition: LifecycleTransition::Registered,
                            at,
                            reason: "registered".into(),
                        }],
                    },
                );
                Ok(())
            }
            "validator.deactivated" => {
                let record: LifecyclePayload = parse_payload(action, payload)?;
                let identity = ValidatorId::new(record.identity);
                let mut state = self.state.write();
                let validator = state
                    .get_mut(&identity)
                    .ok_or_else(|| AuthorizationError::UnknownValidator(identity.clone()))?;
                validator.status = ValidatorStatus::Inactive;
                validator.history.push(LifecycleRecord {
                    transition: LifecycleTransition::Deactivated,
                    at,
                    reason: record.reason,
                });
                Ok(())
            }
            "validator.reactivated" => {
                let record: LifecyclePayload = parse_payload(action, payload)?;
                let identity = ValidatorId::new(record.identity);
                let mut state = self.state.write();
                let validator = state
                    .get_mut(&identity)
                    .ok_or_else(|| AuthorizationError::UnknownValidator(identity.clone()))?;
                validator.status = ValidatorStatus::Active;
                validator.history.push(LifecycleRecord {
                    transition: LifecycleTransition::Reactivated,
                    at,
                    reason: record.reason,
                });
                Ok(())
            }
            other => Err(ValidationError::BadActionLabel(other.to_string()).into()),
        }
    }
}

/// Shape of the `validator.registered` audit payload.
#[derive(Deserialize)]
struct RegisteredPayload {
    identity: String,
    public_key: String,
    role: ValidatorRole,
    term: TermBounds,
}

/// Shape of the `validator.deactivated` / `validator.reactivated` payloads.
#[derive(Deserialize)]
struct LifecyclePayload {
    identity: String,
    reason: String,
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    action: &str,
    payload: &Value,
) -> Result<T, RegistryError> {
    serde_json::from_value(payload.clone()).map_err(|e| {
        RegistryError::Validation(ValidationError::Serialization(format!(
            "{action} payload: {e}"
        )))
    })
}

fn decode_key(hex_key: &str) -> Result<PublicKeyBytes, RegistryError> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| ValidationError::MalformedKey(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ValidationError::MalformedKey("expected 32 bytes".into()).into())
}

#[async_trait]
impl<A: AuditSink> RegistryApi for RegistryService<A> {
    async fn register(
        &self,
        identity: ValidatorId,
        public_key: PublicKeyBytes,
        role: ValidatorRole,
        term: TermBounds,
    ) -> Result<Validator, RegistryError> {
        term.validate()?;
        self.policy.ensure_permits(role)?;

        let now = self.clock.now_ms();
        let validator = Validator {
            identity: identity.clone(),
            public_key,
            role,
            status: ValidatorStatus::Active,
            term,
            registered_at: now,
            history: vec![LifecycleRecord {
                transition: LifecycleTransition::Registered,
                at: now,
                reason: "registered".into(),
            }],
        };

        // Claim the identity before the async audit call.
        {
            let mut state = self.state.write();
            if state.contains_key(&identity) {
                return Err(AuthorizationError::DuplicateValidator(identity).into());
            }
            state.insert(identity.clone(), validator.clone());
        }

        let payload = json!({
            "identity": identity.as_str(),
            "public_key": hex::encode(public_key),
            "role": role.to_string(),
            "term": { "start": term.start, "until": term.until },
        });
        if let Err(e) = self.audit.record("validator.registered", payload).await {
            warn!(validator = %identity, error = %e, "Registration audit failed, rolling back");
            self.state.write().remove(&identity);
            return Err(RegistryError::Audit(e.to_string()));
        }

        info!(validator = %identity, %role, "Validator registered");
        self.bus
            .publish(LedgerEvent::ValidatorRegistered { id: identity, role })
            .await;
        Ok(validator)
    }

    async fn deactivate(&self, identity: &ValidatorId, reason: &str) -> Result<(), RegistryError> {
        let now = self.clock.now_ms();

        {
            let mut state = self.state.write();
            let validator = state
                .get_mut(identity)
                .ok_or_else(|| AuthorizationError::UnknownValidator(identity.clone()))?;
            if validator.status == ValidatorStatus::Inactive {
                return Err(AuthorizationError::InactiveValidator(identity.clone()).into());
            }
            validator.status = ValidatorStatus::Inactive;
            validator.history.push(LifecycleRecord {
                transition: LifecycleTransition::Deactivated,
                at: now,
                reason: reason.to_string(),
            });
        }

        let payload = json!({ "identity": identity.as_str(), "reason": reason });
        if let Err(e) = self.audit.record("validator.deactivated", payload).await {
            warn!(validator = %identity, error = %e, "Deactivation audit failed, rolling back");
            let mut state = self.state.write();
            if let Some(validator) = state.get_mut(identity) {
                validator.status = ValidatorStatus::Active;
                validator.history.pop();
            }
            return Err(RegistryError::Audit(e.to_string()));
        }

        info!(validator = %identity, reason, "Validator deactivated");
        self.bus
            .publish(LedgerEvent::ValidatorDeactivated { id: identity.clone() })
            .await;
        Ok(())
    }

    async fn reactivate(&self, identity: &ValidatorId, reason: &str) -> Result<(), RegistryError> {
        let now = self.clock.now_ms();

        {
            let mut state = self.state.write();
            let validator = state
                .get_mut(identity)
                .ok_or_else(|| AuthorizationError::UnknownValidator(identity.clone()))?;
            if validator.status == ValidatorStatus::Active {
                return Err(AuthorizationError::AlreadyActive(identity.clone()).into());
            }
            if now >= validator.term.until {
                return Err(AuthorizationError::TermExpired {
                    id: identity.clone(),
                    term_end: validator.term.until,
                    at: now,
                }
                .into());
            }
            validator.status = ValidatorStatus::Active;
            validator.history.push(LifecycleRecord {
                transition: LifecycleTransition::Reactivated,
                at: now,
                reason: reason.to_string(),
            });
        }

        let payload = json!({ "identity": identity.as_str(), "reason": reason });
        if let Err(e) = self.audit.record("validator.reactivated", payload).await {
            warn!(validator = %identity, error = %e, "Reactivation audit failed, rolling back");
            let mut state = self.state.write();
            if let Some(validator) = state.get_mut(identity) {
                validator.status = ValidatorStatus::Inactive;
                validator.history.pop();
            }
            return Err(RegistryError::Audit(e.to_string()));
        }

        info!(validator = %identity, reason, "Validator reactivated");
        self.bus
            .publish(LedgerEvent::ValidatorReactivated { id: identity.clone() })
            .await;
        Ok(())
    }

    fn active_validators(&self) -> Vec<Validator> {
        let now = self.clock.now_ms();
        self.state
            .read()
            .values()
            .filter(|v| v.is_eligible_at(now))
            .cloned()
            .collect()
    }

    fn info(&self, identity: &ValidatorId) -> Option<ValidatorInfo> {
        let now = self.clock.now_ms();
        self.state.read().get(identity).map(|v| ValidatorInfo {
            identity: v.identity.clone(),
            public_key: hex::encode(v.public_key),
            role: v.role,
            status: v.status,
            term: v.term,
            eligible_now: v.is_eligible_at(now),
            history: v.history.clone(),
        })
    }

    fn public_key_of(&self, identity: &ValidatorId) -> Option<PublicKeyBytes> {
        self.state.read().get(identity).map(|v| v.public_key)
    }

    fn was_active_at(&self, identity: &ValidatorId, ts: u64) -> bool {
        self.state
            .read()
            .get(identity)
            .is_some_and(|v| v.was_active_at(ts))
    }

    fn active_count_at(&self, ts: u64) -> usize {
        self.state
            .read()
            .values()
            .filter(|v| v.was_active_at(ts))
            .count()
    }
}
