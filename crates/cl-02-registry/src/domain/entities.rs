//! # Registry Entities
//!
//! The validator record, its term bounds, and its lifecycle history.

use serde::{Deserialize, Serialize};
use shared_types::{
    AuthorizationError, PublicKeyBytes, ValidationError, ValidatorId, ValidatorRole,
    ValidatorStatus,
};

/// Elected term window in Unix milliseconds, inclusive start, exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermBounds {
    /// Term start.
    pub start: u64,
    /// Term end. Eligibility ends the instant this is reached.
    pub until: u64,
}

impl TermBounds {
    /// Reject inverted bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start > self.until {
            return Err(ValidationError::InvertedTerm { start: self.start, end: self.until });
        }
        Ok(())
    }

    /// Whether `ts` falls inside the term window.
    #[must_use]
    pub fn contains(&self, ts: u64) -> bool {
        ts >= self.start && ts < self.until
    }
}

/// Kind of lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleTransition {
    /// Initial registration.
    Registered,
    /// Signing rights suspended.
    Deactivated,
    /// Signing rights restored within the same term.
    Reactivated,
}

/// One audited lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    /// What happened.
    pub transition: LifecycleTransition,
    /// When it happened, Unix ms.
    pub at: u64,
    /// Operator-supplied reason (term end, re-election, misconduct, ...).
    pub reason: String,
}

/// A registered validator. Never deleted; status changes are appended to
/// `history` so past eligibility stays answerable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    /// Unique identity.
    pub identity: ValidatorId,
    /// Published Ed25519 public key.
    pub public_key: PublicKeyBytes,
    /// Office held.
    pub role: ValidatorRole,
    /// Current status.
    pub status: ValidatorStatus,
    /// Elected term window.
    pub term: TermBounds,
    /// Registration time, Unix ms.
    pub registered_at: u64,
    /// Chronological lifecycle history, starting with `Registered`.
    pub history: Vec<LifecycleRecord>,
}

impl Validator {
    /// Check signing eligibility at `ts` against *current* status.
    ///
    /// For questions about the past use [`was_active_at`], which replays
    /// the history instead of trusting the present.
    ///
    /// [`was_active_at`]: Validator::was_active_at
    pub fn ensure_eligible_at(&self, ts: u64) -> Result<(), AuthorizationError> {
        if self.status != ValidatorStatus::Active {
            return Err(AuthorizationError::InactiveValidator(self.identity.clone()));
        }
        if ts < self.term.start {
            return Err(AuthorizationError::TermNotStarted {
                id: self.identity.clone(),
                term_start: self.term.start,
                at: ts,
            });
        }
        if ts >= self.term.until {
            return Err(AuthorizationError::TermExpired {
                id: self.identity.clone(),
                term_end: self.term.until,
                at: ts,
            });
        }
        Ok(())
    }

    /// Boolean form of [`ensure_eligible_at`].
    ///
    /// [`ensure_eligible_at`]: Validator::ensure_eligible_at
    #[must_use]
    pub fn is_eligible_at(&self, ts: u64) -> bool {
        self.ensure_eligible_at(ts).is_ok()
    }

    /// Whether this validator was active and within term at `ts`, decided
    /// by replaying the lifecycle history.
    ///
    /// A validator deactivated at time T reports inactive for every
    /// `ts >= T` until a later reactivation, regardless of current status.
    #[must_use]
    pub fn was_active_at(&self, ts: u64) -> bool {
        if !self.term.contains(ts) {
            return false;
        }

        let mut active = false;
        for record in &self.history {
            if record.at > ts {
                break;
            }
            active = !matches!(record.transition, LifecycleTransition::Deactivated);
        }
        active
    }
}

/// Diagnostic snapshot of one validator, with eligibility pre-evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorInfo {
    /// Identity.
    pub identity: ValidatorId,
    /// Hex-encoded public key.
    pub public_key: String,
    /// Office held.
    pub role: ValidatorRole,
    /// Current status.
    pub status: ValidatorStatus,
    /// Elected term window.
    pub term: TermBounds,
    /// Whether the validator may sign right now.
    pub eligible_now: bool,
    /// Full lifecycle history.
    pub history: Vec<LifecycleRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator_with_history(history: Vec<LifecycleRecord>) -> Validator {
        Validator {
            identity: ValidatorId::new("treasurer"),
            public_key: [1u8; 32],
            role: ValidatorRole::Treasurer,
            status: ValidatorStatus::Active,
            term: TermBounds { start: 100, until: 10_000 },
            registered_at: 100,
            history,
        }
    }

    fn record(transition: LifecycleTransition, at: u64) -> LifecycleRecord {
        LifecycleRecord { transition, at, reason: "test".into() }
    }

    #[test]
    fn test_term_bounds_validation() {
        assert!(TermBounds { start: 1, until: 2 }.validate().is_ok());
        assert!(matches!(
            TermBounds { start: 5, until: 2 }.validate(),
            Err(ValidationError::InvertedTerm { start: 5, end: 2 })
        ));
    }

    #[test]
    fn test_eligibility_respects_term_window() {
        let v = validator_with_history(vec![record(LifecycleTransition::Registered, 100)]);

        assert!(matches!(
            v.ensure_eligible_at(50),
            Err(AuthorizationError::TermNotStarted { .. })
        ));
        assert!(v.ensure_eligible_at(5_000).is_ok());
        assert!(matches!(
            v.ensure_eligible_at(10_000),
            Err(AuthorizationError::TermExpired { .. })
        ));
    }

    #[test]
    fn test_eligibility_requires_active_status() {
        let mut v = validator_with_history(vec![record(LifecycleTransition::Registered, 100)]);
        v.status = ValidatorStatus::Inactive;

        assert!(matches!(
            v.ensure_eligible_at(5_000),
            Err(AuthorizationError::InactiveValidator(_))
        ));
    }

    #[test]
    fn test_history_replay_tracks_deactivation_windows() {
        let v = validator_with_history(vec![
            record(LifecycleTransition::Registered, 100),
            record(LifecycleTransition::Deactivated, 1_000),
            record(LifecycleTransition::Reactivated, 2_000),
        ]);

        assert!(!v.was_active_at(99)); // before registration
        assert!(v.was_active_at(500)); // first active window
        assert!(!v.was_active_at(1_000)); // instant of deactivation
        assert!(!v.was_active_at(1_999)); // deactivated window
        assert!(v.was_active_at(2_500)); // after reactivation
        assert!(!v.was_active_at(10_000)); // past term end
    }

    #[test]
    fn test_history_replay_ignores_current_status() {
        // Currently inactive, but was active at ts=500.
        let mut v = validator_with_history(vec![
            record(LifecycleTransition::Registered, 100),
            record(LifecycleTransition::Deactivated, 1_000),
        ]);
        v.status = ValidatorStatus::Inactive;

        assert!(v.was_active_at(500));
        assert!(!v.was_active_at(1_500));
    }
}
