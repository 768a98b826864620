//! # Eligibility Policy
//!
//! Closed-set role eligibility. Which offices may sign is deployment
//! configuration; that ordinary members and observers may not is not.

use shared_types::{AuthorizationError, ValidatorRole};
use std::collections::BTreeSet;

/// The set of roles allowed to register as signing validators.
///
/// A policy can narrow the office set (e.g. chair and treasurer only) but
/// can never widen it: construction rejects any role that is not an
/// elected or appointed office.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityPolicy {
    eligible_roles: BTreeSet<ValidatorRole>,
}

impl EligibilityPolicy {
    /// Policy admitting every office role.
    #[must_use]
    pub fn offices() -> Self {
        Self { eligible_roles: ValidatorRole::OFFICES.into_iter().collect() }
    }

    /// Policy admitting exactly `roles`.
    ///
    /// # Errors
    ///
    /// `AuthorizationError::RoleNeverEligible` when `roles` contains
    /// `Member` or `Observer`.
    pub fn new(roles: impl IntoIterator<Item = ValidatorRole>) -> Result<Self, AuthorizationError> {
        let eligible_roles: BTreeSet<ValidatorRole> = roles.into_iter().collect();
        for role in &eligible_roles {
            if !role.is_office() {
                return Err(AuthorizationError::RoleNeverEligible { role: *role });
            }
        }
        Ok(Self { eligible_roles })
    }

    /// Whether `role` may register under this policy.
    #[must_use]
    pub fn permits(&self, role: ValidatorRole) -> bool {
        self.eligible_roles.contains(&role)
    }

    /// Check `role`, reporting why it is rejected.
    pub fn ensure_permits(&self, role: ValidatorRole) -> Result<(), AuthorizationError> {
        if !role.is_office() {
            return Err(AuthorizationError::RoleNeverEligible { role });
        }
        if !self.permits(role) {
            return Err(AuthorizationError::IneligibleRole { role });
        }
        Ok(())
    }
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::offices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_admits_all_offices() {
        let policy = EligibilityPolicy::default();
        for role in ValidatorRole::OFFICES {
            assert!(policy.permits(role), "{role} should be eligible by default");
        }
    }

    #[test]
    fn test_members_and_observers_never_eligible() {
        let policy = EligibilityPolicy::default();
        assert!(matches!(
            policy.ensure_permits(ValidatorRole::Member),
            Err(AuthorizationError::RoleNeverEligible { role: ValidatorRole::Member })
        ));
        assert!(!policy.permits(ValidatorRole::Observer));
    }

    #[test]
    fn test_policy_cannot_be_widened_past_offices() {
        let result = EligibilityPolicy::new([ValidatorRole::Chair, ValidatorRole::Member]);
        assert!(matches!(result, Err(AuthorizationError::RoleNeverEligible { .. })));
    }

    #[test]
    fn test_narrowed_policy_rejects_other_offices() {
        let policy = EligibilityPolicy::new([ValidatorRole::Chair]).unwrap();

        assert!(policy.permits(ValidatorRole::Chair));
        assert!(matches!(
            policy.ensure_permits(ValidatorRole::Treasurer),
            Err(AuthorizationError::IneligibleRole { role: ValidatorRole::Treasurer })
        ));
    }
}
