//! # Ledger Configuration
//!
//! Payload limits and rollup windows. Rollup windows are deployment
//! configuration, never derived state, and must be identical across all
//! nodes of a deployment or their rollup shapes diverge.

use serde::{Deserialize, Serialize};
use shared_types::Tier;

/// When a tier seals the tier below it.
///
/// Either trigger may be unset; when both are set, the count window is
/// checked first. A tier with neither trigger never rolls up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupWindow {
    /// Seal after this many finalized lower-tier records.
    pub count: Option<u64>,
    /// Seal lower-tier records in fixed wall-clock windows of this many
    /// milliseconds, aligned to the epoch.
    pub duration_ms: Option<u64>,
}

impl RollupWindow {
    /// A window that never triggers.
    pub const NEVER: RollupWindow = RollupWindow { count: None, duration_ms: None };
}

/// Per-tier rollup windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollupSchedule {
    /// Pages -> Chapter.
    pub chapter: RollupWindow,
    /// Chapters -> Book.
    pub book: RollupWindow,
    /// Books -> Part.
    pub part: RollupWindow,
    /// Parts -> Series.
    pub series: RollupWindow,
}

impl RollupSchedule {
    /// Window configuration for a rollup tier. `Tier::Page` has none.
    #[must_use]
    pub fn window_for(&self, tier: Tier) -> Option<RollupWindow> {
        match tier {
            Tier::Page => None,
            Tier::Chapter => Some(self.chapter),
            Tier::Book => Some(self.book),
            Tier::Part => Some(self.part),
            Tier::Series => Some(self.series),
        }
    }
}

impl Default for RollupSchedule {
    fn default() -> Self {
        const DAY_MS: u64 = 86_400_000;
        Self {
            chapter: RollupWindow { count: Some(100), duration_ms: Some(DAY_MS) },
            book: RollupWindow { count: Some(30), duration_ms: Some(30 * DAY_MS) },
            part: RollupWindow { count: Some(12), duration_ms: Some(365 * DAY_MS) },
            series: RollupWindow { count: Some(10), duration_ms: Some(3_650 * DAY_MS) },
        }
    }
}

/// Ledger-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum serialized payload size accepted by `append`, in bytes.
    pub max_payload_bytes: usize,
    /// Rollup windows per tier.
    pub rollup: RollupSchedule,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024,
            rollup: RollupSchedule::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_covers_every_rollup_tier() {
        let schedule = RollupSchedule::default();
        for tier in Tier::ROLLUPS {
            let window = schedule.window_for(tier).unwrap();
            assert!(window.count.is_some());
        }
        assert!(schedule.window_for(Tier::Page).is_none());
    }

    #[test]
    fn test_config_parses_partial_toml() {
        let config: LedgerConfig = toml::from_str(
            r#"
            max_payload_bytes = 1024

            [rollup.chapter]
            count = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.max_payload_bytes, 1024);
        assert_eq!(config.rollup.chapter.count, Some(5));
        assert_eq!(config.rollup.chapter.duration_ms, None);
        // Unspecified tiers keep their defaults.
        assert_eq!(config.rollup.book, RollupSchedule::default().book);
    }
}
