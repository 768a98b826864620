//! Rollup window arithmetic.
//!
//! Decides, from an ordered list of still-open lower-tier records, whether
//! a window is due and how many leading records it seals. Membership is a
//! pure function of record timestamps and configuration; the local clock
//! only gates *when* a time window may seal, never *what* it seals, so all
//! nodes sharing a config seal identical ranges.

use super::config::RollupWindow;

/// What fired a due window. Carried for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTrigger {
    /// The configured record count was reached.
    Count,
    /// The wall-clock window closed at `window_end` (epoch-aligned, ms).
    Time { window_end: u64 },
}

/// A window ready to seal: the first `members` open records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    pub members: usize,
    pub trigger: WindowTrigger,
}

/// Check whether `window` is due over the open records with the given
/// ascending timestamps.
///
/// Count windows take priority over time windows and seal exactly the
/// configured number of records. Time windows are epoch-aligned: the first
/// open record picks the fixed window `[k*duration, (k+1)*duration)` it
/// falls into, and the window seals once it closes. A window counts as
/// closed when the local clock passes `window_end` *or* when any open
/// record is already timestamped past it, so a node with a slow clock
/// still seals the same range as its peers.
pub fn due_window(
    window: &RollupWindow,
    open_timestamps: &[u64],
    now_ms: u64,
) -> Option<DueWindow> {
    if open_timestamps.is_empty() {
        return None;
    }

    if let Some(count) = window.count {
        let count = count as usize;
        if count > 0 && open_timestamps.len() >= count {
            return Some(DueWindow { members: count, trigger: WindowTrigger::Count });
        }
    }

    if let Some(duration) = window.duration_ms.filter(|d| *d > 0) {
        let window_end = (open_timestamps[0] / duration + 1) * duration;
        let closed = now_ms >= window_end
            || open_timestamps.iter().any(|ts| *ts >= window_end);
        if closed {
            let members = open_timestamps
                .iter()
                .take_while(|ts| **ts < window_end)
                .count();
            // The first record is always inside its own window.
            debug_assert!(members >= 1);
            return Some(DueWindow { members, trigger: WindowTrigger::Time { window_end } });
        }
    }

    None
}
