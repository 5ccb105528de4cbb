//! Snapshot cadence
//!
//! A fixed "every N versions" rule. N is chosen per aggregate type; it trades
//! replay cost against write amplification and never adapts at runtime.

/// Snapshot every `interval` versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCadence {
    interval: i64,
}

impl SnapshotCadence {
    /// Cadence used for high-churn aggregates
    pub const HIGH_CHURN: Self = Self::every(5);

    /// Cadence used for low-churn aggregates
    pub const LOW_CHURN: Self = Self::every(50);

    /// Snapshot whenever the version is a multiple of `interval`.
    /// An interval below 1 disables snapshots.
    pub const fn every(interval: i64) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// True when `(current_version + newly_applied) mod N == 0`
    pub fn should_snapshot(&self, current_version: i64, newly_applied: usize) -> bool {
        if self.interval < 1 || newly_applied == 0 {
            return false;
        }
        let next_version = current_version + newly_applied as i64;
        next_version > 0 && next_version % self.interval == 0
    }
}
