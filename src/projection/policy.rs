//! Projection policies
//!
//! How a projection reacts to version mismatches and how it rebuilds.

use std::str::FromStr;
use std::time::Duration;

/// What to do once version-mismatch retries are exhausted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriftPolicy {
    /// Log a warning and report success; rebuild corrects the drift later
    #[default]
    Tolerate,
    /// Return the mismatch to the caller
    Escalate,
}

impl FromStr for DriftPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tolerate" => Ok(Self::Tolerate),
            "escalate" => Ok(Self::Escalate),
            other => Err(format!("unknown drift policy: {}", other)),
        }
    }
}

/// Bounded retry for versioned projection updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
    pub drift: DriftPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
            drift: DriftPolicy::Tolerate,
        }
    }
}

/// How `rebuild` reconstructs the read model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RebuildStrategy {
    /// Replay the event log from the stored cursor
    #[default]
    Incremental,
    /// Delete all rows and copy from the latest snapshots
    FullCopy,
}

impl FromStr for RebuildStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "incremental" => Ok(Self::Incremental),
            "full_copy" | "full-copy" => Ok(Self::FullCopy),
            other => Err(format!("unknown rebuild strategy: {}", other)),
        }
    }
}
