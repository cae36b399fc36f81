// crates/spec-desk-core/src/core/time.rs
// ============================================================================
// Module: Spec Desk Time Model
// Description: Canonical timestamp representation for review and evidence records.
// Purpose: Provide deterministic, caller-supplied time values across Spec Desk records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Spec Desk uses explicit time values embedded in review actions and
//! evidence records so replays and tests stay deterministic. The core never
//! reads wall-clock time directly; hosts supply timestamps at the boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Milliseconds per day, used for freshness-decay age computation.
const MILLIS_PER_DAY: i64 = 86_400_000;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp in unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the non-negative age in fractional days relative to `now`.
    ///
    /// A timestamp in the future of `now` has age zero.
    #[must_use]
    pub fn age_days(self, now: Self) -> f64 {
        let delta = now.0.saturating_sub(self.0).max(0);
        #[allow(clippy::cast_precision_loss, reason = "ages far below 2^52 days")]
        {
            delta as f64 / MILLIS_PER_DAY as f64
        }
    }

    /// Returns the non-negative elapsed seconds relative to `now`.
    ///
    /// A timestamp in the future of `now` yields zero.
    #[must_use]
    pub fn elapsed_seconds(self, now: Self) -> f64 {
        let delta = now.0.saturating_sub(self.0).max(0);
        #[allow(clippy::cast_precision_loss, reason = "spans far below 2^52 seconds")]
        {
            delta as f64 / 1_000.0
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
