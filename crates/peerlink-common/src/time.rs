// ============================================
// File: crates/peerlink-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Peers record their last successful I/O without taking a lock, so the
//! watch loop, writers and diagnostics can all read it concurrently.
//!
//! ## Main Functionality
//! - `AtomicInstant`: thread-safe `Instant` stored as nanoseconds since a
//!   process-wide reference point
//!
//! ## ⚠️ Important Note for Next Developer
//! - Relaxed ordering only: the value is advisory, never a synchronisation
//!   point
//! - Instants earlier than the reference clamp to the reference
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

// ============================================
// AtomicInstant
// ============================================

/// Thread-safe wrapper around [`Instant`].
///
/// # Example
/// ```
/// use peerlink_common::time::AtomicInstant;
/// use std::time::Duration;
///
/// let last_activity = AtomicInstant::now();
/// last_activity.touch();
/// assert!(!last_activity.is_idle(Duration::from_secs(60)));
/// ```
#[derive(Debug)]
pub struct AtomicInstant {
    nanos: AtomicU64,
}

impl AtomicInstant {
    fn reference() -> Instant {
        static REFERENCE: OnceLock<Instant> = OnceLock::new();
        *REFERENCE.get_or_init(Instant::now)
    }

    fn to_nanos(instant: Instant) -> u64 {
        instant
            .checked_duration_since(Self::reference())
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Creates a new `AtomicInstant` set to the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Creates a new `AtomicInstant` from an `Instant`.
    #[must_use]
    pub fn from_instant(instant: Instant) -> Self {
        Self {
            nanos: AtomicU64::new(Self::to_nanos(instant)),
        }
    }

    /// Loads the stored instant.
    #[must_use]
    pub fn load(&self) -> Instant {
        Self::reference() + Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    /// Stores a new instant.
    pub fn store(&self, instant: Instant) {
        self.nanos.store(Self::to_nanos(instant), Ordering::Relaxed);
    }

    /// Moves the stored instant to now.
    pub fn touch(&self) {
        self.store(Instant::now());
    }

    /// Time elapsed since the stored instant.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.load().elapsed()
    }

    /// Returns `true` once more than `deadline` has passed since the
    /// stored instant.
    #[must_use]
    pub fn is_idle(&self, deadline: Duration) -> bool {
        self.idle_for() > deadline
    }
}

impl Default for AtomicInstant {
    fn default() -> Self {
        Self::now()
    }
}

impl Clone for AtomicInstant {
    fn clone(&self) -> Self {
        Self {
            nanos: AtomicU64::new(self.nanos.load(Ordering::Relaxed)),
        }
    }
}

// ============================================
// Tests
// ============================================
