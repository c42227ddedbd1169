//! Expiry Scheduler
//!
//! Once per loop iteration the scheduler walks the live notifications in
//! stacking order and removes every one whose effective timeout has elapsed.
//!
//! # Index Shift
//!
//! ```text
//!   before:  [A] [B*] [C*] [D]      * = elapsed
//!             0   1    2    3
//!
//!   i=1  remove B  ->  [A] [C*] [D]   re-test i=1 (now C)
//!   i=1  remove C  ->  [A] [D]        re-test i=1 (now D)
//!   i=1  keep D    ->  i=2, done
//! ```
//!
//! Expiry is never early; with a ~16 ms loop it may be up to one iteration
//! late. Fading only changes opacity and never moves the expiry instant.

use crate::config::BehaviorConfig;
use crate::notification::NotificationId;

/// Timing fields the scheduler reads from one entry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntryTiming {
    /// Creation (or last replacement) time in milliseconds
    pub created_at: u64,
    /// Per-entry timeout; `None` uses the default
    pub expire_after: Option<u64>,
    /// Opacity currently displayed
    pub opacity: f32,
}

/// Collection the scheduler scans
///
/// Indices are stacking positions; removing index `i` shifts every later
/// entry down by one.
pub trait ExpiryTarget {
    /// Number of live entries
    fn entry_count(&self) -> usize;

    /// Timing of the entry at `index`
    fn timing_at(&self, index: usize) -> Option<EntryTiming>;

    /// Remove the entry at `index` because it expired
    fn expire_at(&mut self, index: usize) -> Option<NotificationId>;

    /// Show the entry at `index` with a new opacity
    fn fade_at(&mut self, index: usize, opacity: f32);
}

/// Per-tick timeout scan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryScheduler {
    default_duration_ms: u64,
    fade_ms: u64,
}

impl ExpiryScheduler {
    /// Create a scheduler
    #[must_use]
    pub fn new(default_duration_ms: u64, fade_ms: u64) -> Self {
        Self {
            default_duration_ms,
            fade_ms,
        }
    }

    /// Create a scheduler from the behavior configuration
    #[must_use]
    pub fn from_config(behavior: &BehaviorConfig) -> Self {
        Self::new(behavior.default_duration_ms, behavior.fade_ms)
    }

    /// Timeout that applies to an entry; 0 means it never expires
    #[must_use]
    pub fn effective_timeout(&self, expire_after: Option<u64>) -> u64 {
        expire_after.unwrap_or(self.default_duration_ms)
    }

    /// Whether an entry with this timing has expired at `now`
    #[must_use]
    pub fn is_expired(&self, timing: &EntryTiming, now: u64) -> bool {
        let timeout = self.effective_timeout(timing.expire_after);
        timeout != 0 && now.saturating_sub(timing.created_at) >= timeout
    }

    /// Opacity to show `elapsed` ms into a `timeout` ms lifetime
    ///
    /// Full until the last `fade_ms`, then stepping down in quarters.
    #[must_use]
    pub fn opacity_at(&self, elapsed: u64, timeout: u64) -> f32 {
        let fade = self.fade_ms.min(timeout);
        if timeout == 0 || fade == 0 {
            return 1.0;
        }

        let remaining = timeout.saturating_sub(elapsed);
        if remaining >= fade {
            return 1.0;
        }

        let fraction = remaining as f32 / fade as f32;
        ((fraction * 4.0).ceil() / 4.0).clamp(0.25, 1.0)
    }

    /// Scan `target` once, removing elapsed entries and updating fades
    ///
    /// Returns the ids removed, in the order they were removed.
    pub fn tick<T>(&self, target: &mut T, now: u64) -> Vec<NotificationId>
    where
        T: ExpiryTarget + ?Sized,
    {
        let mut expired = Vec::new();
        let mut index = 0;

        while index < target.entry_count() {
            let Some(timing) = target.timing_at(index) else {
                break;
            };

            if self.is_expired(&timing, now) {
                match target.expire_at(index) {
                    // The next entry now occupies `index`; test it before moving on
                    Some(id) => expired.push(id),
                    None => index += 1,
                }
                continue;
            }

            let timeout = self.effective_timeout(timing.expire_after);
            let opacity = self.opacity_at(now.saturating_sub(timing.created_at), timeout);
            if (opacity - timing.opacity).abs() > f32::EPSILON {
                target.fade_at(index, opacity);
            }

            index += 1;
        }

        expired
    }
}
