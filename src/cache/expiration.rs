//! Expiration Policy Module
//!
//! Pure timestamp arithmetic for absolute and sliding expiration windows.
//! Callers supply "now", so nothing here reads a clock.

use chrono::{DateTime, Duration, Utc};

// == Expiration State ==
/// Expiration bookkeeping stored alongside every cache item.
///
/// Invariant: when both `absolute` and `sliding` are set,
/// `current <= absolute`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpirationState {
    /// Fixed deadline independent of access
    pub absolute: Option<DateTime<Utc>>,
    /// Window that restarts on every live read
    pub sliding: Option<Duration>,
    /// Next moment the item must be treated as dead, None = never
    pub current: Option<DateTime<Utc>>,
}

/// Outcome of reading an item at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDecision {
    /// Logical miss; the item should be removed
    Expired,
    /// Item is live; `refreshed` carries the new state when a sliding window moved
    Live { refreshed: Option<ExpirationState> },
}

impl ExpirationState {
    // == Never ==
    /// State for an item that never expires.
    pub fn never() -> Self {
        Self::default()
    }

    // == Compute Initial ==
    /// Computes the state written by `set` at `now`.
    pub fn compute_initial(
        now: DateTime<Utc>,
        absolute: Option<DateTime<Utc>>,
        sliding: Option<Duration>,
    ) -> Self {
        Self {
            absolute,
            sliding,
            current: deadline(now, absolute, sliding),
        }
    }

    // == Is Live ==
    /// An item is live while `now` is strictly before every deadline it has.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        let before = |deadline: Option<DateTime<Utc>>| deadline.map_or(true, |at| now < at);
        before(self.current) && before(self.absolute)
    }

    // == On Read ==
    /// Decides liveness at `now` and slides the window forward when one is set.
    ///
    /// The refreshed deadline is `min(now + sliding, absolute)`, so it never
    /// passes the absolute bound.
    pub fn on_read(&self, now: DateTime<Utc>) -> ReadDecision {
        if !self.is_live(now) {
            return ReadDecision::Expired;
        }

        let refreshed = self.sliding.map(|_| Self {
            current: deadline(now, self.absolute, self.sliding),
            ..*self
        });

        ReadDecision::Live { refreshed }
    }
}

/// `min(now + sliding, absolute)` over whichever parts are present.
fn deadline(
    now: DateTime<Utc>,
    absolute: Option<DateTime<Utc>>,
    sliding: Option<Duration>,
) -> Option<DateTime<Utc>> {
    let slid = sliding.and_then(|window| now.checked_add_signed(window));
    match (absolute, slid) {
        (Some(absolute), Some(slid)) => Some(absolute.min(slid)),
        (absolute, slid) => absolute.or(slid),
    }
}
