//! Rolling 24-hour counters (spec.md §3, §4.4, §9).
//!
//! spec.md §9's "Ambient rolling windows" design note asks for a
//! ring-buffer-per-counter in place of the original's "append then filter".
//! [`RollingCounter`] is a `VecDeque` that is evicted from the front on every
//! append -- timestamps only ever increase, so the front is always the
//! oldest entry, giving ring-buffer behavior without a fixed capacity (a true
//! fixed-size ring buffer would need a capacity bound in entries-per-window,
//! which spec.md does not provide; this is the documented unbounded
//! fallback).

use std::collections::VecDeque;

const WINDOW_SECONDS: u64 = 24 * 60 * 60;

/// One `(timestamp, value)` rolling counter: a monotonic `since_start` total
/// plus a 24-hour window of individual events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollingCounter {
    since_start: u64,
    window: VecDeque<(u64, u64)>,
}

impl RollingCounter {
    #[must_use]
    pub fn since_start(&self) -> u64 {
        self.since_start
    }

    #[must_use]
    pub fn window(&self) -> &VecDeque<(u64, u64)> {
        &self.window
    }

    /// Appends one event at `now` with `value`, then evicts anything older
    /// than the 24-hour window relative to `now`.
    pub fn record(&mut self, now: u64, value: u64) {
        self.since_start += 1;
        self.window.push_back((now, value));
        self.evict(now);
    }

    /// Drops every entry older than `now - 24h`, without recording a new one
    /// -- used so the window stays accurate even on ticks that don't
    /// themselves produce an event.
    pub fn evict(&mut self, now: u64) {
        let cutoff = now.saturating_sub(WINDOW_SECONDS);
        while let Some(&(timestamp, _)) = self.window.front() {
            if timestamp < cutoff {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

/// A pool error event, recorded in `pool_errors_24h`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolErrorRecord {
    pub timestamp: u64,
    pub error_code: Option<u8>,
    pub message: String,
}

/// Rolling window of pool errors, same eviction rule as [`RollingCounter`]
/// but carrying structured error detail instead of a plain `u64`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolErrorWindow {
    window: VecDeque<PoolErrorRecord>,
}

impl PoolErrorWindow {
    #[must_use]
    pub fn window(&self) -> &VecDeque<PoolErrorRecord> {
        &self.window
    }

    pub fn record(&mut self, now: u64, error_code: Option<u8>, message: String) {
        self.window.push_back(PoolErrorRecord {
            timestamp: now,
            error_code,
            message,
        });
        self.evict(now);
    }

    pub fn evict(&mut self, now: u64) {
        let cutoff = now.saturating_sub(WINDOW_SECONDS);
        while let Some(front) = self.window.front() {
            if front.timestamp < cutoff {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}
