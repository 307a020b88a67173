//! Heartbeat bookkeeping and liveness decisions.
//!
//! [`HeartbeatState`] tracks the negotiated interval and the instants of the
//! last successful read and write. [`HeartbeatState::check`] is a pure
//! decision; acting on it (closing the transport, writing a heartbeat frame)
//! is done by [`Transport::select`](crate::transport::Transport::select).
//!
//! Elapsed times are rounded to whole seconds before comparison:
//!
//! - `2 * interval < since_read` → the peer is unresponsive.
//! - `interval / 2 < since_write` → we owe the peer a heartbeat.

use std::time::Instant;

/// Outcome of a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatCheck {
    /// Heartbeats are disabled or no read/write has happened yet.
    Skipped,
    /// Both directions are within bounds.
    Healthy,
    /// The local side should send a heartbeat frame.
    Due {
        /// Rounded seconds since the last write.
        since_write: u64,
    },
    /// Nothing was read for more than twice the interval.
    Missed {
        /// Rounded seconds since the last read.
        since_read: u64,
    },
}

/// Heartbeat interval and last activity timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatState {
    /// Seconds, 0 = disabled.
    interval: u64,
    /// Value restored by [`reenable`](Self::reenable).
    initial_interval: u64,
    last_read: Option<Instant>,
    last_write: Option<Instant>,
}

impl HeartbeatState {
    /// Create a state whose initial interval equals `interval`.
    pub fn new(interval: u64) -> Self {
        Self::with_initial(interval, interval)
    }

    /// Create a state with a separate value to restore on re-enable.
    pub fn with_initial(interval: u64, initial_interval: u64) -> Self {
        Self {
            interval,
            initial_interval,
            last_read: None,
            last_write: None,
        }
    }

    /// Effective interval in seconds.
    #[inline]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Interval restored by [`reenable`](Self::reenable).
    #[inline]
    pub fn initial_interval(&self) -> u64 {
        self.initial_interval
    }

    /// Whether liveness checks are active.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.interval != 0
    }

    /// Set the effective interval to 0. The initial interval is kept.
    pub fn disable(&mut self) {
        self.interval = 0;
    }

    /// Restore the initial interval.
    pub fn reenable(&mut self) {
        self.interval = self.initial_interval;
    }

    /// Record a successful read.
    #[inline]
    pub fn record_read(&mut self, at: Instant) {
        self.last_read = Some(at);
    }

    /// Record a successful write.
    #[inline]
    pub fn record_write(&mut self, at: Instant) {
        self.last_write = Some(at);
    }

    /// Instant of the last successful read.
    #[inline]
    pub fn last_read(&self) -> Option<Instant> {
        self.last_read
    }

    /// Instant of the last successful write.
    #[inline]
    pub fn last_write(&self) -> Option<Instant> {
        self.last_write
    }

    /// Decide what the liveness check requires at `now`.
    ///
    /// The missed check wins over the due check.
    pub fn check(&self, now: Instant) -> HeartbeatCheck {
        if self.interval == 0 {
            return HeartbeatCheck::Skipped;
        }
        let (Some(last_read), Some(last_write)) = (self.last_read, self.last_write) else {
            return HeartbeatCheck::Skipped;
        };

        let since_read = rounded_secs(now, last_read);
        let since_write = rounded_secs(now, last_write);

        if self.interval.saturating_mul(2) < since_read {
            HeartbeatCheck::Missed { since_read }
        } else if (self.interval as f64) / 2.0 < since_write as f64 {
            HeartbeatCheck::Due { since_write }
        } else {
            HeartbeatCheck::Healthy
        }
    }
}

fn rounded_secs(now: Instant, then: Instant) -> u64 {
    now.saturating_duration_since(then).as_secs_f64().round() as u64
}
