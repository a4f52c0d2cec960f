//! Clock offset estimation against the relay (Cristian's algorithm).
//!
//! # How it works (for beginners)
//!
//! The client wants to know how far its own clock is from the relay's.  It
//! cannot read the relay's clock directly, so it asks:
//!
//! ```text
//!  client                         relay
//!    │ ── TIME? ───────────────────▶ │   sent at local time T
//!    │ ◀────────────────── TIME:S ── │   relay clock reads S
//!    │                               │   reply arrives at local time T'
//! ```
//!
//! The reply spent roughly half of the round trip `T' - T` in flight, so at
//! the moment it arrived the relay's clock read about `S + (T' - T) / 2`.
//! The difference between that and `T'` is one raw offset sample.
//!
//! A single sample is noisy because network delay is not symmetric, so the
//! estimator blends each sample into the running value with exponential
//! smoothing: `offset = (1 - α) · offset + α · sample`.
//!
//! Only one query is ever outstanding.  If its reply never arrives the
//! estimator stays in the waiting state and every later attempt is skipped
//! until the session is replaced.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Default period between `TIME?` queries.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// Default weight given to each new sample.
pub const DEFAULT_SMOOTHING: f64 = 0.3;

/// Rejected estimator settings.
#[derive(Debug, Error, PartialEq)]
pub enum SyncConfigError {
    #[error("smoothing factor must be in (0, 1], got {0}")]
    InvalidSmoothing(f64),
    #[error("sync interval must be greater than zero")]
    ZeroInterval,
}

/// Estimator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    pub interval: Duration,
    pub smoothing: f64,
}

impl SyncConfig {
    /// Builds a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`SyncConfigError`] when `smoothing` is outside `(0, 1]` or
    /// `interval` is zero.
    pub fn new(interval: Duration, smoothing: f64) -> Result<Self, SyncConfigError> {
        let cfg = Self {
            interval,
            smoothing,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), SyncConfigError> {
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(SyncConfigError::InvalidSmoothing(self.smoothing));
        }
        if self.interval.is_zero() {
            return Err(SyncConfigError::ZeroInterval);
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

/// Result of one completed round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSample {
    /// Measured round trip, never negative.
    pub rtt_ms: i64,
    /// Offset implied by this round trip alone.
    pub raw_offset_ms: i64,
    /// Smoothed offset after folding in this sample.
    pub offset_ms: i64,
}

/// Running estimate of `relay_time - local_time`.
///
/// Pure state machine: callers pass in the local clock reading and do the
/// actual sending.
#[derive(Debug)]
pub struct SyncEstimator {
    smoothing: f64,
    offset_ms: i64,
    /// Local send time of the outstanding query, if any.
    sent_at_ms: Option<i64>,
}

impl SyncEstimator {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            smoothing: config.smoothing,
            offset_ms: 0,
            sent_at_ms: None,
        }
    }

    /// Starts a query at local time `now_ms`.
    ///
    /// Returns `true` if the caller must now send `TIME?`, or `false` when a
    /// query is already outstanding.
    pub fn begin(&mut self, now_ms: i64) -> bool {
        if let Some(sent) = self.sent_at_ms {
            debug!(
                "time query from {sent} still unanswered ({} ms); skipping",
                now_ms - sent
            );
            return false;
        }
        self.sent_at_ms = Some(now_ms);
        true
    }

    /// Consumes a `TIME:<server_ms>` reply that arrived at local time `now_ms`.
    ///
    /// Returns `None` if no query was outstanding; the reply is ignored.
    pub fn complete(&mut self, server_ms: i64, now_ms: i64) -> Option<SyncSample> {
        let Some(sent) = self.sent_at_ms.take() else {
            debug!("unsolicited time reply {server_ms}; ignoring");
            return None;
        };

        let rtt_ms = (now_ms - sent).max(0);
        let raw_offset_ms = server_ms + rtt_ms / 2 - now_ms;
        let blended =
            (1.0 - self.smoothing) * self.offset_ms as f64 + self.smoothing * raw_offset_ms as f64;
        self.offset_ms = blended.round() as i64;

        Some(SyncSample {
            rtt_ms,
            raw_offset_ms,
            offset_ms: self.offset_ms,
        })
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// `true` while a query is outstanding.
    pub fn is_awaiting(&self) -> bool {
        self.sent_at_ms.is_some()
    }

    /// Local time corrected by the current offset.
    pub fn synced_time_ms(&self, now_ms: i64) -> i64 {
        now_ms + self.offset_ms
    }
}

impl Default for SyncEstimator {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}
