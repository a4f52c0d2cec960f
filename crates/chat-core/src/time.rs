//! Wall-clock access and rendering.
//!
//! Both the relay's time oracle and the client's sync estimator read the
//! clock through the [`Clock`] trait.  Production code uses [`SystemClock`];
//! tests substitute a clock they can set by hand so round-trip times are
//! exact.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, TimeZone};

/// A source of wall-clock time in integer milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The operating system's real-time clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        now_ms()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before 1970.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Renders `ms` as `HH:MM:SS` in the local time zone.
///
/// Out-of-range timestamps render as `--:--:--`.
pub fn format_hms(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(t) => t.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}
