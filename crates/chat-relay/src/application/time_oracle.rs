//! TimeOracle: answers `TIME?` with the relay's wall clock.

use std::sync::Arc;

use chat_core::protocol::messages::format_time_reply;
use chat_core::{Clock, SystemClock};

/// Stateless source of relay time.
#[derive(Clone)]
pub struct TimeOracle {
    clock: Arc<dyn Clock>,
}

impl TimeOracle {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Relay wall-clock time in integer milliseconds since the Unix epoch.
    pub fn current_time_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Builds the `TIME:<ms>` reply line for the current instant.
    pub fn reply(&self) -> (i64, String) {
        let ms = self.current_time_ms();
        (ms, format_time_reply(ms))
    }
}

impl Default for TimeOracle {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_reply_uses_clock_value() {
        let oracle = TimeOracle::new(Arc::new(FixedClock(1_700_000_000_500)));
        assert_eq!(oracle.current_time_ms(), 1_700_000_000_500);
        assert_eq!(
            oracle.reply(),
            (1_700_000_000_500, "TIME:1700000000500".to_string())
        );
    }

    #[test]
    fn test_default_oracle_reads_system_clock() {
        let before = chat_core::time::now_ms();
        let t = TimeOracle::default().current_time_ms();
        let after = chat_core::time::now_ms();
        assert!(before <= t && t <= after);
    }
}
