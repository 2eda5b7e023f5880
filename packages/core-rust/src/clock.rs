//! Timestamp source for `created_at`, `updated_at` and log entries.
//!
//! Abstracted behind [`Clock`] so tests can inject a deterministic sequence
//! in place of wall-clock time.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};

/// Produces the current time as an RFC 3339 string.
pub trait Clock: Send + Sync {
    fn now(&self) -> String;
}

/// Reads the real system time, formatted in UTC with millisecond precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Deterministic clock: every call advances by a fixed step.
///
/// Successive timestamps are strictly increasing and sort chronologically as
/// strings, which keeps ordering assertions stable.
#[derive(Debug)]
pub struct SequenceClock {
    next_millis: AtomicI64,
    step_millis: i64,
}

impl SequenceClock {
    /// Starts at `start_millis` since the Unix epoch, advancing by `step_millis`.
    #[must_use]
    pub fn new(start_millis: i64, step_millis: i64) -> Self {
        Self {
            next_millis: AtomicI64::new(start_millis),
            step_millis,
        }
    }
}

impl Default for SequenceClock {
    /// 2024-01-01T00:00:00Z, one second per tick.
    fn default() -> Self {
        Self::new(1_704_067_200_000, 1_000)
    }
}

impl Clock for SequenceClock {
    fn now(&self) -> String {
        let millis = self.next_millis.fetch_add(self.step_millis, Ordering::Relaxed);
        DateTime::<Utc>::from_timestamp_millis(millis)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
