//! Time source
//!
//! Event timestamps come from an injected clock so that tests can script
//! them instead of depending on the wall clock.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Source of "now" for event timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Queue-backed clock for tests.
///
/// Each call to `now()` consumes the next scripted instant. Once the script
/// is exhausted it starts over from the first instant. An empty script
/// behaves like [`SystemClock`].
#[derive(Debug)]
pub struct ScriptedClock {
    script: Vec<DateTime<Utc>>,
    pending: Mutex<VecDeque<DateTime<Utc>>>,
}

impl ScriptedClock {
    pub fn new(instants: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        let script: Vec<DateTime<Utc>> = instants.into_iter().collect();
        Self {
            pending: Mutex::new(script.iter().copied().collect()),
            script,
        }
    }

    /// Clock frozen at a single instant
    pub fn frozen(instant: DateTime<Utc>) -> Self {
        Self::new([instant])
    }

    /// Instants left before the script restarts
    pub fn remaining(&self) -> usize {
        self.pending.lock().map(|queue| queue.len()).unwrap_or(0)
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> DateTime<Utc> {
        if self.script.is_empty() {
            return Utc::now();
        }

        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if pending.is_empty() {
            pending.extend(self.script.iter().copied());
        }

        let instant = pending.pop_front().unwrap_or_else(Utc::now);
        tracing::trace!(%instant, remaining = pending.len(), "scripted clock tick");
        instant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scripted_clock_consumes_in_order() {
        let first = Utc.with_ymd_and_hms(2023, 2, 1, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2023, 2, 1, 11, 0, 0).unwrap();
        let clock = ScriptedClock::new([first, second]);

        assert_eq!(clock.remaining(), 2);
        assert_eq!(clock.now(), first);
        assert_eq!(clock.now(), second);
        assert_eq!(clock.remaining(), 0);
    }

    #[test]
    fn test_scripted_clock_wraps_around() {
        let first = Utc.with_ymd_and_hms(2023, 2, 1, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2023, 2, 1, 11, 0, 0).unwrap();
        let clock = ScriptedClock::new([first, second]);

        clock.now();
        clock.now();
        assert_eq!(clock.now(), first);
    }

    #[test]
    fn test_frozen_clock() {
        let instant = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        let clock = ScriptedClock::frozen(instant);

        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), instant);
    }
}
