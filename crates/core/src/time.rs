use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns true if this clock is fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// Number of whole calendar days (UTC) from `earlier` to `later`.
///
/// Used for streak accounting: same day is 0, yesterday-to-today is 1.
#[must_use]
pub fn calendar_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    later
        .date_naive()
        .signed_duration_since(earlier.date_naive())
        .num_days()
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_stable() {
        let clock = fixed_clock();
        assert_eq!(clock.now(), clock.now());
        assert!(clock.is_fixed());
    }

    #[test]
    fn advance_moves_fixed_clock() {
        let mut clock = fixed_clock();
        let before = clock.now();
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now() - before, Duration::minutes(5));
    }

    #[test]
    fn calendar_days_ignore_time_of_day() {
        let late_evening = fixed_now(); // 22:13 UTC
        let next_morning = late_evening + Duration::hours(10);
        assert_eq!(calendar_days_between(late_evening, next_morning), 1);
        assert_eq!(calendar_days_between(late_evening, late_evening), 0);
    }
}
