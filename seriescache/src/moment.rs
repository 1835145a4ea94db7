//! The ordered axis every cache is keyed on.
//!
//! A [`Moment`] is an opaque, totally-ordered point on a timeline and its
//! associated [`Moment::Span`] is the distance type used for resolutions and
//! zone padding. Two axes ship with the crate:
//!
//! - `i64` - plain ticks, convenient for synthetic series and tests
//! - `chrono::DateTime<Utc>` - wall-clock timestamps aligned on a millisecond grid
//!
//! The [`Clock`] trait supplies "now" for anchoring the loader's empty zones.
//! It is injected rather than read globally so tests can pin time.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// A point on a totally-ordered axis.
///
/// All arithmetic saturates at the axis limits instead of panicking.
pub trait Moment: Copy + Ord + fmt::Debug + Send + Sync + 'static {
    /// Distance between two moments (the resolution type).
    type Span: Copy + Ord + fmt::Debug + Send + Sync + 'static;

    /// Sentinel reported as the bounds of an empty cache.
    fn epoch() -> Self;

    /// Move forward by `span`.
    fn advance(self, span: Self::Span) -> Self;

    /// Move backward by `span`.
    fn retreat(self, span: Self::Span) -> Self;

    /// Distance from `self` to `later` (negative when `later` precedes `self`).
    fn span_to(self, later: Self) -> Self::Span;

    /// Multiply a span by a non-negative factor.
    fn scale(span: Self::Span, factor: f64) -> Self::Span;

    /// Whether a span is strictly greater than zero.
    fn is_positive(span: Self::Span) -> bool;

    /// Round down onto the grid defined by `resolution`.
    fn floor(self, resolution: Self::Span) -> Self;

    /// Round up onto the grid defined by `resolution`.
    fn ceil(self, resolution: Self::Span) -> Self;
}

impl Moment for i64 {
    type Span = i64;

    fn epoch() -> Self {
        0
    }

    fn advance(self, span: i64) -> Self {
        self.saturating_add(span)
    }

    fn retreat(self, span: i64) -> Self {
        self.saturating_sub(span)
    }

    fn span_to(self, later: Self) -> i64 {
        later.saturating_sub(self)
    }

    fn scale(span: i64, factor: f64) -> i64 {
        // `as` saturates for out-of-range floats
        (span as f64 * factor) as i64
    }

    fn is_positive(span: i64) -> bool {
        span > 0
    }

    fn floor(self, resolution: i64) -> Self {
        if resolution <= 0 {
            return self;
        }
        self.div_euclid(resolution).saturating_mul(resolution)
    }

    fn ceil(self, resolution: i64) -> Self {
        let floored = self.floor(resolution);
        if floored == self {
            self
        } else {
            floored.saturating_add(resolution)
        }
    }
}

impl Moment for DateTime<Utc> {
    type Span = TimeDelta;

    fn epoch() -> Self {
        DateTime::<Utc>::default()
    }

    fn advance(self, span: TimeDelta) -> Self {
        self.checked_add_signed(span).unwrap_or(if span < TimeDelta::zero() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }

    fn retreat(self, span: TimeDelta) -> Self {
        self.checked_sub_signed(span).unwrap_or(if span < TimeDelta::zero() {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
    }

    fn span_to(self, later: Self) -> TimeDelta {
        later.signed_duration_since(self)
    }

    fn scale(span: TimeDelta, factor: f64) -> TimeDelta {
        let millis = (span.num_milliseconds() as f64 * factor) as i64;
        TimeDelta::try_milliseconds(millis).unwrap_or(TimeDelta::MAX)
    }

    fn is_positive(span: TimeDelta) -> bool {
        span > TimeDelta::zero()
    }

    fn floor(self, resolution: TimeDelta) -> Self {
        let step = resolution.num_milliseconds();
        if step <= 0 {
            return self;
        }
        let millis = self.timestamp_millis().div_euclid(step) * step;
        DateTime::from_timestamp_millis(millis).unwrap_or(self)
    }

    fn ceil(self, resolution: TimeDelta) -> Self {
        let floored = self.floor(resolution);
        if floored == self {
            self
        } else {
            floored.advance(resolution)
        }
    }
}

/// Source of "now" on a given axis.
pub trait Clock<M: Moment>: Send + Sync {
    /// Current moment.
    fn now(&self) -> M;
}

/// Wall clock for `DateTime<Utc>` axes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock<DateTime<Utc>> for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// Useful for tests and simulations where "now" must be deterministic.
#[derive(Debug)]
pub struct FixedClock<M> {
    now: Mutex<M>,
}

impl<M: Moment> FixedClock<M> {
    /// Create a clock pinned at `now`.
    pub fn new(now: M) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: M) {
        *self.now.lock() = now;
    }

    /// Move the clock forward by `span`.
    pub fn advance(&self, span: M::Span) {
        let mut now = self.now.lock();
        *now = now.advance(span);
    }
}

impl<M: Moment> Clock<M> for FixedClock<M> {
    fn now(&self) -> M {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i64_floor_and_ceil() {
        assert_eq!(7i64.floor(5), 5);
        assert_eq!(7i64.ceil(5), 10);
        assert_eq!(10i64.floor(5), 10);
        assert_eq!(10i64.ceil(5), 10);
        // Negative moments floor towards negative infinity
        assert_eq!((-3i64).floor(5), -5);
        assert_eq!((-3i64).ceil(5), 0);
    }

    #[test]
    fn test_i64_saturates() {
        assert_eq!(i64::MAX.advance(10), i64::MAX);
        assert_eq!(i64::MIN.retreat(10), i64::MIN);
    }

    #[test]
    fn test_i64_scale_truncates() {
        assert_eq!(<i64 as Moment>::scale(10, 1.5), 15);
        assert_eq!(<i64 as Moment>::scale(1, 0.5), 0);
        assert_eq!(<i64 as Moment>::scale(4, 0.0), 0);
    }

    #[test]
    fn test_datetime_alignment() {
        let minute = TimeDelta::minutes(1);
        let t = DateTime::from_timestamp(90, 0).unwrap();

        assert_eq!(t.floor(minute), DateTime::from_timestamp(60, 0).unwrap());
        assert_eq!(t.ceil(minute), DateTime::from_timestamp(120, 0).unwrap());
    }

    #[test]
    fn test_datetime_span_and_scale() {
        let a = DateTime::from_timestamp(0, 0).unwrap();
        let b = DateTime::from_timestamp(100, 0).unwrap();

        assert_eq!(a.span_to(b), TimeDelta::seconds(100));
        assert_eq!(
            <DateTime<Utc> as Moment>::scale(TimeDelta::seconds(100), 1.5),
            TimeDelta::seconds(150)
        );
        assert_eq!(<DateTime<Utc> as Moment>::epoch(), a);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(100i64);
        assert_eq!(clock.now(), 100);

        clock.advance(5);
        assert_eq!(clock.now(), 105);

        clock.set(7);
        assert_eq!(clock.now(), 7);
    }
}
