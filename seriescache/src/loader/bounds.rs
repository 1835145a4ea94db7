//! Confirmed-empty zone tracking.
//!
//! A fetch that returns nothing is information: the loader must remember it
//! so that scrolling over the same empty stretch does not re-fetch it every
//! render tick. `BoundsTracker` keeps three zones:
//!
//! ```text
//!   empty_before          known data                empty_after
//! ◄──────────────┤ · · · · · · · · · · · · · ├──────────────────►
//!                end                          start (anchored at "now")
//!
//!   active: union of windows proven empty while no data has been seen
//! ```
//!
//! The tracker starts in a default state relative to a reference moment
//! (normally the clock's "now"): nothing attempted, and nothing after now.

use crate::moment::Moment;
use crate::range::Range;

/// Tracks which parts of the axis are known to hold no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundsTracker<M> {
    empty_before: Option<Range<M>>,
    active: Range<M>,
    empty_after: Range<M>,
}

impl<M: Moment> BoundsTracker<M> {
    /// Create a tracker in the default state anchored at `now`.
    pub fn new(now: M) -> Self {
        Self {
            empty_before: None,
            active: Range::point(now),
            empty_after: Range::point(now),
        }
    }

    /// Forget everything and re-anchor at `now`.
    pub fn reset(&mut self, now: M) {
        *self = Self::new(now);
    }

    /// Whether nothing has been attempted since the last reset.
    pub fn is_default(&self) -> bool {
        self.active.is_degenerate()
    }

    /// Zone before the earliest known sample, once established.
    pub fn empty_before(&self) -> Option<Range<M>> {
        self.empty_before
    }

    /// Union of windows proven empty while the cache held no data.
    pub fn active(&self) -> Range<M> {
        self.active
    }

    /// Zone after the latest possible sample.
    pub fn empty_after(&self) -> Range<M> {
        self.empty_after
    }

    /// Lowest and highest moments a query may expand to.
    pub fn bounds(&self) -> (Option<M>, M) {
        (self.empty_before.map(|zone| zone.end()), self.empty_after.start())
    }

    /// Expand `[start, end]` by `(end - start) * factor` on each side, clamped
    /// so it never reaches into a confirmed-empty zone.
    ///
    /// The result may be inverted (`min > max`) when the query lies entirely
    /// inside an empty zone.
    pub fn get_bounds(&self, start: M, end: M, factor: f64) -> (M, M) {
        let pad = M::scale(start.span_to(end), factor);
        let (lower, upper) = self.bounds();

        let mut min = start.retreat(pad);
        if let Some(lower) = lower {
            min = min.max(lower);
        }
        let max = end.advance(pad).min(upper);
        (min, max)
    }

    /// Whether `[from, to]` is known to hold no data.
    pub fn contains(&self, from: M, to: M) -> bool {
        let span = Range::ordered(from, to);

        if !self.active.is_degenerate() && self.active.contains(&span) {
            return true;
        }
        if span.start() > self.empty_after.start() {
            return true;
        }
        self.empty_before
            .is_some_and(|zone| span.end() < zone.end())
    }

    /// Record the extent of cached data (`start`/`end` are the first and last
    /// sample moments). Zones that turn out to hold data give way to it.
    pub fn extend_bounds(&mut self, start: M, end: M) {
        if let Some(zone) = self.empty_before {
            if start < zone.end() {
                self.empty_before = Some(Range::ordered(zone.start().min(start), start));
            }
        }
        if end > self.empty_after.start() {
            self.empty_after = Range::ordered(end, self.empty_after.end().max(end));
        }
    }

    /// Record that `[probe_start, data_start)` was fetched and came back empty
    /// ahead of the earliest sample.
    ///
    /// An existing zone that ends before `probe_start` is kept as is: the
    /// stretch between the two was never fetched.
    pub fn mark_empty_before(&mut self, probe_start: M, data_start: M) {
        let probe_start = match self.empty_before {
            Some(zone) if zone.end() < probe_start => return,
            Some(zone) => zone.start().min(probe_start),
            None => probe_start,
        };
        self.empty_before = Some(Range::ordered(probe_start, data_start));
    }

    /// Record that `[start, end]` was fetched and came back empty while no
    /// data has been seen at all.
    pub fn shrink_bounds(&mut self, start: M, end: M) {
        let window = Range::ordered(start, end);

        self.active = if !self.active.is_degenerate() && self.active.intersects(&window) {
            self.active.hull(&window)
        } else {
            window
        };

        // A window running into the future zone pulls it earlier
        if window.end() >= self.empty_after.start() && window.start() < self.empty_after.start() {
            self.empty_after = Range::ordered(window.start(), self.empty_after.end());
        }
    }

    /// Move the "now" anchor forward. Anything proven empty after the old
    /// anchor may have received data since, so the after-zone restarts at `now`.
    pub fn advance(&mut self, now: M) {
        if now > self.empty_after.end() {
            self.empty_after = Range::point(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_000;

    #[test]
    fn test_default_state() {
        let tracker = BoundsTracker::new(NOW);
        assert!(tracker.is_default());
        assert_eq!(tracker.bounds(), (None, NOW));
        assert_eq!(tracker.active(), Range::point(NOW));
        assert!(!tracker.contains(100, 200));
    }

    #[test]
    fn test_get_bounds_pads_by_factor() {
        let tracker = BoundsTracker::new(NOW);
        assert_eq!(tracker.get_bounds(100, 200, 0.5), (50, 250));
        assert_eq!(tracker.get_bounds(100, 200, 0.0), (100, 200));
    }

    #[test]
    fn test_get_bounds_never_reaches_past_now() {
        let tracker = BoundsTracker::new(NOW);
        assert_eq!(tracker.get_bounds(900, 1_000, 1.0), (800, NOW));

        // Entirely in the future: inverted result
        let (min, max) = tracker.get_bounds(2_000, 2_100, 0.0);
        assert!(min > max);
        assert!(tracker.contains(2_000, 2_100));
    }

    #[test]
    fn test_shrink_bounds_memoizes_empty_windows() {
        let mut tracker = BoundsTracker::new(NOW);
        tracker.shrink_bounds(100, 200);

        assert!(!tracker.is_default());
        assert!(tracker.contains(120, 180));
        assert!(!tracker.contains(150, 250));

        // Overlapping window grows the zone
        tracker.shrink_bounds(180, 300);
        assert_eq!(tracker.active(), Range::new(100, 300).unwrap());
        assert!(tracker.contains(150, 250));

        // Disjoint window replaces it
        tracker.shrink_bounds(500, 600);
        assert_eq!(tracker.active(), Range::new(500, 600).unwrap());
    }

    #[test]
    fn test_shrink_bounds_touching_now_pulls_empty_after_earlier() {
        let mut tracker = BoundsTracker::new(NOW);
        tracker.shrink_bounds(800, NOW);

        assert_eq!(tracker.empty_after().start(), 800);
        assert_eq!(tracker.get_bounds(700, 900, 0.0), (700, 800));
    }

    #[test]
    fn test_empty_before_clamps_expansion() {
        let mut tracker = BoundsTracker::new(NOW);
        tracker.mark_empty_before(0, 300);

        assert_eq!(tracker.get_bounds(250, 400, 1.0), (300, 550));
        assert!(tracker.contains(100, 200));
        assert!(!tracker.contains(100, 350));
    }

    #[test]
    fn test_extend_bounds_yields_to_data() {
        let mut tracker = BoundsTracker::new(NOW);
        tracker.mark_empty_before(0, 300);

        tracker.extend_bounds(200, 1_200);

        assert_eq!(tracker.empty_before(), Some(Range::new(0, 200).unwrap()));
        assert_eq!(tracker.empty_after(), Range::new(1_200, 1_200).unwrap());
    }

    #[test]
    fn test_mark_empty_before_never_bridges_unfetched_gap() {
        let mut tracker = BoundsTracker::new(NOW);
        tracker.mark_empty_before(0, 300);

        // Touching zones merge
        tracker.mark_empty_before(250, 300);
        assert_eq!(tracker.empty_before(), Some(Range::new(0, 300).unwrap()));

        // [300, 500) was never proven empty
        tracker.mark_empty_before(500, 600);
        assert_eq!(tracker.empty_before(), Some(Range::new(0, 300).unwrap()));
        assert!(!tracker.contains(400, 450));
    }

    #[test]
    fn test_advance_and_reset() {
        let mut tracker = BoundsTracker::new(NOW);
        tracker.shrink_bounds(900, NOW);
        tracker.advance(1_500);
        assert_eq!(tracker.empty_after(), Range::point(1_500));

        // Moving backwards is ignored
        tracker.advance(1_400);
        assert_eq!(tracker.empty_after(), Range::point(1_500));

        tracker.reset(2_000);
        assert!(tracker.is_default());
        assert_eq!(tracker.bounds(), (None, 2_000));
    }
}
