//! Closed intervals over a [`Moment`] axis.

use std::fmt;

use crate::error::CacheError;
use crate::moment::Moment;

/// Edge policy for containment tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edges {
    /// Both edges belong to the range.
    #[default]
    Inclusive,
    /// Neither edge belongs to the range.
    Exclusive,
    /// Only the start edge belongs to the range.
    StartInclusive,
    /// Only the end edge belongs to the range.
    EndInclusive,
}

/// A closed interval `[start, end]` with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range<M> {
    start: M,
    end: M,
}

impl<M: Moment> Range<M> {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: M, end: M) -> Result<Self, CacheError<M>> {
        if start > end {
            return Err(CacheError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A degenerate range covering a single moment.
    pub fn point(moment: M) -> Self {
        Self {
            start: moment,
            end: moment,
        }
    }

    /// Build from two moments in any order.
    pub(crate) fn ordered(a: M, b: M) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn start(&self) -> M {
        self.start
    }

    pub fn end(&self) -> M {
        self.end
    }

    /// Distance from start to end.
    pub fn span(&self) -> M::Span {
        self.start.span_to(self.end)
    }

    /// Whether `start == end`.
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    /// Inclusive point containment.
    pub fn contains_point(&self, moment: M) -> bool {
        self.contains_point_with(moment, Edges::Inclusive)
    }

    /// Point containment under an explicit edge policy.
    pub fn contains_point_with(&self, moment: M, edges: Edges) -> bool {
        let after_start = match edges {
            Edges::Inclusive | Edges::StartInclusive => moment >= self.start,
            Edges::Exclusive | Edges::EndInclusive => moment > self.start,
        };
        let before_end = match edges {
            Edges::Inclusive | Edges::EndInclusive => moment <= self.end,
            Edges::Exclusive | Edges::StartInclusive => moment < self.end,
        };
        after_start && before_end
    }

    /// Whether `other` lies entirely within this range (inclusive edges).
    pub fn contains(&self, other: &Range<M>) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Whether the two ranges share at least one point.
    pub fn intersects(&self, other: &Range<M>) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// The shared part of two ranges, if any.
    pub fn intersection(&self, other: &Range<M>) -> Option<Range<M>> {
        if !self.intersects(other) {
            return None;
        }
        Some(Range {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Smallest range covering both.
    pub fn hull(&self, other: &Range<M>) -> Range<M> {
        Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Snap both edges down onto the grid defined by `resolution`.
    pub fn snap(&self, resolution: M::Span) -> Range<M> {
        Range {
            start: self.start.floor(resolution),
            end: self.end.floor(resolution),
        }
    }
}

impl<M: Moment> fmt::Display for Range<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}, {:?}]", self.start, self.end)
    }
}
