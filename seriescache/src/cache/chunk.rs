//! Contiguous runs of samples.

use crate::error::CacheError;
use crate::moment::Moment;
use crate::range::Range;
use crate::series::Sample;

/// Validation flavour applied to every chunk of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkPolicy {
    /// Items are strictly ascending and exactly one resolution apart.
    /// Interior chunks must be filled edge to edge.
    #[default]
    Checked,
    /// Items are sorted on construction and only need to fall inside the
    /// chunk's range. Used for sparse or derived series.
    Unchecked,
}

impl ChunkPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkPolicy::Checked => "checked",
            ChunkPolicy::Unchecked => "unchecked",
        }
    }
}

impl std::fmt::Display for ChunkPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lookup policy for point queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Only an item exactly at the moment.
    Exact,
    /// The closest item at or before the moment.
    NearestLeft,
    /// The closest item at or after the moment.
    NearestRight,
}

/// A gap-free run of items plus the range it claims to cover.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T: Sample> {
    range: Range<T::Moment>,
    items: Vec<T>,
}

impl<T: Sample> Chunk<T> {
    /// Build a chunk, validating items according to `policy`.
    pub(crate) fn new(
        policy: ChunkPolicy,
        range: Range<T::Moment>,
        items: Vec<T>,
        resolution: <T::Moment as Moment>::Span,
    ) -> Result<Self, CacheError<T::Moment>> {
        match policy {
            ChunkPolicy::Checked => Self::checked(range, items, resolution),
            ChunkPolicy::Unchecked => Self::unchecked(range, items),
        }
    }

    fn checked(
        range: Range<T::Moment>,
        items: Vec<T>,
        resolution: <T::Moment as Moment>::Span,
    ) -> Result<Self, CacheError<T::Moment>> {
        for pair in items.windows(2) {
            let previous = pair[0].moment();
            let next = pair[1].moment();
            if next <= previous {
                return Err(CacheError::UnsortedItems {
                    range,
                    previous,
                    next,
                });
            }
            if previous.advance(resolution) != next {
                return Err(CacheError::SpacingMismatch {
                    range,
                    previous,
                    next,
                    resolution,
                });
            }
        }
        let chunk = Self { range, items };
        chunk.check_containment()?;
        Ok(chunk)
    }

    fn unchecked(range: Range<T::Moment>, mut items: Vec<T>) -> Result<Self, CacheError<T::Moment>> {
        items.sort_by_key(|item| item.moment());
        let chunk = Self { range, items };
        chunk.check_containment()?;
        Ok(chunk)
    }

    // Items are sorted at this point, so only the ends need checking.
    fn check_containment(&self) -> Result<(), CacheError<T::Moment>> {
        for moment in [self.first_moment(), self.last_moment()].into_iter().flatten() {
            if !self.range.contains_point(moment) {
                return Err(CacheError::ItemOutsideRange {
                    range: self.range,
                    moment,
                });
            }
        }
        Ok(())
    }

    pub fn range(&self) -> Range<T::Moment> {
        self.range
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first_moment(&self) -> Option<T::Moment> {
        self.items.first().map(Sample::moment)
    }

    pub fn last_moment(&self) -> Option<T::Moment> {
        self.items.last().map(Sample::moment)
    }

    /// Extend this chunk with the one directly following it.
    ///
    /// Callers guarantee `next` starts one resolution after this chunk ends.
    pub(crate) fn append(&mut self, next: Chunk<T>) {
        self.range = self.range.hull(&next.range);
        self.items.extend(next.items);
    }

    /// Items whose moments fall within `range`.
    pub(crate) fn slice(&self, range: &Range<T::Moment>) -> &[T] {
        let lo = self
            .items
            .partition_point(|item| item.moment() < range.start());
        let hi = self
            .items
            .partition_point(|item| item.moment() <= range.end());
        if lo >= hi {
            return &[];
        }
        &self.items[lo..hi]
    }

    /// Point lookup within this chunk.
    pub(crate) fn find(&self, moment: T::Moment, policy: Match) -> Option<&T> {
        let first = self.items.first()?;
        let last = self.items.last()?;

        if moment < first.moment() {
            return (policy == Match::NearestRight).then_some(first);
        }
        if moment > last.moment() {
            return (policy == Match::NearestLeft).then_some(last);
        }

        match self
            .items
            .binary_search_by(|item| item.moment().cmp(&moment))
        {
            Ok(index) => self.items.get(index),
            Err(index) => match policy {
                Match::Exact => None,
                Match::NearestLeft => index.checked_sub(1).and_then(|i| self.items.get(i)),
                Match::NearestRight => self.items.get(index),
            },
        }
    }

    /// Cut this chunk down to `window`. Returns `false` when nothing remains.
    pub(crate) fn truncate(&mut self, window: &Range<T::Moment>) -> bool {
        let Some(kept) = self.range.intersection(window) else {
            return false;
        };
        if kept != self.range {
            let lo = self.items.partition_point(|item| item.moment() < kept.start());
            let hi = self.items.partition_point(|item| item.moment() <= kept.end());
            self.items.truncate(hi);
            self.items.drain(..lo.min(hi));
            self.range = kept;
        }
        true
    }
}

/// Fail unless the given edge items sit exactly on the range edges.
///
/// `None` skips that side.
pub(crate) fn check_edges<M: Moment>(
    range: Range<M>,
    first: Option<M>,
    last: Option<M>,
) -> Result<(), CacheError<M>> {
    let head_ok = first.map_or(true, |first| first == range.start());
    let tail_ok = last.map_or(true, |last| last == range.end());
    if head_ok && tail_ok {
        return Ok(());
    }
    Err(CacheError::BoundaryMismatch {
        range,
        first: first.unwrap_or(range.start()),
        last: last.unwrap_or(range.end()),
    })
}
