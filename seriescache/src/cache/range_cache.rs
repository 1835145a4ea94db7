//! Ordered collection of non-overlapping chunks.
//!
//! `RangeCache` is the interval engine behind every series. It answers
//! coverage and point queries by binary search over chunk starts, reports the
//! sub-ranges it is missing, and keeps chunk runs maximally contiguous by
//! merging neighbours that sit exactly one resolution apart.
//!
//! # Integrity
//!
//! Insertions are validated completely before the chunk list is touched, so
//! a rejected [`RangeCache::add_data`] leaves the cache unchanged. For
//! [`ChunkPolicy::Checked`] caches this includes the spacing across every
//! merge junction and the edge alignment of chunks that end up interior.

use crate::cache::chunk::{check_edges, Chunk, ChunkPolicy, Match};
use crate::error::CacheError;
use crate::moment::Moment;
use crate::range::Range;
use crate::series::Sample;

type Span<T> = <<T as Sample>::Moment as Moment>::Span;

/// Non-overlapping chunks sorted by range start.
#[derive(Debug, Clone)]
pub struct RangeCache<T: Sample> {
    chunks: Vec<Chunk<T>>,
    resolution: Span<T>,
    policy: ChunkPolicy,
}

impl<T: Sample> RangeCache<T> {
    /// Create an empty cache for samples spaced by `resolution`.
    pub fn new(resolution: Span<T>, policy: ChunkPolicy) -> Result<Self, CacheError<T::Moment>> {
        if !T::Moment::is_positive(resolution) {
            return Err(CacheError::InvalidResolution(resolution));
        }
        Ok(Self {
            chunks: Vec::new(),
            resolution,
            policy,
        })
    }

    pub fn resolution(&self) -> Span<T> {
        self.resolution
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    /// Whether the cache holds no chunks at all.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Number of items across all chunks.
    pub fn item_count(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk<T>> {
        self.chunks.iter()
    }

    /// `[first chunk start, last chunk end]`, or the epoch sentinel when empty.
    pub fn bounds(&self) -> Range<T::Moment> {
        match (self.chunks.first(), self.chunks.last()) {
            (Some(first), Some(last)) => Range::ordered(first.range().start(), last.range().end()),
            _ => Range::point(T::Moment::epoch()),
        }
    }

    /// Moments of the first and last cached items.
    pub fn item_extent(&self) -> Option<Range<T::Moment>> {
        let first = self.chunks.iter().find_map(Chunk::first_moment)?;
        let last = self.chunks.iter().rev().find_map(Chunk::last_moment)?;
        Some(Range::ordered(first, last))
    }

    fn chunk_containing(&self, moment: T::Moment) -> Option<&Chunk<T>> {
        let index = self
            .chunks
            .partition_point(|chunk| chunk.range().start() <= moment);
        let chunk = self.chunks.get(index.checked_sub(1)?)?;
        chunk.range().contains_point(moment).then_some(chunk)
    }

    /// Whether a single chunk covers `range` (inclusive edges).
    pub fn has_data(&self, range: &Range<T::Moment>) -> bool {
        self.chunk_containing(range.start())
            .is_some_and(|chunk| chunk.range().contains(range))
    }

    /// Items within `range`, or nothing unless one chunk covers all of it.
    pub fn get_data(&self, range: &Range<T::Moment>) -> Vec<T> {
        match self.chunk_containing(range.start()) {
            Some(chunk) if chunk.range().contains(range) => chunk.slice(range).to_vec(),
            _ => Vec::new(),
        }
    }

    /// Point lookup with exact or nearest-neighbour semantics.
    ///
    /// Only the chunk containing `moment` is consulted.
    pub fn get_item(&self, moment: T::Moment, policy: Match) -> Option<&T> {
        self.chunk_containing(moment)?.find(moment, policy)
    }

    /// Sub-ranges of `range` not covered by any chunk.
    ///
    /// Gaps next to a chunk are trimmed by one resolution so that a sample
    /// sitting on the chunk edge is never requested again.
    pub fn get_empty_ranges(&self, range: &Range<T::Moment>) -> Vec<Range<T::Moment>> {
        if self.chunks.is_empty() {
            return vec![*range];
        }

        let mut gaps = Vec::new();
        let mut cursor = range.start();
        let first = self
            .chunks
            .partition_point(|chunk| chunk.range().end() < range.start());

        for chunk in &self.chunks[first..] {
            let covered = chunk.range();
            if covered.start() > range.end() {
                break;
            }
            if covered.start() > cursor {
                let gap_end = covered.start().retreat(self.resolution);
                if gap_end >= cursor {
                    gaps.push(Range::ordered(cursor, gap_end));
                }
            }
            if covered.end() >= range.end() {
                return gaps;
            }
            cursor = covered.end().advance(self.resolution);
        }

        if cursor <= range.end() {
            gaps.push(Range::ordered(cursor, range.end()));
        }
        gaps
    }

    /// Insert a new chunk covering `range`, then merge adjacent chunks.
    pub fn add_data(
        &mut self,
        range: Range<T::Moment>,
        items: Vec<T>,
    ) -> Result<(), CacheError<T::Moment>> {
        let chunk = Chunk::new(self.policy, range, items, self.resolution)?;
        let index = self
            .chunks
            .partition_point(|existing| existing.range().start() < range.start());

        let neighbours = [
            index.checked_sub(1).and_then(|i| self.chunks.get(i)),
            self.chunks.get(index),
        ];
        for existing in neighbours.into_iter().flatten() {
            if existing.range().intersects(&range) {
                return Err(CacheError::Overlap {
                    new: range,
                    existing: existing.range(),
                });
            }
        }

        if self.policy == ChunkPolicy::Checked {
            self.validate_integration(index, &chunk)?;
        }

        self.chunks.insert(index, chunk);
        self.optimize();
        Ok(())
    }

    /// Check spacing and edge alignment the insertion at `index` would produce.
    fn validate_integration(
        &self,
        index: usize,
        chunk: &Chunk<T>,
    ) -> Result<(), CacheError<T::Moment>> {
        let left = index.checked_sub(1).and_then(|i| self.chunks.get(i));
        let right = self.chunks.get(index);
        let adjacent = |a: Range<T::Moment>, b: Range<T::Moment>| {
            a.end().advance(self.resolution) == b.start()
        };

        let merge_left = left.filter(|l| adjacent(l.range(), chunk.range()));
        let merge_right = right.filter(|r| adjacent(chunk.range(), r.range()));

        let run: Vec<&Chunk<T>> = merge_left
            .into_iter()
            .chain(std::iter::once(chunk))
            .chain(merge_right)
            .collect();
        let merged = Range::ordered(
            run[0].range().start(),
            run[run.len() - 1].range().end(),
        );

        let mut previous: Option<T::Moment> = None;
        for part in &run {
            if let (Some(prev), Some(next)) = (previous, part.first_moment()) {
                if prev.advance(self.resolution) != next {
                    return Err(CacheError::SpacingMismatch {
                        range: merged,
                        previous: prev,
                        next,
                        resolution: self.resolution,
                    });
                }
            }
            if let Some(last) = part.last_moment() {
                previous = Some(last);
            }
        }

        // A run may only leave a hole at an edge with no data beyond it
        let run_start = index - usize::from(merge_left.is_some());
        let run_end = index + usize::from(merge_right.is_some());
        let holds_items = |chunks: &[Chunk<T>]| chunks.iter().any(|c| !c.is_empty());
        let data_before = holds_items(&self.chunks[..run_start]);
        let data_after = holds_items(&self.chunks[run_end..]);
        let run_has_items = run.iter().any(|c| !c.is_empty());

        let first = run.iter().find_map(|c| c.first_moment());
        let last = run.iter().rev().find_map(|c| c.last_moment());
        check_edges(
            merged,
            first.filter(|_| data_before),
            last.filter(|_| data_after),
        )?;

        if let Some(left) = run_start.checked_sub(1) {
            let neighbour = &self.chunks[left];
            check_edges(
                neighbour.range(),
                neighbour.first_moment().filter(|_| holds_items(&self.chunks[..left])),
                neighbour
                    .last_moment()
                    .filter(|_| run_has_items || data_after),
            )?;
        }
        if let Some(neighbour) = self.chunks.get(run_end) {
            check_edges(
                neighbour.range(),
                neighbour.first_moment().filter(|_| data_before || run_has_items),
                neighbour
                    .last_moment()
                    .filter(|_| holds_items(&self.chunks[run_end + 1..])),
            )?;
        }

        Ok(())
    }

    /// Merge every adjacent pair separated by exactly one resolution.
    fn optimize(&mut self) {
        let mut i = 0;
        while i + 1 < self.chunks.len() {
            let end = self.chunks[i].range().end();
            if end.advance(self.resolution) == self.chunks[i + 1].range().start() {
                let next = self.chunks.remove(i + 1);
                self.chunks[i].append(next);
            } else {
                i += 1;
            }
        }
    }

    /// Drop everything outside `window`, truncating chunks that straddle it.
    pub fn retain_within(&mut self, window: &Range<T::Moment>) {
        self.chunks.retain_mut(|chunk| chunk.truncate(window));
    }

    /// Switch resolution. Returns `true` if the cache was cleared.
    pub fn set_resolution(&mut self, resolution: Span<T>) -> Result<bool, CacheError<T::Moment>> {
        if !T::Moment::is_positive(resolution) {
            return Err(CacheError::InvalidResolution(resolution));
        }
        if resolution == self.resolution {
            return Ok(false);
        }
        self.resolution = resolution;
        self.chunks.clear();
        Ok(true)
    }

    /// Drop all chunks.
    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
