//! Error types for cache integrity and malformed queries.

use thiserror::Error;

use crate::moment::Moment;
use crate::range::Range;

/// Errors raised by [`Range`], chunk construction and [`RangeCache`](crate::cache::RangeCache).
///
/// Two families share this enum:
///
/// - **Malformed queries** (`InvalidRange`, `InvalidResolution`): the caller
///   passed arguments that can never be valid.
/// - **Integrity violations** (everything else): the data handed to the cache
///   contradicts its invariants, which means the fetch function returned
///   inconsistent data or the loader requested overlapping ranges. These are
///   never repaired silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError<M: Moment> {
    /// Range start lies after its end.
    #[error("Invalid range: start {start:?} is after end {end:?}")]
    InvalidRange { start: M, end: M },

    /// Resolution is zero or negative.
    #[error("Invalid resolution {0:?}: must be positive")]
    InvalidResolution(M::Span),

    /// An item's moment falls outside the chunk that carries it.
    #[error("Item at {moment:?} lies outside chunk {range}")]
    ItemOutsideRange { range: Range<M>, moment: M },

    /// Items of a checked chunk are not strictly ascending.
    #[error("Items of chunk {range} are not ascending: {previous:?} followed by {next:?}")]
    UnsortedItems {
        range: Range<M>,
        previous: M,
        next: M,
    },

    /// Consecutive items are not exactly one resolution apart.
    #[error(
        "Spacing mismatch in chunk {range}: {previous:?} followed by {next:?}, expected {resolution:?}"
    )]
    SpacingMismatch {
        range: Range<M>,
        previous: M,
        next: M,
        resolution: M::Span,
    },

    /// An interior chunk's items do not land on its range edges.
    #[error("Chunk {range} holds items {first:?}..{last:?} which do not reach its edges")]
    BoundaryMismatch { range: Range<M>, first: M, last: M },

    /// A new chunk shares at least one point with an existing chunk.
    #[error("Chunk {new} overlaps existing chunk {existing}")]
    Overlap { new: Range<M>, existing: Range<M> },
}

impl<M: Moment> CacheError<M> {
    /// Whether this error signals corrupted data rather than a bad argument.
    pub fn is_integrity(&self) -> bool {
        !matches!(
            self,
            CacheError::InvalidRange { .. } | CacheError::InvalidResolution(_)
        )
    }
}
