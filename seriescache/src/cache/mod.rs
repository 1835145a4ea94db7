//! Chunked range cache.
//!
//! ```text
//! RangeCache ──► [Chunk][Chunk]...[Chunk]     sorted, non-overlapping
//!                  │
//!                  └─ Range + items           gap-free run of samples
//! ```
//!
//! The cache is fill-only: chunks are added by [`RangeCache::add_data`] and
//! removed wholesale by `clear`/`set_resolution`. The only partial removal is
//! [`RangeCache::retain_within`], which the windowed loader uses to cap how
//! much history it keeps around the visible window.

mod chunk;
mod range_cache;

pub use chunk::{Chunk, ChunkPolicy, Match};
pub use range_cache::RangeCache;
