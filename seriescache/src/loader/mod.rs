//! Lazy, windowed loading on top of [`RangeCache`](crate::cache::RangeCache).
//!
//! # Zones
//!
//! Every query window `[start, end]` is expanded by `(end - start) * factor`
//! on each side, with one factor per purpose:
//!
//! ```text
//!            ◄───────────── cache zone (retention) ─────────────►
//!                 ◄──────── load zone (prefetch) ────────►
//!                       ◄── buffer zone ──►
//!                           [ visible ]
//! ```
//!
//! A query is satisfied when the whole buffer zone is cached. A load fetches
//! the missing parts of the load zone. Chunks outside the cache zone are
//! dropped on the next query. Zones never reach into stretches the
//! [`BoundsTracker`] has proven empty.

mod bounds;
mod error;
mod fetch;
mod windowed;

pub use bounds::BoundsTracker;
pub use error::LoaderError;
pub use fetch::{BoxError, BoxFuture, FetchError, Fetcher, FnFetcher};
pub use windowed::{LoadReport, LoaderStats, Lookup, WindowedLoader};
pub(crate) use windowed::items_from;
