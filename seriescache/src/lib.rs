//! SeriesCache - chunked range caching and lazy windowed loading for
//! time-series charts.
//!
//! A renderer asks a [`WindowedLoader`] for the items in its visible window
//! every frame. Hits are answered synchronously from a [`RangeCache`]; misses
//! are filled by an asynchronous [`Fetcher`](loader::Fetcher) that is only
//! asked for the sub-ranges that are genuinely missing. Stretches of the axis
//! proven empty (before the first sample, after "now") are remembered so they
//! are never fetched twice.
//!
//! [`DerivedCache`] layers a projection (e.g. candle midpoints) over another
//! loader without duplicating its fetching.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use seriescache::loader::{FetchError, FnFetcher};
//! use seriescache::moment::FixedClock;
//! use seriescache::series::Value;
//! use seriescache::{LoaderConfig, Range, WindowedLoader};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = FnFetcher::new(|resolution: i64, range: Range<i64>| async move {
//!     Ok::<_, FetchError>(
//!         (range.start()..=range.end())
//!             .step_by(resolution as usize)
//!             .map(|m| Value::new(m, m as f64))
//!             .collect::<Vec<_>>(),
//!     )
//! });
//! let loader = WindowedLoader::new(
//!     1,
//!     Arc::new(fetcher),
//!     Arc::new(FixedClock::new(1_000)),
//!     LoaderConfig::default(),
//! )?;
//!
//! assert!(!loader.get_items(100, 200)?.found);
//! loader.load_items(100, 200).await?;
//! let lookup = loader.get_items(100, 200)?;
//! assert!(lookup.found);
//! assert_eq!(lookup.items.len(), 101);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod derived;
pub mod error;
pub mod loader;
pub mod logging;
pub mod moment;
pub mod range;
pub mod series;

pub use cache::{Chunk, ChunkPolicy, Match, RangeCache};
pub use config::{ConfigError, LoaderConfig};
pub use derived::{DerivedCache, Projection};
pub use error::CacheError;
pub use loader::{BoundsTracker, LoaderError, Lookup, WindowedLoader};
pub use moment::{Clock, FixedClock, Moment, SystemClock};
pub use range::{Edges, Range};
pub use series::{Block, Candle, Sample, Value};
