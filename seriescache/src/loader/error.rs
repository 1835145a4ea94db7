//! Errors reported by the windowed loader.

use thiserror::Error;

use crate::config::ConfigError;
use crate::error::CacheError;
use crate::loader::fetch::FetchError;
use crate::moment::Moment;
use crate::range::Range;

/// Errors returned from loader construction and `load_items`.
#[derive(Debug, Error)]
pub enum LoaderError<M: Moment> {
    /// Another load is already in flight for this loader.
    #[error("A load is already in progress")]
    Busy,

    /// The load was cancelled before its results were committed.
    #[error("Load cancelled")]
    Cancelled,

    /// The fetch function failed for one of the requested sub-ranges.
    #[error("Fetch failed for {range}: {source}")]
    Fetch {
        range: Range<M>,
        #[source]
        source: FetchError,
    },

    /// Fetched data violated a cache invariant, or the query was malformed.
    #[error(transparent)]
    Cache(#[from] CacheError<M>),

    /// The loader configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl<M: Moment> LoaderError<M> {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LoaderError::Busy | LoaderError::Cancelled | LoaderError::Fetch { .. }
        )
    }
}
