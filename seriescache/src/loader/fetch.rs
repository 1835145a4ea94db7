//! Remote data source abstraction.
//!
//! The loader never talks to a backend directly; it is handed a [`Fetcher`]
//! that resolves `(resolution, range)` into the samples inside that range.
//! The contract:
//!
//! - items lie within the requested range and are sorted ascending
//! - for checked caches, items are evenly spaced by `resolution` and every
//!   sample that exists inside the range is returned
//!
//! Violations surface as integrity errors when the results are inserted;
//! they are never corrected silently.

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::moment::Moment;
use crate::range::Range;
use crate::series::Sample;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed error carried by a failed fetch.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A fetch that did not produce data.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl FetchError {
    /// Create an error from a message alone.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error with context.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Asynchronous source of samples for a range of the axis.
///
/// Uses `Pin<Box<dyn Future>>` so loaders can hold `Arc<dyn Fetcher<T>>`.
pub trait Fetcher<T: Sample>: Send + Sync {
    /// Fetch every sample in `range` at the given resolution.
    fn fetch(
        &self,
        resolution: <T::Moment as Moment>::Span,
        range: Range<T::Moment>,
    ) -> BoxFuture<'_, Result<Vec<T>, FetchError>>;
}

/// Adapts an async closure into a [`Fetcher`].
///
/// # Example
///
/// ```
/// use seriescache::loader::{FetchError, FnFetcher};
/// use seriescache::series::Value;
/// use seriescache::Range;
///
/// let fetcher = FnFetcher::new(|resolution: i64, range: Range<i64>| async move {
///     let items = (range.start()..=range.end())
///         .step_by(resolution as usize)
///         .map(|m| Value::new(m, 0.0))
///         .collect::<Vec<_>>();
///     Ok::<_, FetchError>(items)
/// });
/// # let _ = fetcher;
/// ```
pub struct FnFetcher<F> {
    f: F,
}

impl<F> FnFetcher<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F, Fut> Fetcher<T> for FnFetcher<F>
where
    T: Sample,
    F: Fn(<T::Moment as Moment>::Span, Range<T::Moment>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<T>, FetchError>> + Send + 'static,
{
    fn fetch(
        &self,
        resolution: <T::Moment as Moment>::Span,
        range: Range<T::Moment>,
    ) -> BoxFuture<'_, Result<Vec<T>, FetchError>> {
        Box::pin((self.f)(resolution, range))
    }
}
