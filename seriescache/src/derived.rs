//! Series computed from another cached series.
//!
//! A [`DerivedCache`] never fetches anything itself. It reads from a shared
//! source [`WindowedLoader`], runs a [`Projection`] over the source items it
//! has not seen yet, and keeps the projected items in a private unchecked
//! [`RangeCache`] so that expensive projections run once per span.
//!
//! ```text
//!   renderer ──get_items──► DerivedCache ──get_items──► WindowedLoader<S>
//!                               │                             │
//!                    RangeCache<D> (private)         RangeCache<S> + fetcher
//! ```
//!
//! When the source reports a miss the derived cache reports a miss too; the
//! caller loads through [`DerivedCache::load_items`] (which delegates to the
//! source) and queries again.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{ChunkPolicy, Match, RangeCache};
use crate::error::CacheError;
use crate::loader::{items_from, LoadReport, LoaderError, Lookup, WindowedLoader};
use crate::moment::Moment;
use crate::range::Range;
use crate::series::Sample;

type Span<M> = <M as Moment>::Span;

/// Turns a run of source items into derived items.
///
/// Called with the source items of one uncached span at a time. Every
/// returned item must lie within that span.
pub trait Projection<S, D>: Send + Sync {
    fn project(&self, items: &[S]) -> Vec<D>;
}

impl<S, D, F> Projection<S, D> for F
where
    F: Fn(&[S]) -> Vec<D> + Send + Sync,
{
    fn project(&self, items: &[S]) -> Vec<D> {
        self(items)
    }
}

struct DerivedState<D: Sample> {
    cache: RangeCache<D>,
    /// Source generation the cached projections were computed from.
    generation: u64,
}

/// Cache of items projected from a source loader.
pub struct DerivedCache<S: Sample, D: Sample<Moment = S::Moment>> {
    source: Arc<WindowedLoader<S>>,
    projection: Box<dyn Projection<S, D>>,
    state: Mutex<DerivedState<D>>,
    forward_lifecycle: bool,
}

impl<S, D> DerivedCache<S, D>
where
    S: Sample,
    D: Sample<Moment = S::Moment>,
{
    /// Create a derived cache over `source`.
    pub fn new(
        source: Arc<WindowedLoader<S>>,
        projection: impl Projection<S, D> + 'static,
    ) -> Result<Self, CacheError<S::Moment>> {
        let cache = RangeCache::new(source.resolution(), ChunkPolicy::Unchecked)?;
        let generation = source.generation();
        Ok(Self {
            source,
            projection: Box::new(projection),
            state: Mutex::new(DerivedState { cache, generation }),
            forward_lifecycle: false,
        })
    }

    /// Also apply `set_resolution`/`clear` to the source loader.
    pub fn with_forward_lifecycle(mut self, forward: bool) -> Self {
        self.forward_lifecycle = forward;
        self
    }

    pub fn source(&self) -> &Arc<WindowedLoader<S>> {
        &self.source
    }

    pub fn forwards_lifecycle(&self) -> bool {
        self.forward_lifecycle
    }

    /// Follow the source's resolution and generation, clearing on change.
    fn sync_with_source(&self, state: &mut DerivedState<D>) -> Result<(), CacheError<S::Moment>> {
        let resolution = self.source.resolution();
        if state.cache.set_resolution(resolution)? {
            debug!(?resolution, "Derived cache followed source resolution");
        }
        let generation = self.source.generation();
        if state.generation != generation {
            state.cache.clear();
            state.generation = generation;
            debug!(generation, "Source was reset, derived items dropped");
        }
        Ok(())
    }

    /// Synchronous window query, same contract as [`WindowedLoader::get_items`].
    pub fn get_items(
        &self,
        start: S::Moment,
        end: S::Moment,
    ) -> Result<Lookup<D>, CacheError<S::Moment>> {
        let requested = Range::new(start, end)?;
        let mut state = self.state.lock();
        self.sync_with_source(&mut state)?;
        let cache = &mut state.cache;

        // Chunks stay on the grid; only the returned slice honours `start`
        let span = requested.snap(cache.resolution());
        if cache.has_data(&span) {
            return Ok(Lookup::found(items_from(cache.get_data(&span), start)));
        }

        let source = self.source.get_items(span.start(), span.end())?;
        if !source.found {
            return Ok(Lookup::missing());
        }
        let Some(coverage) = self.source.coverage() else {
            // Source knows the span is empty
            return Ok(Lookup::found(Vec::new()));
        };
        let Some(covered) = coverage.intersection(&span) else {
            return Ok(Lookup::found(Vec::new()));
        };
        cache.retain_within(&coverage);

        for gap in cache.get_empty_ranges(&covered) {
            let lo = source.items.partition_point(|item| item.moment() < gap.start());
            let hi = source.items.partition_point(|item| item.moment() <= gap.end());
            let projected = self.projection.project(&source.items[lo..hi]);
            debug!(
                %gap,
                source_items = hi - lo,
                derived_items = projected.len(),
                "Projected gap"
            );
            cache.add_data(gap, projected)?;
        }

        Ok(Lookup::found(items_from(cache.get_data(&covered), start)))
    }

    /// Point lookup into derived items already computed.
    pub fn get_item(&self, moment: S::Moment, policy: Match) -> Option<D> {
        self.state.lock().cache.get_item(moment, policy).cloned()
    }

    /// Load the source around `[start, end]`.
    pub async fn load_items(
        &self,
        start: S::Moment,
        end: S::Moment,
    ) -> Result<LoadReport<S::Moment>, LoaderError<S::Moment>> {
        self.source.load_items(start, end).await
    }

    pub fn is_loading(&self) -> bool {
        self.source.is_loading()
    }

    /// Extent of the source's cached chunks.
    pub fn bounds(&self) -> Range<S::Moment> {
        self.source.bounds()
    }

    /// Change resolution. The source only changes when lifecycle forwarding
    /// is enabled; otherwise the derived cache keeps following the source.
    pub fn set_resolution(&self, resolution: Span<S::Moment>) -> Result<bool, CacheError<S::Moment>> {
        let mut state = self.state.lock();
        if self.forward_lifecycle {
            self.source.set_resolution(resolution)?;
        }
        let previous = state.cache.resolution();
        self.sync_with_source(&mut state)?;
        Ok(state.cache.resolution() != previous)
    }

    /// Drop derived items (and source data when forwarding).
    pub fn clear(&self) {
        if self.forward_lifecycle {
            self.source.clear();
        }
        let mut state = self.state.lock();
        state.cache.clear();
        state.generation = self.source.generation();
    }
}
