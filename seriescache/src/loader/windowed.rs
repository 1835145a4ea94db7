//! Windowed lazy loader.
//!
//! Pairs a [`RangeCache`] with a [`BoundsTracker`] and an injected
//! [`Fetcher`]. Renderers poll [`WindowedLoader::get_items`] every frame; when
//! it reports a miss they trigger [`WindowedLoader::load_items`] (or
//! [`WindowedLoader::spawn_load`]) and poll again once it completes.
//!
//! # State Machine
//!
//! ```text
//! Idle --[load_items]--> Loading --[commit | fetch error | cancel]--> Idle
//!                           │
//!                           └─[load_items]--> LoaderError::Busy
//! ```
//!
//! # Concurrency
//!
//! Cache and tracker live behind one `parking_lot::Mutex`, which is never
//! held across an await. Fetches for all missing sub-ranges run concurrently
//! and are joined before anything is written, so a load either commits every
//! sub-range or none of them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{ChunkPolicy, Match, RangeCache};
use crate::config::LoaderConfig;
use crate::error::CacheError;
use crate::loader::bounds::BoundsTracker;
use crate::loader::error::LoaderError;
use crate::loader::fetch::Fetcher;
use crate::moment::{Clock, Moment};
use crate::range::Range;
use crate::series::Sample;

type Span<T> = <<T as Sample>::Moment as Moment>::Span;

/// Answer to a synchronous window query.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    /// `false` means the window is unknown and must be loaded.
    pub found: bool,
    /// Items inside the requested window (empty when not found).
    pub items: Vec<T>,
}

impl<T> Lookup<T> {
    pub fn found(items: Vec<T>) -> Self {
        Self { found: true, items }
    }

    pub fn missing() -> Self {
        Self {
            found: false,
            items: Vec::new(),
        }
    }
}

/// Outcome of a completed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport<M> {
    /// Window the load covered, or `None` if it lay in a confirmed-empty zone.
    pub window: Option<Range<M>>,
    /// Sub-ranges that were fetched.
    pub fetched: Vec<Range<M>>,
    /// Number of items received.
    pub items: usize,
    /// `false` when results were discarded because the cache was cleared
    /// or switched resolution mid-flight.
    pub committed: bool,
}

impl<M> LoadReport<M> {
    fn nothing(window: Option<Range<M>>) -> Self {
        Self {
            window,
            fetched: Vec::new(),
            items: 0,
            committed: true,
        }
    }
}

/// Point-in-time counters for a loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoaderStats {
    pub chunks: usize,
    pub items: usize,
    pub loads: u64,
    pub fetches: u64,
}

struct LoaderState<T: Sample> {
    cache: RangeCache<T>,
    tracker: BoundsTracker<T::Moment>,
    /// Bumped on clear/resolution change so in-flight loads can tell they are stale.
    generation: u64,
}

/// Clears the loading flag however the load ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Lazily loaded, windowed view over a conceptually infinite series.
pub struct WindowedLoader<T: Sample> {
    config: LoaderConfig,
    fetcher: Arc<dyn Fetcher<T>>,
    clock: Arc<dyn Clock<T::Moment>>,
    state: Mutex<LoaderState<T>>,
    loading: AtomicBool,
    loads: AtomicU64,
    fetches: AtomicU64,
}

impl<T: Sample> std::fmt::Debug for WindowedLoader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedLoader")
            .field("config", &self.config)
            .field("loading", &self.loading)
            .finish_non_exhaustive()
    }
}

impl<T: Sample> WindowedLoader<T> {
    /// Create a loader for samples spaced by `resolution`.
    pub fn new(
        resolution: Span<T>,
        fetcher: Arc<dyn Fetcher<T>>,
        clock: Arc<dyn Clock<T::Moment>>,
        config: LoaderConfig,
    ) -> Result<Self, LoaderError<T::Moment>> {
        config.validate()?;
        let cache = RangeCache::new(resolution, config.chunk_policy)?;
        let tracker = BoundsTracker::new(clock.now());

        Ok(Self {
            config,
            fetcher,
            clock,
            state: Mutex::new(LoaderState {
                cache,
                tracker,
                generation: 0,
            }),
            loading: AtomicBool::new(false),
            loads: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn resolution(&self) -> Span<T> {
        self.state.lock().cache.resolution()
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        self.config.chunk_policy
    }

    /// Whether a load is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Extent of cached chunks, or the epoch sentinel when empty.
    pub fn bounds(&self) -> Range<T::Moment> {
        self.state.lock().cache.bounds()
    }

    /// Extent of cached chunks, or `None` when nothing is cached.
    pub fn coverage(&self) -> Option<Range<T::Moment>> {
        let state = self.state.lock();
        (!state.cache.is_empty()).then(|| state.cache.bounds())
    }

    /// Snapshot of the confirmed-empty zones.
    pub fn tracker(&self) -> BoundsTracker<T::Moment> {
        self.state.lock().tracker.clone()
    }

    /// Counter bumped by every `clear` and resolution change.
    ///
    /// Caches layered on top compare it to notice their copy is stale.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn stats(&self) -> LoaderStats {
        let state = self.state.lock();
        LoaderStats {
            chunks: state.cache.len(),
            items: state.cache.item_count(),
            loads: self.loads.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
        }
    }

    /// Synchronous window query. Never blocks on I/O.
    ///
    /// Returns `found = false` when the buffered window around `[start, end]`
    /// is not cached yet. `found = true` with no items means the window is
    /// known to be empty.
    pub fn get_items(
        &self,
        start: T::Moment,
        end: T::Moment,
    ) -> Result<Lookup<T>, CacheError<T::Moment>> {
        Range::new(start, end)?;
        let mut state = self.state.lock();
        let resolution = state.cache.resolution();

        let (min, max) = state
            .tracker
            .get_bounds(start, end, self.config.buffer_zone_factor);
        let from = start.max(min);
        let to = end.min(max);
        if from > to {
            // Entire window lies in a confirmed-empty zone
            return Ok(Lookup::found(Vec::new()));
        }
        let visible = Range::ordered(from, to).snap(resolution);

        if state.cache.is_empty() {
            let known_empty = state.tracker.contains(visible.start(), visible.end());
            return Ok(if known_empty {
                Lookup::found(Vec::new())
            } else {
                Lookup::missing()
            });
        }

        let (keep_min, keep_max) = state
            .tracker
            .get_bounds(start, end, self.config.cache_zone_factor);
        if keep_min <= keep_max {
            let retained = Range::ordered(keep_min, keep_max).snap(resolution);
            state.cache.retain_within(&retained);
        }

        let buffered = Range::ordered(min, max).snap(resolution);
        if !state.cache.has_data(&buffered) {
            return Ok(Lookup::missing());
        }
        Ok(Lookup::found(items_from(state.cache.get_data(&visible), from)))
    }

    /// Point lookup for hover/crosshair features.
    pub fn get_item(&self, moment: T::Moment, policy: Match) -> Option<T> {
        self.state.lock().cache.get_item(moment, policy).cloned()
    }

    /// Fetch whatever is missing around `[start, end]` and commit it.
    ///
    /// Only one load may run at a time; a concurrent call fails with
    /// [`LoaderError::Busy`]. The loading flag is released however the load
    /// ends, including when the future is dropped.
    pub async fn load_items(
        &self,
        start: T::Moment,
        end: T::Moment,
    ) -> Result<LoadReport<T::Moment>, LoaderError<T::Moment>> {
        Range::new(start, end)?;
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LoaderError::Busy)?;
        let _guard = LoadingGuard(&self.loading);
        self.loads.fetch_add(1, Ordering::Relaxed);

        let (generation, resolution, window, gaps) = {
            let mut state = self.state.lock();
            state.tracker.advance(self.clock.now());

            let (min, max) = state
                .tracker
                .get_bounds(start, end, self.config.load_zone_factor);
            if min > max {
                debug!(?start, ?end, "Load window lies in a confirmed-empty zone");
                return Ok(LoadReport::nothing(None));
            }
            let resolution = state.cache.resolution();
            let window = Range::ordered(min, max).snap(resolution);
            if state.cache.is_empty() && state.tracker.contains(window.start(), window.end()) {
                debug!(%window, "Load window already proven empty");
                return Ok(LoadReport::nothing(None));
            }
            let gaps = state.cache.get_empty_ranges(&window);
            (state.generation, resolution, window, gaps)
        };

        if gaps.is_empty() {
            debug!(%window, "Load window already cached");
            return Ok(LoadReport::nothing(Some(window)));
        }

        debug!(%window, sub_ranges = gaps.len(), "Fetching missing sub-ranges");
        self.fetches.fetch_add(gaps.len() as u64, Ordering::Relaxed);

        let requests = gaps.iter().map(|&gap| {
            let fetch = self.fetcher.fetch(resolution, gap);
            async move {
                fetch
                    .await
                    .map(|items| (gap, items))
                    .map_err(|source| LoaderError::Fetch { range: gap, source })
            }
        });
        let results = match try_join_all(requests).await {
            Ok(results) => results,
            Err(e) => {
                warn!(%window, error = %e, "Load failed, nothing committed");
                return Err(e);
            }
        };

        self.commit(generation, window, results)
    }

    fn commit(
        &self,
        generation: u64,
        window: Range<T::Moment>,
        results: Vec<(Range<T::Moment>, Vec<T>)>,
    ) -> Result<LoadReport<T::Moment>, LoaderError<T::Moment>> {
        let fetched: Vec<Range<T::Moment>> = results.iter().map(|(range, _)| *range).collect();
        let items: usize = results.iter().map(|(_, items)| items.len()).sum();
        let mut state = self.state.lock();

        if state.generation != generation {
            warn!(%window, "Cache was reset during load, discarding results");
            return Ok(LoadReport {
                window: Some(window),
                fetched,
                items,
                committed: false,
            });
        }

        if state.cache.is_empty() && items == 0 {
            state.tracker.shrink_bounds(window.start(), window.end());
            debug!(%window, "Window is empty, remembered");
        } else {
            for (range, batch) in results {
                state.cache.add_data(range, batch)?;
            }
            if let Some(extent) = state.cache.item_extent() {
                state.tracker.extend_bounds(extent.start(), extent.end());
                // Only the chunk holding the first sample proves its own head
                // empty; earlier chunks may be separated from it by a hole
                let head = state
                    .cache
                    .chunks()
                    .find(|chunk| !chunk.is_empty())
                    .map(|chunk| chunk.range().start());
                if let Some(head) = head.filter(|&head| head < extent.start()) {
                    state.tracker.mark_empty_before(head, extent.start());
                }
            }
            debug!(
                %window,
                items,
                chunks = state.cache.len(),
                "Committed load"
            );
        }

        Ok(LoadReport {
            window: Some(window),
            fetched,
            items,
            committed: true,
        })
    }

    /// Like [`load_items`](Self::load_items), but gives up when `cancel` fires.
    ///
    /// A cancelled load commits nothing.
    pub async fn load_items_with_cancel(
        &self,
        start: T::Moment,
        end: T::Moment,
        cancel: CancellationToken,
    ) -> Result<LoadReport<T::Moment>, LoaderError<T::Moment>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(?start, ?end, "Load cancelled");
                Err(LoaderError::Cancelled)
            }
            result = self.load_items(start, end) => result,
        }
    }

    /// Fire-and-forget load on the tokio runtime.
    ///
    /// `on_loaded` runs once, only if the load succeeds. The returned handle
    /// still carries the result for callers that want to observe failures.
    pub fn spawn_load<F>(
        self: &Arc<Self>,
        start: T::Moment,
        end: T::Moment,
        on_loaded: F,
    ) -> JoinHandle<Result<LoadReport<T::Moment>, LoaderError<T::Moment>>>
    where
        F: FnOnce() + Send + 'static,
    {
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            let result = loader.load_items(start, end).await;
            if result.is_ok() {
                on_loaded();
            }
            result
        })
    }

    /// Switch resolution. Clears the cache and resets the tracker when it
    /// differs from the current one; a no-op otherwise.
    pub fn set_resolution(&self, resolution: Span<T>) -> Result<bool, CacheError<T::Moment>> {
        let mut state = self.state.lock();
        let changed = state.cache.set_resolution(resolution)?;
        if changed {
            state.tracker.reset(self.clock.now());
            state.generation += 1;
            info!(?resolution, "Resolution changed, cache cleared");
        }
        Ok(changed)
    }

    /// Drop all cached data and forget confirmed-empty zones.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.cache.clear();
        state.tracker.reset(self.clock.now());
        state.generation += 1;
        info!("Cache cleared");
    }
}

/// Drop the leading items that the grid-snapped window pulled in before `from`.
pub(crate) fn items_from<T: Sample>(mut items: Vec<T>, from: T::Moment) -> Vec<T> {
    let skip = items.partition_point(|item| item.moment() < from);
    items.drain(..skip);
    items
}
