//! Integration tests for the windowed loader.
//!
//! These tests drive the public API the way a chart renderer does:
//! - poll `get_items` and load on a miss
//! - scroll across confirmed-empty regions
//! - layer a derived series over a loaded one
//!
//! Run with: `cargo test --test loader_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tokio::sync::oneshot;

use seriescache::loader::{BoxFuture, FetchError, Fetcher};
use seriescache::{
    Candle, DerivedCache, FixedClock, LoaderConfig, LoaderError, Match, Range, Value,
    WindowedLoader,
};

// ============================================================================
// Helper Functions
// ============================================================================

/// Fetcher serving a fixed set of moments, counting every call.
struct FixedSeries {
    moments: Vec<i64>,
    calls: AtomicUsize,
}

impl FixedSeries {
    fn new(moments: impl IntoIterator<Item = i64>) -> Arc<Self> {
        Arc::new(Self {
            moments: moments.into_iter().collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher<Value<i64>> for FixedSeries {
    fn fetch(
        &self,
        _resolution: i64,
        range: Range<i64>,
    ) -> BoxFuture<'_, Result<Vec<Value<i64>>, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items = self
            .moments
            .iter()
            .filter(|m| range.contains_point(**m))
            .map(|&m| Value::new(m, m as f64 * 10.0))
            .collect();
        Box::pin(async move { Ok(items) })
    }
}

fn loader(series: Arc<FixedSeries>, now: i64) -> Arc<WindowedLoader<Value<i64>>> {
    Arc::new(
        WindowedLoader::new(
            1,
            series,
            Arc::new(FixedClock::new(now)),
            LoaderConfig::default(),
        )
        .unwrap(),
    )
}

fn moments(items: &[Value<i64>]) -> Vec<i64> {
    items.iter().map(|v| v.moment).collect()
}

// ============================================================================
// Integration Tests
// ============================================================================

/// A miss, a load, then a hit with exactly the requested items.
#[tokio::test]
async fn test_end_to_end_load_and_query() {
    const T0: i64 = 100;
    let series = FixedSeries::new(T0..=T0 + 2);
    let loader = loader(Arc::clone(&series), 1_000);

    let lookup = loader.get_items(T0, T0 + 1).unwrap();
    assert!(!lookup.found);
    assert!(lookup.items.is_empty());

    let (done_tx, done_rx) = oneshot::channel();
    let _handle = loader.spawn_load(T0, T0 + 1, move || {
        let _ = done_tx.send(());
    });
    done_rx.await.unwrap();

    let lookup = loader.get_items(T0, T0 + 1).unwrap();
    assert!(lookup.found);
    assert_eq!(moments(&lookup.items), vec![T0, T0 + 1]);

    let bounds = loader.bounds();
    assert!(bounds.contains(&Range::new(T0, T0 + 1).unwrap()));
    assert!(!loader.is_loading());
}

/// An empty fetch is remembered and not repeated.
#[tokio::test]
async fn test_empty_region_is_memoized() {
    let series = FixedSeries::new(Vec::new());
    let loader = loader(Arc::clone(&series), 1_000);

    assert!(!loader.get_items(200, 300).unwrap().found);
    loader.load_items(200, 300).await.unwrap();
    assert_eq!(series.calls(), 1);

    let lookup = loader.get_items(200, 300).unwrap();
    assert!(lookup.found);
    assert!(lookup.items.is_empty());

    let report = loader.load_items(200, 300).await.unwrap();
    assert_eq!(report.window, None);
    assert_eq!(series.calls(), 1);
}

/// Scrolling forward fetches only what is new, and never past "now".
#[tokio::test]
async fn test_scrolling_fetches_increments() {
    let series = FixedSeries::new(0..=1_000);
    let loader = loader(Arc::clone(&series), 1_000);

    let mut start = 100;
    while start < 900 {
        let end = start + 50;
        if !loader.get_items(start, end).unwrap().found {
            loader.load_items(start, end).await.unwrap();
        }
        let lookup = loader.get_items(start, end).unwrap();
        assert!(lookup.found, "window [{}, {}] not satisfied", start, end);
        assert_eq!(lookup.items.len(), 51);
        start += 25;
    }

    // Far fewer fetches than windows
    assert!(series.calls() < 16, "{} fetches", series.calls());
    assert!(loader.bounds().end() <= 1_000);

    let stats = loader.stats();
    assert_eq!(stats.chunks, 1);
    assert_eq!(stats.fetches as usize, series.calls());
}

/// Windows past "now" are answered without fetching.
#[tokio::test]
async fn test_future_is_known_empty() {
    let series = FixedSeries::new(0..=1_000);
    let loader = loader(Arc::clone(&series), 1_000);

    let lookup = loader.get_items(1_100, 1_200).unwrap();
    assert!(lookup.found);
    assert!(lookup.items.is_empty());
    assert_eq!(series.calls(), 0);
}

/// The callback never fires for a failed load.
#[tokio::test]
async fn test_failed_load_skips_callback() {
    struct Unavailable;

    impl Fetcher<Value<i64>> for Unavailable {
        fn fetch(
            &self,
            _resolution: i64,
            _range: Range<i64>,
        ) -> BoxFuture<'_, Result<Vec<Value<i64>>, FetchError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err(FetchError::new("exchange unavailable"))
            })
        }
    }

    let loader = Arc::new(
        WindowedLoader::new(
            1,
            Arc::new(Unavailable),
            Arc::new(FixedClock::new(1_000)),
            LoaderConfig::default(),
        )
        .unwrap(),
    );
    let called = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&called);

    let result = loader
        .spawn_load(0, 10, move || {
            flag.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert!(matches!(result, Err(LoaderError::Fetch { .. })));
    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert!(!loader.is_loading());
    assert!(!loader.get_items(0, 10).unwrap().found);
}

/// Wall-clock axis with one-minute candles.
#[tokio::test]
async fn test_datetime_axis() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let open = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let minute = TimeDelta::minutes(1);

    let fetcher = seriescache::loader::FnFetcher::new(
        move |resolution: TimeDelta, range: Range<DateTime<Utc>>| async move {
            let mut items = Vec::new();
            let mut moment = range.start().max(open);
            while moment <= range.end() {
                items.push(Candle::flat(moment, 1.0, 2.0, 10.0));
                moment += resolution;
            }
            Ok::<_, FetchError>(items)
        },
    );
    let loader: WindowedLoader<Candle<DateTime<Utc>>> = WindowedLoader::new(
        minute,
        Arc::new(fetcher),
        Arc::new(FixedClock::new(now)),
        LoaderConfig::default(),
    )
    .unwrap();

    let at = |h, m| Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap();

    loader.load_items(at(10, 0), at(10, 30)).await.unwrap();
    let lookup = loader.get_items(at(10, 0), at(10, 30)).unwrap();
    assert!(lookup.found);
    assert_eq!(lookup.items.len(), 31);
    assert_eq!(lookup.items[0].moment, at(10, 0));

    // Approaching "now" loads the rest but nothing beyond it
    assert!(!loader.get_items(at(11, 50), at(12, 30)).unwrap().found);
    loader.load_items(at(11, 50), at(12, 30)).await.unwrap();
    let lookup = loader.get_items(at(11, 50), at(12, 30)).unwrap();
    assert!(lookup.found);
    assert_eq!(lookup.items.len(), 11);
    assert_eq!(lookup.items.last().map(|c| c.moment), Some(now));
    assert_eq!(loader.bounds().end(), now);
}

/// A derived series reads through its source and caches projections.
#[tokio::test]
async fn test_derived_series_over_loader() {
    let series = FixedSeries::new(0..=500);
    let source = loader(Arc::clone(&series), 1_000);
    let double = |values: &[Value<i64>]| {
        values
            .iter()
            .map(|v| Value::new(v.moment, v.value * 2.0))
            .collect::<Vec<_>>()
    };
    let doubled: DerivedCache<Value<i64>, Value<i64>> =
        DerivedCache::new(Arc::clone(&source), double).unwrap();

    assert!(!doubled.get_items(200, 220).unwrap().found);
    doubled.load_items(200, 220).await.unwrap();

    let lookup = doubled.get_items(200, 220).unwrap();
    assert!(lookup.found);
    assert_eq!(lookup.items.len(), 21);
    assert_eq!(lookup.items[0], Value::new(200, 4_000.0));
    assert_eq!(
        doubled.get_item(210, Match::Exact),
        Some(Value::new(210, 4_200.0))
    );
    assert_eq!(series.calls(), 1);
}

/// Five-tick candles queried with windows that fall between grid points.
#[tokio::test]
async fn test_coarse_grid_with_off_grid_windows() {
    let series = FixedSeries::new((0..=1_000).step_by(5));
    let source = Arc::new(
        WindowedLoader::new(
            5,
            Arc::clone(&series) as Arc<dyn Fetcher<Value<i64>>>,
            Arc::new(FixedClock::new(1_000)),
            LoaderConfig::default(),
        )
        .unwrap(),
    );
    let halved: DerivedCache<Value<i64>, Value<i64>> = DerivedCache::new(
        Arc::clone(&source),
        |values: &[Value<i64>]| {
            values
                .iter()
                .map(|v| Value::new(v.moment, v.value / 2.0))
                .collect::<Vec<_>>()
        },
    )
    .unwrap();

    halved.load_items(203, 238).await.unwrap();

    let lookup = source.get_items(203, 238).unwrap();
    assert!(lookup.found);
    assert_eq!(moments(&lookup.items), vec![205, 210, 215, 220, 225, 230, 235]);

    let lookup = halved.get_items(203, 238).unwrap();
    assert_eq!(moments(&lookup.items), vec![205, 210, 215, 220, 225, 230, 235]);
    assert_eq!(lookup.items[0], Value::new(205, 1_025.0));
    assert_eq!(series.calls(), 1);
}
