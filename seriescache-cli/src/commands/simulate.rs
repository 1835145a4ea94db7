//! Simulate command - scroll a chart window over a synthetic candle series.
//!
//! Each frame polls the loader the way a renderer would: query the visible
//! window, load on a miss, then move the window back in time by one step.
//! Loads that exceed the optional deadline are cancelled and retried on a
//! later frame.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use seriescache::loader::{BoxFuture, FetchError, Fetcher, LoaderStats};
use seriescache::{Candle, DerivedCache, FixedClock, LoaderConfig, Moment, Range, Value, WindowedLoader};

use crate::error::CliError;

/// Arguments for the simulate command.
#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub resolution: i64,
    pub now: i64,
    pub history: i64,
    pub width: i64,
    pub step: i64,
    pub frames: usize,
    pub latency_ms: u64,
    pub deadline_ms: Option<u64>,
    pub seed: u64,
    pub derived: bool,
    pub json: bool,
}

/// Deterministic candle series starting at `first`.
struct SyntheticSource {
    first: i64,
    seed: u64,
    latency: Duration,
}

impl SyntheticSource {
    fn candle(&self, moment: i64) -> Candle<i64> {
        let mut rng = rng_for(self.seed, moment);
        let base = 100.0 + (moment as f64 / 500.0).sin() * 10.0;
        let open = base + rng.random_range(-1.0..1.0);
        let close = base + rng.random_range(-1.0..1.0);
        let wick = rng.random_range(0.0..0.5);
        Candle {
            moment,
            open,
            high: open.max(close) + wick,
            low: open.min(close) - wick,
            close,
            volume: rng.random_range(10.0..1_000.0),
        }
    }
}

fn rng_for(seed: u64, moment: i64) -> StdRng {
    StdRng::seed_from_u64(seed ^ (moment as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

impl Fetcher<Candle<i64>> for SyntheticSource {
    fn fetch(
        &self,
        resolution: i64,
        range: Range<i64>,
    ) -> BoxFuture<'_, Result<Vec<Candle<i64>>, FetchError>> {
        let first = range.start().max(self.first).ceil(resolution);
        let items: Vec<Candle<i64>> = if first > range.end() {
            Vec::new()
        } else {
            (first..=range.end())
                .step_by(resolution as usize)
                .map(|m| self.candle(m))
                .collect()
        };

        // Jitter between 0.5x and 1.5x the base latency
        let factor = rng_for(self.seed, range.start()).random_range(0.5..1.5);
        let latency = self.latency.mul_f64(factor);

        Box::pin(async move {
            tokio::time::sleep(latency).await;
            Ok(items)
        })
    }
}

fn candle_mids(candles: &[Candle<i64>]) -> Vec<Value<i64>> {
    candles
        .iter()
        .map(|c| Value::new(c.moment, c.mid()))
        .collect()
}

/// Counters collected over a run.
#[derive(Debug, Default)]
struct Summary {
    frames: usize,
    hits: usize,
    misses: usize,
    incomplete_loads: usize,
    items_drawn: usize,
    derived_items: usize,
    elapsed: Duration,
    stats: LoaderStats,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, config: LoaderConfig) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let summary = runtime.block_on(simulate(&args, config))?;

    if args.json {
        let report = json!({
            "frames": summary.frames,
            "hits": summary.hits,
            "misses": summary.misses,
            "incomplete_loads": summary.incomplete_loads,
            "items_drawn": summary.items_drawn,
            "derived_items": summary.derived_items,
            "elapsed_ms": summary.elapsed.as_millis() as u64,
            "loader": serde_json::to_value(summary.stats)?,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

async fn simulate(args: &SimulateArgs, config: LoaderConfig) -> Result<Summary, CliError> {
    let source = Arc::new(SyntheticSource {
        first: args.now.saturating_sub(args.history),
        seed: args.seed,
        latency: Duration::from_millis(args.latency_ms),
    });
    let clock = Arc::new(FixedClock::new(args.now));
    let loader = Arc::new(
        WindowedLoader::new(args.resolution, source, clock, config)
            .map_err(|e| CliError::Config(e.to_string()))?,
    );
    let derived = if args.derived {
        let cache: DerivedCache<Candle<i64>, Value<i64>> =
            DerivedCache::new(Arc::clone(&loader), candle_mids)
                .map_err(|e| CliError::Config(e.to_string()))?;
        Some(cache)
    } else {
        None
    };

    info!(
        frames = args.frames,
        width = args.width,
        step = args.step,
        resolution = args.resolution,
        "Starting simulation"
    );

    let progress = if args.json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(args.frames as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} frames {msg}")
                .map_err(|e| CliError::Output(e.to_string()))?
                .progress_chars("=> "),
        );
        bar
    };

    let started = Instant::now();
    let mut summary = Summary::default();
    let mut end = args.now;

    for frame in 0..args.frames {
        let start = end.saturating_sub(args.width);
        let lookup = loader
            .get_items(start, end)
            .map_err(|e| CliError::Simulation(e.to_string()))?;

        if lookup.found {
            summary.hits += 1;
            summary.items_drawn += lookup.items.len();
        } else {
            summary.misses += 1;
            let cancel = CancellationToken::new();
            if let Some(deadline) = args.deadline_ms {
                let timer = cancel.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(deadline)).await;
                    timer.cancel();
                });
            }

            match loader.load_items_with_cancel(start, end, cancel).await {
                Ok(report) => {
                    debug!(frame, fetched = report.fetched.len(), items = report.items, "Frame load");
                }
                Err(e) if e.is_retryable() => {
                    summary.incomplete_loads += 1;
                    warn!(frame, error = %e, "Load did not complete, retrying next frame");
                }
                Err(e) => return Err(CliError::Simulation(e.to_string())),
            }
        }

        if let Some(derived) = &derived {
            let lookup = derived
                .get_items(start, end)
                .map_err(|e| CliError::Simulation(e.to_string()))?;
            summary.derived_items += lookup.items.len();
        }

        summary.frames += 1;
        end = end.saturating_sub(args.step);
        progress.set_message(format!("window ends at {}", end));
        progress.inc(1);
    }

    progress.finish_and_clear();
    summary.elapsed = started.elapsed();
    summary.stats = loader.stats();

    info!(
        hits = summary.hits,
        misses = summary.misses,
        fetches = summary.stats.fetches,
        "Simulation finished"
    );
    Ok(summary)
}

fn print_summary(summary: &Summary) {
    println!("Simulation Summary");
    println!("==================");
    println!();
    println!("Frames:           {}", summary.frames);
    println!("Hits:             {}", summary.hits);
    println!("Misses:           {}", summary.misses);
    println!("Incomplete loads: {}", summary.incomplete_loads);
    println!("Items drawn:      {}", summary.items_drawn);
    if summary.derived_items > 0 {
        println!("Derived items:    {}", summary.derived_items);
    }
    println!("Elapsed:          {:.2?}", summary.elapsed);
    println!();
    println!("Loader");
    println!("  Loads:   {}", summary.stats.loads);
    println!("  Fetches: {}", summary.stats.fetches);
    println!("  Chunks:  {}", summary.stats.chunks);
    println!("  Items:   {}", summary.stats.items);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SimulateArgs {
        SimulateArgs {
            resolution: 10,
            now: 10_000,
            history: 2_000,
            width: 200,
            step: 50,
            frames: 60,
            latency_ms: 0,
            deadline_ms: None,
            seed: 7,
            derived: true,
            json: true,
        }
    }

    #[test]
    fn test_synthetic_candles_are_deterministic() {
        let source = SyntheticSource {
            first: 0,
            seed: 42,
            latency: Duration::ZERO,
        };
        let a = source.candle(1_234);
        let b = source.candle(1_234);
        assert_eq!(a, b);
        assert!(a.low <= a.open.min(a.close));
        assert!(a.high >= a.open.max(a.close));
    }

    #[tokio::test]
    async fn test_fetch_stays_on_grid_and_respects_first() {
        let source = SyntheticSource {
            first: 95,
            seed: 1,
            latency: Duration::ZERO,
        };
        let items = source.fetch(10, Range::new(50, 150).unwrap()).await.unwrap();
        let moments: Vec<i64> = items.iter().map(|c| c.moment).collect();
        assert_eq!(moments, vec![100, 110, 120, 130, 140, 150]);

        let none = source.fetch(10, Range::new(0, 80).unwrap()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_simulation_scrolls_past_series_start() {
        let summary = simulate(&args(), LoaderConfig::default()).await.unwrap();

        assert_eq!(summary.frames, 60);
        assert_eq!(summary.hits + summary.misses, 60);
        assert!(summary.hits > summary.misses);
        assert_eq!(summary.incomplete_loads, 0);
        assert!(summary.derived_items > 0);
        // Retention keeps the cache bounded while scrolling 3000 ticks
        assert!(summary.stats.items < 300);
    }
}
