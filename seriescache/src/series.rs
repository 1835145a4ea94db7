//! Samples stored in a series cache.
//!
//! Any type implementing [`Sample`] can be cached. The crate ships the three
//! shapes chart series draw from: OHLCV candles, single values and
//! multi-value blocks (e.g. indicator bands).

use serde::{Deserialize, Serialize};

use crate::moment::Moment;

/// An item positioned on a moment axis.
pub trait Sample: Clone + Send + Sync + 'static {
    /// Axis the sample lives on.
    type Moment: Moment;

    /// Position of this sample.
    fn moment(&self) -> Self::Moment;
}

/// Open/high/low/close/volume bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle<M> {
    pub moment: M,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl<M: Moment> Candle<M> {
    /// Create a candle, deriving high/low from open and close.
    pub fn flat(moment: M, open: f64, close: f64, volume: f64) -> Self {
        Self {
            moment,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume,
        }
    }

    /// Midpoint of the candle body.
    pub fn mid(&self) -> f64 {
        (self.open + self.close) / 2.0
    }
}

impl<M: Moment> Sample for Candle<M> {
    type Moment = M;

    fn moment(&self) -> M {
        self.moment
    }
}

/// A single scalar observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Value<M> {
    pub moment: M,
    pub value: f64,
}

impl<M: Moment> Value<M> {
    pub fn new(moment: M, value: f64) -> Self {
        Self { moment, value }
    }
}

impl<M: Moment> Sample for Value<M> {
    type Moment = M;

    fn moment(&self) -> M {
        self.moment
    }
}

/// Several values sharing one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block<M> {
    pub moment: M,
    pub values: Vec<f64>,
}

impl<M: Moment> Block<M> {
    pub fn new(moment: M, values: Vec<f64>) -> Self {
        Self { moment, values }
    }
}

impl<M: Moment> Sample for Block<M> {
    type Moment = M;

    fn moment(&self) -> M {
        self.moment
    }
}
