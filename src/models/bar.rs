use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;

use super::config::Timeframe;

/// Slack allowed on the `low <= open/close <= high` checks (half a point).
pub const RANGE_TOLERANCE: f64 = 0.5e-5;

/// A single OHLC bar as reported by the data source.
///
/// `time` is the bar's open time on the source's server clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: u64,
    pub spread: u64,
    pub real_volume: u64,
}

impl Bar {
    pub fn has_finite_prices(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }

    /// Largest amount by which open/close escape the [low, high] range.
    fn range_excess(&self) -> f64 {
        let above = (self.open.max(self.close) - self.high).max(0.0);
        let below = (self.low - self.open.min(self.close)).max(0.0);
        let inverted = (self.low - self.high).max(0.0);
        above.max(below).max(inverted)
    }
}

/// Ordered bars for one symbol and timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    /// Check the series against the bar invariants.
    ///
    /// Non-finite prices, open/close outside `[low, high]` by more than
    /// [`RANGE_TOLERANCE`], and timestamps that are not strictly increasing
    /// are all reported as [`AppError::MalformedBar`].
    pub fn validate(&self) -> Result<(), AppError> {
        for (i, bar) in self.bars.iter().enumerate() {
            if !bar.has_finite_prices() {
                return Err(AppError::MalformedBar(format!(
                    "{} {}: non-finite price at {}",
                    self.symbol, self.timeframe, bar.time
                )));
            }

            let excess = bar.range_excess();
            if excess > RANGE_TOLERANCE {
                return Err(AppError::MalformedBar(format!(
                    "{} {}: OHLC out of range at {} (o={} h={} l={} c={})",
                    self.symbol, self.timeframe, bar.time, bar.open, bar.high, bar.low, bar.close
                )));
            } else if excess > 0.0 {
                debug!(
                    "{} {}: OHLC range noise of {:e} at {}",
                    self.symbol, self.timeframe, excess, bar.time
                );
            }

            if i > 0 && bar.time <= self.bars[i - 1].time {
                return Err(AppError::MalformedBar(format!(
                    "{} {}: timestamps not strictly increasing at {}",
                    self.symbol, self.timeframe, bar.time
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::Bar;

    pub fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    pub fn bar(time: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            time,
            open,
            high,
            low,
            close,
            tick_volume: 10,
            spread: 2,
            real_volume: 0,
        }
    }

    /// Minute bars starting at `start`, one per close, with a fixed half-range.
    pub fn minute_bars(start: NaiveDateTime, closes: &[f64]) -> Vec<Bar> {
        let mut prev = closes.first().copied().unwrap_or(1.0);
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let open = prev;
                prev = c;
                bar(
                    start + chrono::Duration::minutes(i as i64),
                    open,
                    open.max(c) + 0.0001,
                    open.min(c) - 0.0001,
                    c,
                )
            })
            .collect()
    }
}
