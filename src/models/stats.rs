use chrono::NaiveDateTime;
use serde::Serialize;

use super::bar::Bar;
use super::config::Timeframe;
use super::settings::IndicatorSettings;

/// Derived statistics for one calendar day, built from a single daily bar.
///
/// Gap and width fields are pip distances (price difference x 10^5,
/// truncated toward zero).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAggregate {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: u64,
    pub spread: u64,
    pub real_volume: u64,
    pub width_candlestick: i64,
    pub gap_open_high: i64,
    pub gap_open_low: i64,
    pub gap_open_close: i64,
}

/// One intraday bar with its derived columns. `None` marks "no value yet".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    #[serde(flatten)]
    pub bar: Bar,
    pub percentage_change: Option<f64>,
    pub pip_difference: i64,
    pub sma: Option<f64>,
    pub rsi: Option<f64>,
    pub bulls_power: Option<f64>,
    pub bears_power: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub settings: IndicatorSettings,
    pub rows: Vec<IndicatorRow>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One day of the multi-day trend series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow {
    #[serde(flatten)]
    pub aggregate: DailyAggregate,
    pub percentage_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    pub symbol: String,
    pub rows: Vec<DailyRow>,
}

/// An equal-width histogram bucket, `[lower, upper)` except the last which is closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipSizeCount {
    pub pips: i64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub bars: usize,
    pub mean_tick_volume: f64,
    pub std_tick_volume: Option<f64>,
    pub mean_abs_change: Option<f64>,
    pub std_abs_change: Option<f64>,
    /// Bars whose absolute percentage change is inside the quiet zone.
    pub quiet_bars: usize,
    /// Bars with tick volume under the baseline.
    pub below_baseline_bars: usize,
}

/// Distribution views over today's intraday bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntradayDistribution {
    pub close_histogram: Vec<HistogramBin>,
    pub current_close: f64,
    pub pip_sizes: Vec<PipSizeCount>,
    pub ongoing_pip_size: i64,
    pub activity: ActivitySummary,
}
