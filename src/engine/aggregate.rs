use crate::errors::AppError;
use crate::models::bar::{Bar, BarSeries};
use crate::models::stats::DailyAggregate;

/// Prices are compared in 1e-8 units so decimal quotes subtract exactly.
const PRICE_SCALE: f64 = 1e8;
/// 1e-8 units per pip (1e-5).
const UNITS_PER_PIP: i64 = 1_000;

/// `trunc((a - b) * 1e5)`, truncated toward zero.
pub fn pip_distance(a: f64, b: f64) -> i64 {
    let a = (a * PRICE_SCALE).round() as i64;
    let b = (b * PRICE_SCALE).round() as i64;
    (a - b) / UNITS_PER_PIP
}

impl DailyAggregate {
    pub fn from_bar(bar: &Bar) -> Self {
        Self {
            time: bar.time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            tick_volume: bar.tick_volume,
            spread: bar.spread,
            real_volume: bar.real_volume,
            width_candlestick: pip_distance(bar.high, bar.low),
            gap_open_high: pip_distance(bar.high, bar.open),
            gap_open_low: pip_distance(bar.open, bar.low),
            gap_open_close: pip_distance(bar.open, bar.close),
        }
    }
}

/// Gap statistics for a series holding exactly one daily bar.
pub fn derive_daily_aggregate(series: &BarSeries) -> Result<DailyAggregate, AppError> {
    let bar = match series.bars.as_slice() {
        [bar] => bar,
        bars => {
            return Err(AppError::MalformedBar(format!(
                "{}: expected exactly one daily bar, got {}",
                series.symbol,
                bars.len()
            )))
        }
    };
    if !bar.has_finite_prices() {
        return Err(AppError::MalformedBar(format!(
            "{}: non-finite price in daily bar at {}",
            series.symbol, bar.time
        )));
    }
    Ok(DailyAggregate::from_bar(bar))
}
