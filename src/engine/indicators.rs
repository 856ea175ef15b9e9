use crate::errors::AppError;
use crate::models::bar::BarSeries;
use crate::models::settings::IndicatorSettings;
use crate::models::stats::{IndicatorRow, IndicatorSeries};

use super::aggregate::pip_distance;

/// Build the per-bar indicator table for an intraday series.
///
/// Pure: the same series and settings always give the same rows. A series
/// shorter than a window leaves that column `None` instead of failing.
pub fn build_indicator_series(
    series: &BarSeries,
    settings: &IndicatorSettings,
) -> Result<IndicatorSeries, AppError> {
    require_window("sma_period", settings.sma_period)?;
    require_window("rsi_period", settings.rsi_period)?;
    require_window("power_period", settings.power_period)?;

    let close = series.closes();
    let high = series.highs();
    let low = series.lows();

    let pct = percentage_change(&close);
    let sma_values = sma(&close, settings.sma_period);
    let rsi_values = rsi(&close, settings.rsi_period);
    let bulls = bulls_power(&high, &close, settings.power_period);
    let bears = bears_power(&low, &close, settings.power_period);

    let rows = series
        .bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorRow {
            bar: bar.clone(),
            percentage_change: pct[i],
            pip_difference: pip_difference(bar.high, bar.low),
            sma: defined(sma_values[i]),
            rsi: defined(rsi_values[i]),
            bulls_power: defined(bulls[i]),
            bears_power: defined(bears[i]),
        })
        .collect();

    Ok(IndicatorSeries {
        symbol: series.symbol.clone(),
        timeframe: series.timeframe,
        settings: *settings,
        rows,
    })
}

// ── Helpers ──

fn require_window(name: &str, window: usize) -> Result<(), AppError> {
    if window == 0 {
        return Err(AppError::InvalidIndicatorParams(format!("{} must be > 0", name)));
    }
    Ok(())
}

fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

// ── Percentage change ──

/// Close-to-close change in percent. `None` for the first bar and after a zero close.
pub fn percentage_change(close: &[f64]) -> Vec<Option<f64>> {
    let mut result = vec![None; close.len()];
    for i in 1..close.len() {
        let prev = close[i - 1];
        if prev != 0.0 {
            result[i] = defined((close[i] - prev) / prev * 100.0);
        }
    }
    result
}

/// High-low range of one bar in pips.
pub fn pip_difference(high: f64, low: f64) -> i64 {
    pip_distance(high, low)
}

// ── SMA ──

/// Simple Moving Average. First `period-1` values are NaN.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    let len = data.len();
    let mut result = vec![f64::NAN; len];
    if period == 0 || len < period {
        return result;
    }
    let mut sum: f64 = data[..period].iter().sum();
    result[period - 1] = sum / period as f64;
    for i in period..len {
        sum += data[i] - data[i - period];
        result[i] = sum / period as f64;
    }
    result
}

// ── EMA ──

/// Exponential Moving Average seeded with the SMA of the first `period`
/// values. First `period-1` values are NaN.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    let len = data.len();
    let mut result = vec![f64::NAN; len];
    if period == 0 || len < period {
        return result;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    result[period - 1] = data[..period].iter().sum::<f64>() / period as f64;
    for i in period..len {
        result[i] = result[i - 1] + alpha * (data[i] - result[i - 1]);
    }
    result
}

// ── RSI ──

/// Wilder's Relative Strength Index, in `[0, 100]`.
///
/// The first average is the plain mean of the first `period` changes, so the
/// first `period` values are NaN. A window without losses reads 100.
pub fn rsi(close: &[f64], period: usize) -> Vec<f64> {
    let len = close.len();
    let mut result = vec![f64::NAN; len];
    if period == 0 || len <= period {
        return result;
    }

    let changes: Vec<f64> = close.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| c.max(0.0);
    let loss = |c: f64| (-c).max(0.0);

    let n = period as f64;
    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / n;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / n;
    result[period] = rsi_value(avg_gain, avg_loss);

    for i in (period + 1)..len {
        let change = changes[i - 1];
        avg_gain = (avg_gain * (n - 1.0) + gain(change)) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss(change)) / n;
        result[i] = rsi_value(avg_gain, avg_loss);
    }
    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

// ── Elder power ──

/// Bulls power: `high - EMA(close, period)`.
pub fn bulls_power(high: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    ema(close, period)
        .iter()
        .zip(high)
        .map(|(e, h)| h - e)
        .collect()
}

/// Bears power: `low - EMA(close, period)`.
pub fn bears_power(low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    ema(close, period)
        .iter()
        .zip(low)
        .map(|(e, l)| l - e)
        .collect()
}

// ══════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════
