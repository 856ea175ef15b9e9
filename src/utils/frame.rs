//! Column-oriented views of the derived series for tabular consumers.

use polars::prelude::*;

use crate::errors::AppError;
use crate::models::stats::{DailySeries, IndicatorSeries};

/// Intraday indicator table. Undefined indicator values are nulls.
pub fn indicator_frame(series: &IndicatorSeries) -> Result<DataFrame, AppError> {
    let rows = &series.rows;
    let df = df!(
        "time" => rows.iter().map(|r| r.bar.time).collect::<Vec<_>>(),
        "open" => rows.iter().map(|r| r.bar.open).collect::<Vec<_>>(),
        "high" => rows.iter().map(|r| r.bar.high).collect::<Vec<_>>(),
        "low" => rows.iter().map(|r| r.bar.low).collect::<Vec<_>>(),
        "close" => rows.iter().map(|r| r.bar.close).collect::<Vec<_>>(),
        "tick_volume" => rows.iter().map(|r| r.bar.tick_volume).collect::<Vec<_>>(),
        "spread" => rows.iter().map(|r| r.bar.spread).collect::<Vec<_>>(),
        "real_volume" => rows.iter().map(|r| r.bar.real_volume).collect::<Vec<_>>(),
        "percentage_change" => rows.iter().map(|r| r.percentage_change).collect::<Vec<_>>(),
        "pip_difference" => rows.iter().map(|r| r.pip_difference).collect::<Vec<_>>(),
        "sma" => rows.iter().map(|r| r.sma).collect::<Vec<_>>(),
        "rsi" => rows.iter().map(|r| r.rsi).collect::<Vec<_>>(),
        "bulls_power" => rows.iter().map(|r| r.bulls_power).collect::<Vec<_>>(),
        "bears_power" => rows.iter().map(|r| r.bears_power).collect::<Vec<_>>()
    )?;
    Ok(df)
}

/// Multi-day table, one row per daily bar.
pub fn daily_frame(series: &DailySeries) -> Result<DataFrame, AppError> {
    let days: Vec<_> = series.rows.iter().map(|r| &r.aggregate).collect();
    let df = df!(
        "time" => days.iter().map(|d| d.time).collect::<Vec<_>>(),
        "open" => days.iter().map(|d| d.open).collect::<Vec<_>>(),
        "high" => days.iter().map(|d| d.high).collect::<Vec<_>>(),
        "low" => days.iter().map(|d| d.low).collect::<Vec<_>>(),
        "close" => days.iter().map(|d| d.close).collect::<Vec<_>>(),
        "tick_volume" => days.iter().map(|d| d.tick_volume).collect::<Vec<_>>(),
        "spread" => days.iter().map(|d| d.spread).collect::<Vec<_>>(),
        "real_volume" => days.iter().map(|d| d.real_volume).collect::<Vec<_>>(),
        "width_candlestick" => days.iter().map(|d| d.width_candlestick).collect::<Vec<_>>(),
        "gap_open_high" => days.iter().map(|d| d.gap_open_high).collect::<Vec<_>>(),
        "gap_open_low" => days.iter().map(|d| d.gap_open_low).collect::<Vec<_>>(),
        "gap_open_close" => days.iter().map(|d| d.gap_open_close).collect::<Vec<_>>(),
        "percentage_change" => series.rows.iter().map(|r| r.percentage_change).collect::<Vec<_>>()
    )?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::daily::build_daily_series;
    use crate::engine::indicators::build_indicator_series;
    use crate::models::bar::test_support::*;
    use crate::models::bar::BarSeries;
    use crate::models::config::Timeframe;
    use crate::models::settings::IndicatorSettings;

    #[test]
    fn test_indicator_frame_nulls_for_warm_up() {
        let closes: Vec<f64> = (0..20).map(|i| 1.1 + i as f64 * 0.0001).collect();
        let series = BarSeries::new("EURUSD", Timeframe::M1, minute_bars(at(2024, 1, 15, 9, 0), &closes));
        let indicators = build_indicator_series(&series, &IndicatorSettings::default()).unwrap();

        let df = indicator_frame(&indicators).unwrap();
        assert_eq!(df.height(), 20);
        assert_eq!(df.width(), 14);
        assert_eq!(df.column("percentage_change").unwrap().null_count(), 1);
        assert_eq!(df.column("sma").unwrap().null_count(), 4);
        assert_eq!(df.column("rsi").unwrap().null_count(), 14);
        assert_eq!(df.column("close").unwrap().null_count(), 0);
    }

    #[test]
    fn test_daily_frame_columns() {
        let bars = vec![
            bar(at(2024, 1, 11, 0, 0), 1.09700, 1.09900, 1.09400, 1.09500),
            bar(at(2024, 1, 12, 0, 0), 1.09500, 1.09820, 1.09310, 1.09640),
        ];
        let daily = build_daily_series(&BarSeries::new("EURUSD", Timeframe::D1, bars)).unwrap();
        let df = daily_frame(&daily).unwrap();

        assert_eq!(df.height(), 2);
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert!(names.contains(&"width_candlestick"));
        assert!(names.contains(&"gap_open_close"));
        let widths: Vec<Option<i64>> = df.column("width_candlestick").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(widths, vec![Some(500), Some(510)]);
    }
}
