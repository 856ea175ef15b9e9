use crate::errors::AppError;
use crate::models::bar::BarSeries;
use crate::models::stats::{DailyAggregate, DailyRow, DailySeries};

use super::indicators::percentage_change;

/// One row per daily bar: its gap statistics plus the change from the
/// previous day's close.
pub fn build_daily_series(series: &BarSeries) -> Result<DailySeries, AppError> {
    if series.is_empty() {
        return Err(AppError::DataUnavailable(format!("no daily bars for {}", series.symbol)));
    }
    series.validate()?;

    let pct = percentage_change(&series.closes());
    let rows = series
        .bars
        .iter()
        .zip(pct)
        .map(|(bar, percentage_change)| DailyRow {
            aggregate: DailyAggregate::from_bar(bar),
            percentage_change,
        })
        .collect();

    Ok(DailySeries {
        symbol: series.symbol.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bar::test_support::*;
    use crate::models::config::Timeframe;

    #[test]
    fn test_daily_rows() {
        let bars = vec![
            bar(at(2024, 1, 11, 0, 0), 1.09700, 1.09900, 1.09400, 1.09500),
            bar(at(2024, 1, 12, 0, 0), 1.09500, 1.09820, 1.09310, 1.09640),
        ];
        let out = build_daily_series(&BarSeries::new("EURUSD", Timeframe::D1, bars)).unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0].percentage_change, None);
        assert_eq!(out.rows[0].aggregate.width_candlestick, 500);
        assert_eq!(out.rows[1].aggregate.gap_open_close, -140);
        let pct = out.rows[1].percentage_change.unwrap();
        assert!((pct - (1.09640 - 1.09500) / 1.09500 * 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_is_data_unavailable() {
        let err = build_daily_series(&BarSeries::new("EURUSD", Timeframe::D1, vec![])).unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    #[test]
    fn test_duplicate_days_rejected() {
        let day = at(2024, 1, 12, 0, 0);
        let bars = vec![bar(day, 1.1, 1.2, 1.0, 1.1), bar(day, 1.1, 1.2, 1.0, 1.1)];
        let err = build_daily_series(&BarSeries::new("EURUSD", Timeframe::D1, bars)).unwrap_err();
        assert!(matches!(err, AppError::MalformedBar(_)));
    }
}
