use std::collections::BTreeMap;

use statrs::statistics::{Data, Distribution};

use crate::errors::AppError;
use crate::models::settings::ActivitySettings;
use crate::models::stats::{
    ActivitySummary, HistogramBin, IndicatorRow, IndicatorSeries, IntradayDistribution, PipSizeCount,
};

/// Equal-width histogram over `[min, max]` of the finite values.
///
/// The maximum falls in the last bin. All-equal input yields a single bin.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return vec![];
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: finite.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut result: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();
    for v in finite {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        result[idx].count += 1;
    }
    result
}

/// Count of bars per pip size, ascending by size, and the size of the last bar.
pub fn pip_size_counts(rows: &[IndicatorRow]) -> (Vec<PipSizeCount>, Option<i64>) {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for row in rows {
        *counts.entry(row.pip_difference).or_insert(0) += 1;
    }
    let counts = counts
        .into_iter()
        .map(|(pips, count)| PipSizeCount { pips, count })
        .collect();
    (counts, rows.last().map(|r| r.pip_difference))
}

pub fn activity_summary(rows: &[IndicatorRow], settings: &ActivitySettings) -> ActivitySummary {
    let ticks: Vec<f64> = rows.iter().map(|r| r.bar.tick_volume as f64).collect();
    let abs_changes: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.percentage_change)
        .map(f64::abs)
        .collect();

    let (mean_tick_volume, std_tick_volume) = mean_and_std(ticks);
    let (mean_abs_change, std_abs_change) = mean_and_std(abs_changes.clone());

    ActivitySummary {
        bars: rows.len(),
        mean_tick_volume: mean_tick_volume.unwrap_or(0.0),
        std_tick_volume,
        mean_abs_change,
        std_abs_change,
        quiet_bars: abs_changes.iter().filter(|c| **c < settings.quiet_zone_pct).count(),
        below_baseline_bars: rows
            .iter()
            .filter(|r| r.bar.tick_volume < settings.tick_volume_baseline)
            .count(),
    }
}

/// Sample mean and standard deviation; `None` where undefined.
fn mean_and_std(values: Vec<f64>) -> (Option<f64>, Option<f64>) {
    if values.is_empty() {
        return (None, None);
    }
    let data = Data::new(values);
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    (finite(data.mean()), finite(data.std_dev()))
}

/// Histogram, pip sizes and activity for one intraday series.
pub fn build_distribution(
    series: &IndicatorSeries,
    settings: &ActivitySettings,
) -> Result<IntradayDistribution, AppError> {
    let last = series
        .rows
        .last()
        .ok_or_else(|| AppError::DataUnavailable(format!("no intraday rows for {}", series.symbol)))?;

    let closes: Vec<f64> = series.rows.iter().map(|r| r.bar.close).collect();
    let (pip_sizes, ongoing) = pip_size_counts(&series.rows);

    Ok(IntradayDistribution {
        close_histogram: histogram(&closes, settings.histogram_bins),
        current_close: last.bar.close,
        pip_sizes,
        ongoing_pip_size: ongoing.unwrap_or(last.pip_difference),
        activity: activity_summary(&series.rows, settings),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::indicators::build_indicator_series;
    use crate::models::bar::test_support::*;
    use crate::models::bar::BarSeries;
    use crate::models::config::Timeframe;
    use crate::models::settings::IndicatorSettings;

    fn indicator_series(closes: &[f64]) -> IndicatorSeries {
        let s = BarSeries::new("EURUSD", Timeframe::M1, minute_bars(at(2024, 1, 15, 9, 0), closes));
        build_indicator_series(&s, &IndicatorSettings::default()).unwrap()
    }

    #[test]
    fn test_histogram_edges() {
        let bins = histogram(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(bins.len(), 3);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 4);
        assert_eq!(bins[2].upper, 4.0);
        // max lands in the last bin
        assert_eq!(bins[2].count, 2);

        let flat = histogram(&[1.1, 1.1, 1.1], 10);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].count, 3);

        assert!(histogram(&[], 5).is_empty());
        assert!(histogram(&[f64::NAN], 5).is_empty());
    }

    #[test]
    fn test_pip_size_counts_and_ongoing() {
        let series = indicator_series(&[1.1000, 1.1000, 1.1003, 1.1003]);
        let (counts, ongoing) = pip_size_counts(&series.rows);
        // ranges: 20, 20, 50, 20 pips
        assert_eq!(counts, vec![PipSizeCount { pips: 20, count: 3 }, PipSizeCount { pips: 50, count: 1 }]);
        assert_eq!(ongoing, Some(20));
    }

    #[test]
    fn test_activity_summary() {
        let mut series = indicator_series(&[100.0, 100.01, 100.01, 101.0]);
        series.rows[3].bar.tick_volume = 50;
        let summary = activity_summary(&series.rows, &ActivitySettings::default());

        assert_eq!(summary.bars, 4);
        assert!((summary.mean_tick_volume - 20.0).abs() < 1e-12);
        assert!(summary.std_tick_volume.unwrap() > 0.0);
        // changes: 0.01%, 0%, ~0.99%
        assert_eq!(summary.quiet_bars, 2);
        assert_eq!(summary.below_baseline_bars, 3);
    }

    #[test]
    fn test_single_row_has_no_spread_stats() {
        let series = indicator_series(&[1.1]);
        let summary = activity_summary(&series.rows, &ActivitySettings::default());
        assert_eq!(summary.std_tick_volume, None);
        assert_eq!(summary.mean_abs_change, None);
    }

    #[test]
    fn test_build_distribution() {
        let series = indicator_series(&[1.1000, 1.1002, 1.1001, 1.1005]);
        let dist = build_distribution(&series, &ActivitySettings::default()).unwrap();
        assert_eq!(dist.current_close, 1.1005);
        assert_eq!(dist.close_histogram.iter().map(|b| b.count).sum::<usize>(), 4);
        assert_eq!(dist.pip_sizes.iter().map(|p| p.count).sum::<usize>(), 4);

        let empty = IndicatorSeries {
            rows: vec![],
            ..series
        };
        assert!(matches!(
            build_distribution(&empty, &ActivitySettings::default()),
            Err(AppError::DataUnavailable(_))
        ));
    }
}
