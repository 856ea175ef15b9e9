use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::AppError;
use crate::models::config::InstrumentConfig;
use crate::models::snapshot::DashboardSnapshot;
use crate::models::stats::{DailySeries, IndicatorSeries};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map(|v| format!("{:.*}", precision, v)).unwrap_or_default()
}

/// Write the intraday indicator table to a CSV file. Undefined values are empty cells.
pub fn write_indicator_csv(series: &IndicatorSeries, path: &Path) -> Result<(), AppError> {
    let instrument = InstrumentConfig::for_symbol(&series.symbol);
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| AppError::FileWrite(format!("Cannot create CSV: {}", e)))?;

    wtr.write_record([
        "time",
        "open",
        "high",
        "low",
        "close",
        "tick_volume",
        "spread",
        "real_volume",
        "percentage_change",
        "pip_difference",
        "sma",
        "rsi",
        "bulls_power",
        "bears_power",
    ])
    .map_err(|e| AppError::FileWrite(e.to_string()))?;

    for row in &series.rows {
        let b = &row.bar;
        wtr.write_record([
            &b.time.format(TIME_FORMAT).to_string(),
            &instrument.format_price(b.open),
            &instrument.format_price(b.high),
            &instrument.format_price(b.low),
            &instrument.format_price(b.close),
            &b.tick_volume.to_string(),
            &b.spread.to_string(),
            &b.real_volume.to_string(),
            &opt(row.percentage_change, 6),
            &row.pip_difference.to_string(),
            &opt(row.sma, instrument.digits as usize + 1),
            &opt(row.rsi, 2),
            &opt(row.bulls_power, instrument.digits as usize + 1),
            &opt(row.bears_power, instrument.digits as usize + 1),
        ])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write the multi-day series to a CSV file.
pub fn write_daily_csv(series: &DailySeries, path: &Path) -> Result<(), AppError> {
    let instrument = InstrumentConfig::for_symbol(&series.symbol);
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| AppError::FileWrite(format!("Cannot create CSV: {}", e)))?;

    wtr.write_record([
        "time",
        "open",
        "high",
        "low",
        "close",
        "tick_volume",
        "spread",
        "real_volume",
        "width_candlestick",
        "gap_open_high",
        "gap_open_low",
        "gap_open_close",
        "percentage_change",
    ])
    .map_err(|e| AppError::FileWrite(e.to_string()))?;

    for row in &series.rows {
        let d = &row.aggregate;
        wtr.write_record([
            &d.time.format("%Y-%m-%d").to_string(),
            &instrument.format_price(d.open),
            &instrument.format_price(d.high),
            &instrument.format_price(d.low),
            &instrument.format_price(d.close),
            &d.tick_volume.to_string(),
            &d.spread.to_string(),
            &d.real_volume.to_string(),
            &d.width_candlestick.to_string(),
            &d.gap_open_high.to_string(),
            &d.gap_open_low.to_string(),
            &d.gap_open_close.to_string(),
            &opt(row.percentage_change, 6),
        ])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write a snapshot as pretty-printed JSON.
pub fn write_snapshot_json(snapshot: &DashboardSnapshot, path: &Path) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::FileWrite(format!("Cannot create {}: {}", path.display(), e)))?;
    serde_json::to_writer_pretty(BufWriter::new(file), snapshot)?;
    Ok(())
}

/// Export every ready table of a snapshot into `dir`, plus the snapshot itself.
///
/// Files are named `<SYMBOL>_intraday.csv`, `<SYMBOL>_daily.csv` and
/// `<SYMBOL>_snapshot.json` and overwritten on each refresh.
pub fn export_snapshot(snapshot: &DashboardSnapshot, dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::FileWrite(format!("Cannot create {}: {}", dir.display(), e)))?;
    let mut written = Vec::new();

    if let Some(series) = snapshot.intraday.data() {
        let path = dir.join(format!("{}_intraday.csv", snapshot.symbol));
        write_indicator_csv(series, &path)?;
        written.push(path);
    }
    if let Some(series) = snapshot.history.data() {
        let path = dir.join(format!("{}_daily.csv", snapshot.symbol));
        write_daily_csv(series, &path)?;
        written.push(path);
    }
    let path = dir.join(format!("{}_snapshot.json", snapshot.symbol));
    write_snapshot_json(snapshot, &path)?;
    written.push(path);

    info!("Exported {} files for {} to {}", written.len(), snapshot.symbol, dir.display());
    Ok(written)
}
