use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;
use crate::models::bar::Bar;
use crate::models::config::Timeframe;
use crate::models::settings::parse_zone;

use super::{select_window, MarketDataSource};

/// Directory of terminal "export bars" files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSourceConfig {
    /// Holds `<SYMBOL>_<M1|H1|D1>.csv` files.
    pub dir: PathBuf,
    /// IANA zone of the broker server that wrote the timestamps.
    pub server_zone: Option<String>,
    /// Fixed server offset, used when `server_zone` is unset.
    pub server_offset_minutes: i32,
}

/// Reads bars from CSV exports. Files are re-read on every query so an
/// exporter that appends to them is picked up on the next refresh.
pub struct CsvSource {
    config: CsvSourceConfig,
    open: bool,
}

/// Column layout of an export, header brackets stripped.
#[derive(Debug, Deserialize)]
struct ExportRow {
    #[serde(rename = "DATE")]
    date: String,
    #[serde(rename = "TIME", default)]
    time: Option<String>,
    #[serde(rename = "OPEN")]
    open: f64,
    #[serde(rename = "HIGH")]
    high: f64,
    #[serde(rename = "LOW")]
    low: f64,
    #[serde(rename = "CLOSE")]
    close: f64,
    #[serde(rename = "TICKVOL", default)]
    tick_volume: u64,
    #[serde(rename = "VOL", default)]
    real_volume: u64,
    #[serde(rename = "SPREAD", default)]
    spread: u64,
}

impl CsvSource {
    pub fn new(config: CsvSourceConfig) -> Self {
        Self {
            config,
            open: false,
        }
    }

    pub fn file_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.config.dir.join(format!(
            "{}_{}.csv",
            symbol.to_uppercase(),
            timeframe.as_str().to_uppercase()
        ))
    }
}

impl MarketDataSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn open(&mut self) -> Result<(), AppError> {
        if !self.config.dir.is_dir() {
            return Err(AppError::ConnectionFailed(format!(
                "export directory not found: {}",
                self.config.dir.display()
            )));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn copy_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        reference: NaiveDateTime,
        count: usize,
    ) -> Result<Vec<Bar>, AppError> {
        if !self.open {
            return Err(AppError::ConnectionFailed("csv source is closed".into()));
        }
        let path = self.file_path(symbol, timeframe);
        if !path.exists() {
            debug!("No export for {} {} at {}", symbol, timeframe, path.display());
            return Ok(vec![]);
        }
        let bars = read_export(&path)?;
        Ok(select_window(&bars, reference, count))
    }

    fn server_utc_offset(&self, at: DateTime<Utc>) -> Result<FixedOffset, AppError> {
        match &self.config.server_zone {
            Some(zone) => {
                let tz = parse_zone(zone)?;
                Ok(tz.offset_from_utc_datetime(&at.naive_utc()).fix())
            }
            None => FixedOffset::east_opt(self.config.server_offset_minutes * 60).ok_or_else(|| {
                AppError::InvalidConfig(format!(
                    "server_offset_minutes out of range: {}",
                    self.config.server_offset_minutes
                ))
            }),
        }
    }
}

/// Parse one export file into bars, in file order.
///
/// Tab and comma delimited files are both accepted, with or without the
/// `<...>` header brackets.
pub fn read_export(path: &Path) -> Result<Vec<Bar>, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::FileRead(format!("{}: {}", path.display(), e)))?;
    parse_export(&content).map_err(|e| match e {
        AppError::MalformedBar(msg) => AppError::MalformedBar(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

fn parse_export(content: &str) -> Result<Vec<Bar>, AppError> {
    let first_line = content.lines().next().unwrap_or_default();
    let delimiter = if first_line.contains('\t') { b'\t' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: csv::StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.trim_matches(|c| c == '<' || c == '>').to_uppercase())
        .collect();
    reader.set_headers(headers);

    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<ExportRow>().enumerate() {
        // +2: header line and 1-based numbering
        let line = i + 2;
        let row = row.map_err(|e| AppError::MalformedBar(format!("line {}: {}", line, e)))?;
        let time = parse_timestamp(&row.date, row.time.as_deref())
            .ok_or_else(|| AppError::MalformedBar(format!("line {}: bad timestamp '{}'", line, row.date)))?;
        bars.push(Bar {
            time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            tick_volume: row.tick_volume,
            spread: row.spread,
            real_volume: row.real_volume,
        });
    }
    Ok(bars)
}

fn parse_timestamp(date: &str, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = ["%Y.%m.%d", "%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(date, f).ok())?;
    let time = match time.filter(|t| !t.is_empty()) {
        None => NaiveTime::MIN,
        Some(t) => NaiveTime::parse_from_str(t, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
            .ok()?,
    };
    Some(date.and_time(time))
}
