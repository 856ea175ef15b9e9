//! Candle downloads from the public Dukascopy datafeed.
//!
//! Each `.bi5` file is raw LZMA holding 24-byte big-endian records:
//! `u32` seconds since the file's period start, then open, close, low and
//! high as `u32` in points, then volume as `f32`. Minute candles come one
//! file per day, hourly candles one file per month, daily candles one file
//! per year. Months in the URL are zero-based.

use std::io::Cursor;
use std::time::Duration;

use byteorder::{BigEndian, ReadBytesExt};
use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, Offset, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::bar::Bar;
use crate::models::config::{InstrumentConfig, Timeframe};

use super::{select_window, MarketDataSource};

const RECORD_SIZE: usize = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DukascopyConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Day files walked back when collecting minute bars.
    pub max_lookback_days: u32,
    /// Issue a request against `base_url` when the session opens.
    pub probe_on_open: bool,
}

impl Default for DukascopyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://datafeed.dukascopy.com/datafeed".to_string(),
            timeout_secs: 30,
            max_lookback_days: 10,
            probe_on_open: true,
        }
    }
}

/// Bid candles from Dukascopy. The feed's clock is UTC.
pub struct DukascopySource {
    config: DukascopyConfig,
    client: Option<Client>,
}

impl DukascopySource {
    pub fn new(config: DukascopyConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    /// Fetch and decompress one file. `None` when the feed has no file for
    /// the period (weekends, holidays, the future).
    fn download(&self, client: &Client, url: &str) -> Result<Option<Vec<u8>>, AppError> {
        let response = client.get(url).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No candle file at {}", url);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Download(format!("{} returned {}", url, response.status())));
        }
        let compressed = response.bytes()?;
        if compressed.is_empty() {
            return Ok(None);
        }
        let mut raw = Vec::with_capacity(compressed.len() * 4);
        lzma_rs::lzma_decompress(&mut &compressed[..], &mut raw)
            .map_err(|e| AppError::Download(format!("LZMA decompression failed for {}: {:?}", url, e)))?;
        Ok(Some(raw))
    }

    /// Periods to walk back before giving up on filling `count` bars.
    fn max_periods(&self, timeframe: Timeframe, count: usize) -> usize {
        match timeframe {
            Timeframe::M1 => self.config.max_lookback_days.max(1) as usize,
            Timeframe::H1 => count / (24 * 20) + 2,
            Timeframe::D1 => count / 250 + 2,
        }
    }
}

impl MarketDataSource for DukascopySource {
    fn name(&self) -> &str {
        "dukascopy"
    }

    fn open(&mut self) -> Result<(), AppError> {
        if self.client.is_some() {
            return Ok(());
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| AppError::ConnectionFailed(format!("HTTP client: {}", e)))?;
        if self.config.probe_on_open {
            client
                .head(&self.config.base_url)
                .send()
                .map_err(|e| AppError::ConnectionFailed(format!("{}: {}", self.config.base_url, e)))?;
        }
        info!("Dukascopy feed ready at {}", self.config.base_url);
        self.client = Some(client);
        Ok(())
    }

    fn close(&mut self) {
        self.client = None;
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    fn copy_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        reference: NaiveDateTime,
        count: usize,
    ) -> Result<Vec<Bar>, AppError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::ConnectionFailed("dukascopy session is not open".into()))?;
        let instrument = InstrumentConfig::for_symbol(symbol);

        let mut collected: Vec<Bar> = Vec::new();
        let mut period = period_start(timeframe, reference.date());
        for _ in 0..self.max_periods(timeframe, count) {
            let url = candle_url(&self.config.base_url, symbol, timeframe, period);
            if let Some(raw) = self.download(client, &url)? {
                let mut bars = decode_candles(&raw, period.and_time(chrono::NaiveTime::MIN), &instrument)?;
                bars.retain(|b| b.time <= reference);
                bars.append(&mut collected);
                collected = bars;
            }
            if collected.len() >= count {
                break;
            }
            period = match previous_period(timeframe, period) {
                Some(p) => p,
                None => break,
            };
        }
        Ok(select_window(&collected, reference, count))
    }

    fn server_utc_offset(&self, _at: DateTime<Utc>) -> Result<FixedOffset, AppError> {
        Ok(Utc.fix())
    }
}

/// First day of the file period that contains `date`.
fn period_start(timeframe: Timeframe, date: NaiveDate) -> NaiveDate {
    match timeframe {
        Timeframe::M1 => date,
        Timeframe::H1 => date.with_day(1).unwrap_or(date),
        Timeframe::D1 => date.with_ordinal(1).unwrap_or(date),
    }
}

fn previous_period(timeframe: Timeframe, start: NaiveDate) -> Option<NaiveDate> {
    match timeframe {
        Timeframe::M1 => start.pred_opt(),
        Timeframe::H1 => start.checked_sub_months(Months::new(1)),
        Timeframe::D1 => start.checked_sub_months(Months::new(12)),
    }
}

/// URL of the bid candle file for the period starting at `start`.
pub fn candle_url(base: &str, symbol: &str, timeframe: Timeframe, start: NaiveDate) -> String {
    let base = base.trim_end_matches('/');
    let symbol = symbol.to_uppercase();
    let month0 = start.month0();
    match timeframe {
        Timeframe::M1 => format!(
            "{}/{}/{}/{:02}/{:02}/BID_candles_min_1.bi5",
            base,
            symbol,
            start.year(),
            month0,
            start.day()
        ),
        Timeframe::H1 => format!(
            "{}/{}/{}/{:02}/BID_candles_hour_1.bi5",
            base,
            symbol,
            start.year(),
            month0
        ),
        Timeframe::D1 => format!("{}/{}/{}/BID_candles_day_1.bi5", base, symbol, start.year()),
    }
}

/// Decode decompressed candle records.
///
/// The feed carries no tick count or spread, so `tick_volume` and `spread`
/// are 0 and the fractional volume (millions of units) is stored in
/// `real_volume` as whole units.
pub fn decode_candles(
    raw: &[u8],
    period_start: NaiveDateTime,
    instrument: &InstrumentConfig,
) -> Result<Vec<Bar>, AppError> {
    if raw.len() % RECORD_SIZE != 0 {
        return Err(AppError::MalformedBar(format!(
            "candle payload of {} bytes is not a multiple of {}",
            raw.len(),
            RECORD_SIZE
        )));
    }
    let scale = 10f64.powi(instrument.digits as i32);
    let mut rdr = Cursor::new(raw);
    let mut bars = Vec::with_capacity(raw.len() / RECORD_SIZE);

    for _ in 0..raw.len() / RECORD_SIZE {
        let offset = rdr.read_u32::<BigEndian>()?;
        let open = rdr.read_u32::<BigEndian>()?;
        let close = rdr.read_u32::<BigEndian>()?;
        let low = rdr.read_u32::<BigEndian>()?;
        let high = rdr.read_u32::<BigEndian>()?;
        let volume = rdr.read_f32::<BigEndian>()?;

        bars.push(Bar {
            time: period_start + chrono::Duration::seconds(offset as i64),
            open: open as f64 / scale,
            high: high as f64 / scale,
            low: low as f64 / scale,
            close: close as f64 / scale,
            tick_volume: 0,
            spread: 0,
            real_volume: (volume as f64 * 1_000_000.0).round().max(0.0) as u64,
        });
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use byteorder::WriteBytesExt;

    use super::*;
    use crate::models::bar::test_support::at;

    fn record(buf: &mut Vec<u8>, offset: u32, o: u32, c: u32, l: u32, h: u32, v: f32) {
        for x in [offset, o, c, l, h] {
            buf.write_u32::<BigEndian>(x).unwrap();
        }
        buf.write_f32::<BigEndian>(v).unwrap();
    }

    #[test]
    fn test_candle_urls_use_zero_based_months() {
        let base = "https://datafeed.dukascopy.com/datafeed/";
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            candle_url(base, "eurusd", Timeframe::M1, day),
            "https://datafeed.dukascopy.com/datafeed/EURUSD/2024/00/05/BID_candles_min_1.bi5"
        );
        let dec = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(
            candle_url(base, "GBPUSD", Timeframe::H1, dec),
            "https://datafeed.dukascopy.com/datafeed/GBPUSD/2023/11/BID_candles_hour_1.bi5"
        );
        assert_eq!(
            candle_url(base, "USDJPY", Timeframe::D1, dec),
            "https://datafeed.dukascopy.com/datafeed/USDJPY/2023/BID_candles_day_1.bi5"
        );
    }

    #[test]
    fn test_decode_scales_by_instrument_digits() {
        let mut raw = Vec::new();
        record(&mut raw, 0, 109_500, 109_510, 109_490, 109_520, 1.5);
        record(&mut raw, 60, 109_510, 109_525, 109_505, 109_530, 0.25);
        let start = at(2024, 1, 15, 0, 0);

        let bars = decode_candles(&raw, start, &InstrumentConfig::for_symbol("EURUSD")).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].time, at(2024, 1, 15, 0, 1));
        assert!((bars[0].open - 1.095).abs() < 1e-12);
        assert!((bars[0].high - 1.0952).abs() < 1e-12);
        assert!((bars[0].low - 1.0949).abs() < 1e-12);
        assert!((bars[0].close - 1.0951).abs() < 1e-12);
        assert_eq!(bars[0].real_volume, 1_500_000);

        let jpy = decode_candles(&raw, start, &InstrumentConfig::for_symbol("USDJPY")).unwrap();
        assert!((jpy[0].open - 109.5).abs() < 1e-9);
    }

    #[test]
    fn test_truncated_payload_is_malformed() {
        let mut raw = Vec::new();
        record(&mut raw, 0, 1, 1, 1, 1, 0.0);
        raw.pop();
        let err = decode_candles(&raw, at(2024, 1, 15, 0, 0), &InstrumentConfig::for_symbol("EURUSD"))
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedBar(_)));
    }

    #[test]
    fn test_period_walk() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(period_start(Timeframe::H1, d), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(period_start(Timeframe::D1, d), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(
            previous_period(Timeframe::H1, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            NaiveDate::from_ymd_opt(2023, 12, 1)
        );
        assert_eq!(
            previous_period(Timeframe::M1, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn test_closed_source_refuses_queries() {
        let source = DukascopySource::new(DukascopyConfig::default());
        let err = source
            .copy_rates_from("EURUSD", Timeframe::M1, at(2024, 1, 15, 9, 0), 10)
            .unwrap_err();
        assert!(matches!(err, AppError::ConnectionFailed(_)));
        assert_eq!(source.server_utc_offset(Utc::now()).unwrap().local_minus_utc(), 0);
    }
}
