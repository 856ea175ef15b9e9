use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::data::{MarketDataSource, Session};
use crate::errors::AppError;
use crate::models::bar::BarSeries;
use crate::models::config::Timeframe;

use super::clock::{minutes_since_midnight, ServerClock};

/// Fetch `count` bars ending at or before `reference` and validate them.
pub fn fetch_bars<S: MarketDataSource + ?Sized>(
    session: &mut Session<'_, S>,
    symbol: &str,
    timeframe: Timeframe,
    reference: NaiveDateTime,
    count: usize,
) -> Result<BarSeries, AppError> {
    let bars = session.get_bars(symbol, timeframe, reference, count)?;
    if bars.is_empty() {
        return Err(AppError::DataUnavailable(format!(
            "no {} bars for {} at or before {}",
            timeframe, symbol, reference
        )));
    }
    let series = BarSeries::new(symbol, timeframe, bars);
    series.validate()?;
    debug!("Fetched {} {} bars for {}", series.len(), timeframe, symbol);
    Ok(series)
}

/// Minute bars ending at or before `reference`.
pub fn fetch_intraday<S: MarketDataSource + ?Sized>(
    session: &mut Session<'_, S>,
    symbol: &str,
    reference: NaiveDateTime,
    count: usize,
) -> Result<BarSeries, AppError> {
    fetch_bars(session, symbol, Timeframe::M1, reference, count)
}

/// Daily bars ending at or before `reference`. With `count == 1` this is
/// the current (or latest closed) day.
pub fn fetch_daily<S: MarketDataSource + ?Sized>(
    session: &mut Session<'_, S>,
    symbol: &str,
    reference: NaiveDateTime,
    count: usize,
) -> Result<BarSeries, AppError> {
    fetch_bars(session, symbol, Timeframe::D1, reference, count)
}

/// Every minute bar of the current server day, from `session_start`
/// through the bar forming at `server_now`.
///
/// `Ok(None)` at server midnight, when the day has no bars yet. Bars left
/// over from an earlier session (a weekend or a lagging export)
/// are not today's: if nothing remains after the cut, the day is
/// `DataUnavailable`.
pub fn fetch_today<S: MarketDataSource + ?Sized>(
    session: &mut Session<'_, S>,
    symbol: &str,
    server_now: NaiveDateTime,
) -> Result<Option<BarSeries>, AppError> {
    let minutes = minutes_since_midnight(server_now);
    if minutes == 0 {
        info!("{}: server day just started, no intraday bars yet", symbol);
        return Ok(None);
    }

    let start = ServerClock::session_start(server_now);
    // elapsed minutes plus the bar opened at server_now
    let mut series = fetch_intraday(session, symbol, server_now, minutes as usize + 1)?;
    series.bars.retain(|b| b.time >= start);
    if series.is_empty() {
        return Err(AppError::DataUnavailable(format!(
            "no m1 bars for {} since session start {}",
            symbol, start
        )));
    }
    Ok(Some(series))
}
