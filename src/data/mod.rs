//! Market data sources and the session guard used to talk to them.
//!
//! A [`MarketDataSource`] serves bars the way a trading terminal does:
//! "give me `count` bars of this timeframe ending at or before this time".
//! Sources report empty results as `Ok(vec![])`; turning an empty answer
//! into [`AppError::DataUnavailable`] is the retrieval layer's job.

pub mod csv_source;
pub mod dukascopy;
pub mod memory;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::bar::Bar;
use crate::models::config::Timeframe;
use crate::models::settings::SourceConfig;

pub use csv_source::CsvSource;
pub use dukascopy::DukascopySource;
pub use memory::MemorySource;

/// A provider of OHLC bars with an explicit connection lifecycle.
pub trait MarketDataSource {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Establish the connection. Idempotent when already open.
    fn open(&mut self) -> Result<(), AppError>;

    /// Release the connection. Safe to call when already closed.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Up to `count` bars ending at or before `reference` (server clock),
    /// oldest first. An unknown symbol or an empty window is `Ok(vec![])`.
    fn copy_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        reference: NaiveDateTime,
        count: usize,
    ) -> Result<Vec<Bar>, AppError>;

    /// UTC offset of the server clock at the given instant.
    fn server_utc_offset(&self, at: DateTime<Utc>) -> Result<FixedOffset, AppError>;
}

impl<S: MarketDataSource + ?Sized> MarketDataSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&mut self) -> Result<(), AppError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn copy_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        reference: NaiveDateTime,
        count: usize,
    ) -> Result<Vec<Bar>, AppError> {
        (**self).copy_rates_from(symbol, timeframe, reference, count)
    }

    fn server_utc_offset(&self, at: DateTime<Utc>) -> Result<FixedOffset, AppError> {
        (**self).server_utc_offset(at)
    }
}

/// Scoped connection to a [`MarketDataSource`].
///
/// The source is closed when the session is dropped, including on early
/// returns through `?`.
pub struct Session<'a, S: MarketDataSource + ?Sized> {
    source: &'a mut S,
    closed: bool,
}

impl<'a, S: MarketDataSource + ?Sized> Session<'a, S> {
    /// Open the source, failing with [`AppError::ConnectionFailed`].
    pub fn open(source: &'a mut S) -> Result<Self, AppError> {
        if !source.is_open() {
            source.open().map_err(as_connection_failure)?;
            info!("Session opened: {}", source.name());
        }
        Ok(Self {
            source,
            closed: false,
        })
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Re-establish the connection if the source dropped it.
    pub fn ensure_open(&mut self) -> Result<(), AppError> {
        if !self.source.is_open() {
            warn!("Session to {} is not active, reopening", self.source.name());
            self.source.open().map_err(as_connection_failure)?;
            self.closed = false;
        }
        Ok(())
    }

    pub fn get_bars(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        reference: NaiveDateTime,
        count: usize,
    ) -> Result<Vec<Bar>, AppError> {
        self.ensure_open()?;
        debug!(
            "{}: requesting {} {} bars of {} ending {}",
            self.source.name(),
            count,
            timeframe,
            symbol,
            reference
        );
        self.source.copy_rates_from(symbol, timeframe, reference, count)
    }

    pub fn server_utc_offset(&mut self, at: DateTime<Utc>) -> Result<FixedOffset, AppError> {
        self.ensure_open()?;
        self.source.server_utc_offset(at)
    }

    /// Close explicitly. Dropping the session has the same effect.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.source.close();
            self.closed = true;
            info!("Session closed: {}", self.source.name());
        }
    }
}

impl<S: MarketDataSource + ?Sized> Drop for Session<'_, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Instantiate the configured source.
pub fn build_source(config: &SourceConfig) -> Box<dyn MarketDataSource + Send> {
    match config {
        SourceConfig::Csv(csv) => Box::new(CsvSource::new(csv.clone())),
        SourceConfig::Dukascopy(feed) => Box::new(DukascopySource::new(feed.clone())),
    }
}

fn as_connection_failure(err: AppError) -> AppError {
    match err {
        AppError::ConnectionFailed(_) => err,
        other => AppError::ConnectionFailed(other.to_string()),
    }
}

/// The last `count` bars with `time <= reference`. `bars` must be sorted.
pub fn select_window(bars: &[Bar], reference: NaiveDateTime, count: usize) -> Vec<Bar> {
    let end = bars.partition_point(|b| b.time <= reference);
    let start = end.saturating_sub(count);
    bars[start..end].to_vec()
}
