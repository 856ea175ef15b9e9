use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};

use crate::errors::AppError;
use crate::models::bar::Bar;
use crate::models::config::Timeframe;

use super::{select_window, MarketDataSource};

/// Bars held in memory, keyed by symbol and timeframe.
///
/// Used for replaying captured data and as the test double for the pipeline.
#[derive(Debug, Clone)]
pub struct MemorySource {
    bars: HashMap<(String, Timeframe), Vec<Bar>>,
    offset: FixedOffset,
    open: bool,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            offset: Utc.fix(),
            open: false,
        }
    }

    /// Server clock offset reported by [`MarketDataSource::server_utc_offset`].
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Replace the bars for one symbol/timeframe. Bars are sorted by time.
    pub fn insert(&mut self, symbol: &str, timeframe: Timeframe, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.time);
        self.bars.insert((symbol.to_uppercase(), timeframe), bars);
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.bars.keys().map(|(s, _)| s.clone()).collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

impl MarketDataSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(&mut self) -> Result<(), AppError> {
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
            return Err(AppError::ConnectionFailed("memory source is closed".into()));
        }
        Ok(self
            .bars
            .get(&(symbol.to_uppercase(), timeframe))
            .map(|bars| select_window(bars, reference, count))
            .unwrap_or_default())
    }

    fn server_utc_offset(&self, _at: DateTime<Utc>) -> Result<FixedOffset, AppError> {
        Ok(self.offset)
    }
}
