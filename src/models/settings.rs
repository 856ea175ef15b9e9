use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::data::csv_source::CsvSourceConfig;
use crate::data::dukascopy::DukascopyConfig;
use crate::errors::AppError;

/// Top-level configuration, loaded from TOML. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dashboard: DashboardConfig,
    pub clock: ClockConfig,
    pub indicators: IndicatorSettings,
    pub activity: ActivitySettings,
    pub source: SourceConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Symbols offered by the dashboard's symbol selector.
    pub symbols: Vec<String>,
    /// Number of daily bars in the multi-day series.
    pub history_days: usize,
    /// Seconds between refresh cycles in watch mode.
    pub refresh_interval_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            symbols: ["GBPUSD", "EURGBP", "EURUSD", "AUDUSD", "AUDJPY", "USDJPY"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            history_days: 100,
            refresh_interval_secs: 60,
        }
    }
}

/// How the server clock's UTC offset is resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClockConfig {
    /// Ask the data source for its offset at the current instant.
    #[default]
    Source,
    Utc,
    Fixed { offset_minutes: i32 },
    /// IANA zone name, e.g. "Europe/Athens" for EET/EEST brokers.
    Zone { zone: String },
}

/// Lookback windows for the intraday indicator columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub sma_period: usize,
    pub rsi_period: usize,
    /// EMA window behind bulls/bears power.
    pub power_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            sma_period: 5,
            rsi_period: 14,
            power_period: 13,
        }
    }
}

/// Thresholds for the intraday activity summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitySettings {
    /// Absolute percentage change below which a bar counts as quiet.
    pub quiet_zone_pct: f64,
    /// Tick volume below which a bar counts as average volatility.
    pub tick_volume_baseline: u64,
    pub histogram_bins: usize,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            quiet_zone_pct: 0.03,
            tick_volume_baseline: 30,
            histogram_bins: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Csv(CsvSourceConfig),
    Dukascopy(DukascopyConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Dukascopy(DukascopyConfig::default())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// When set, each refresh writes the intraday and daily series as CSV here.
    pub csv_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::FileRead(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let dash = &self.dashboard;
        if dash.symbols.is_empty() {
            return Err(AppError::InvalidConfig("dashboard.symbols is empty".into()));
        }
        if dash.history_days == 0 {
            return Err(AppError::InvalidConfig("dashboard.history_days must be > 0".into()));
        }

        let ind = &self.indicators;
        if ind.sma_period == 0 || ind.rsi_period == 0 || ind.power_period == 0 {
            return Err(AppError::InvalidConfig("indicator windows must be > 0".into()));
        }

        let act = &self.activity;
        if act.histogram_bins == 0 {
            return Err(AppError::InvalidConfig("activity.histogram_bins must be > 0".into()));
        }
        if !act.quiet_zone_pct.is_finite() || act.quiet_zone_pct < 0.0 {
            return Err(AppError::InvalidConfig(
                "activity.quiet_zone_pct must be a non-negative number".into(),
            ));
        }

        if let ClockConfig::Zone { zone } = &self.clock {
            parse_zone(zone)?;
        }
        if let SourceConfig::Csv(csv) = &self.source {
            if let Some(zone) = &csv.server_zone {
                parse_zone(zone)?;
            }
        }
        Ok(())
    }
}

/// Parse an IANA zone name.
pub fn parse_zone(name: &str) -> Result<Tz, AppError> {
    name.parse::<Tz>()
        .map_err(|e| AppError::InvalidConfig(format!("unknown time zone '{}': {}", name, e)))
}
