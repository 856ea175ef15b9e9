pub mod cli;
pub mod commands;
pub mod data;
pub mod engine;
pub mod errors;
pub mod models;
pub mod utils;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::errors::AppError;
use crate::models::settings::AppConfig;
use crate::models::snapshot::DashboardSnapshot;

/// Load the configuration, falling back to defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        warn!("Config {} not found, using defaults", path.display());
        let config = AppConfig::default();
        config.validate()?;
        return Ok(config);
    }
    let config = AppConfig::load(path)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// One refresh cycle: a single symbol when given, otherwise every configured one.
pub fn run_cycle(config: &AppConfig, symbol: Option<&str>) -> Vec<DashboardSnapshot> {
    let now = Utc::now();
    match symbol {
        Some(symbol) => {
            let mut source = data::build_source(&config.source);
            vec![commands::refresh_symbol(&mut source, config, symbol, now)]
        }
        None => commands::refresh_all(config, || data::build_source(&config.source), now),
    }
}

fn emit(config: &AppConfig, snapshots: &[DashboardSnapshot]) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for snapshot in snapshots {
        serde_json::to_writer(&mut out, snapshot).context("writing snapshot")?;
        out.write_all(b"\n")?;

        if let Some(dir) = &config.export.csv_dir {
            // export problems must not stop the refresh loop
            if let Err(e) = utils::export::export_snapshot(snapshot, dir) {
                error!("Export for {} failed: {}", snapshot.symbol, e);
            }
        }
    }
    out.flush()?;
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Starting fx-dashboard");

    let config = load_config(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    let symbol = cli.symbol.as_deref();
    let interval = Duration::from_secs(config.dashboard.refresh_interval_secs.max(1));

    loop {
        let snapshots = run_cycle(&config, symbol);
        emit(&config, &snapshots)?;
        if cli.once {
            break;
        }
        std::thread::sleep(interval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.dashboard.history_days, 100);
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[indicators]\nsma_period = 0\n").unwrap();
        assert!(matches!(load_config(&path), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn test_cycle_against_missing_export_dir_reports_connection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_toml_str(&format!(
            "[source]\nkind = \"csv\"\ndir = \"{}\"\n",
            dir.path().join("missing").display()
        ))
        .unwrap();

        let snapshots = run_cycle(&config, Some("GBPUSD"));
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].intraday.error_code(), Some("CONNECTION_FAILED"));
    }
}
