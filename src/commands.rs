use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::data::{MarketDataSource, Session};
use crate::engine::aggregate::derive_daily_aggregate;
use crate::engine::clock::{minutes_since_midnight, ServerClock};
use crate::engine::daily::build_daily_series;
use crate::engine::distribution::build_distribution;
use crate::engine::indicators::build_indicator_series;
use crate::engine::retrieval::{fetch_daily, fetch_today};
use crate::errors::AppError;
use crate::models::settings::AppConfig;
use crate::models::snapshot::{DashboardSnapshot, Panel};
use crate::models::stats::IndicatorSeries;

// ── Refresh Commands ──

/// Run one dashboard refresh for `symbol`.
///
/// Never fails: every problem ends up as an `unavailable` panel. A source
/// that cannot be opened marks all four panels `CONNECTION_FAILED`.
pub fn refresh_symbol<S: MarketDataSource + ?Sized>(
    source: &mut S,
    config: &AppConfig,
    symbol: &str,
    utc_now: DateTime<Utc>,
) -> DashboardSnapshot {
    let cycle_id = Uuid::new_v4();
    info!("Refresh {} started for {}", cycle_id, symbol);

    if !config.dashboard.symbols.iter().any(|s| s == symbol) {
        let err = AppError::UnknownSymbol(symbol.to_string());
        warn!("Refresh {}: {}", cycle_id, err);
        return DashboardSnapshot::failed(cycle_id, symbol, utc_now, &err);
    }

    let clock = match ServerClock::from_config(&config.clock) {
        Ok(clock) => clock,
        Err(e) => {
            error!("Refresh {}: {}", cycle_id, e);
            return DashboardSnapshot::failed(cycle_id, symbol, utc_now, &e);
        }
    };

    let mut session = match Session::open(source) {
        Ok(session) => session,
        Err(e) => {
            error!("Refresh {}: [{}] {}", cycle_id, e.code(), e);
            return DashboardSnapshot::failed(cycle_id, symbol, utc_now, &e);
        }
    };

    let server_now = match clock.server_now(&mut session, utc_now) {
        Ok(now) => now,
        Err(e) => {
            error!("Refresh {}: cannot resolve server clock: {}", cycle_id, e);
            return DashboardSnapshot::failed(cycle_id, symbol, utc_now, &e);
        }
    };

    // ── Intraday ──
    let intraday: Result<Option<IndicatorSeries>, AppError> = fetch_today(&mut session, symbol, server_now)
        .and_then(|today| {
            today
                .map(|series| build_indicator_series(&series, &config.indicators))
                .transpose()
        });

    let distribution = match &intraday {
        Ok(Some(series)) => into_panel(
            cycle_id,
            "distribution",
            build_distribution(series, &config.activity).map(Some),
        ),
        Ok(None) => Panel::Pending,
        // already logged for the intraday panel
        Err(e) => Panel::from_error(e),
    };

    // ── Daily ──
    let today = fetch_daily(&mut session, symbol, server_now, 1).and_then(|s| derive_daily_aggregate(&s));
    let history = fetch_daily(&mut session, symbol, server_now, config.dashboard.history_days)
        .and_then(|s| build_daily_series(&s));

    session.close();

    let snapshot = DashboardSnapshot {
        cycle_id,
        symbol: symbol.to_string(),
        generated_at: utc_now,
        server_time: Some(server_now),
        session_start: Some(ServerClock::session_start(server_now)),
        minutes_elapsed: minutes_since_midnight(server_now),
        intraday: into_panel(cycle_id, "intraday", intraday),
        today: into_panel(cycle_id, "today", today.map(Some)),
        history: into_panel(cycle_id, "history", history.map(Some)),
        distribution,
    };

    info!(
        "Refresh {} finished for {}: {}/4 panels ready",
        cycle_id,
        symbol,
        snapshot.ready_panels()
    );
    snapshot
}

/// Refresh every configured symbol in parallel, each with its own source.
///
/// Snapshots come back in the order of `config.dashboard.symbols`.
pub fn refresh_all<F, S>(config: &AppConfig, factory: F, utc_now: DateTime<Utc>) -> Vec<DashboardSnapshot>
where
    F: Fn() -> S + Sync,
    S: MarketDataSource,
{
    config
        .dashboard
        .symbols
        .par_iter()
        .map(|symbol| {
            let mut source = factory();
            refresh_symbol(&mut source, config, symbol, utc_now)
        })
        .collect()
}

fn into_panel<T>(cycle_id: Uuid, panel: &str, result: Result<Option<T>, AppError>) -> Panel<T> {
    match result {
        Ok(Some(data)) => Panel::Ready { data },
        Ok(None) => Panel::Pending,
        Err(e) => {
            if e.is_recoverable() {
                warn!("Refresh {}: {} panel [{}] {}", cycle_id, panel, e.code(), e);
            } else {
                error!("Refresh {}: {} panel [{}] {}", cycle_id, panel, e.code(), e);
            }
            Panel::from_error(&e)
        }
    }
}
