use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, ErrorResponse};

use super::stats::{DailyAggregate, DailySeries, IndicatorSeries, IntradayDistribution};

/// Outcome of one dashboard panel within a refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Panel<T> {
    Ready { data: T },
    /// The trading day has not produced a bar yet.
    Pending,
    Unavailable { error: ErrorResponse },
}

impl<T> Panel<T> {
    pub fn from_error(err: &AppError) -> Self {
        Panel::Unavailable {
            error: ErrorResponse::from(err),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Panel::Ready { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Panel::Ready { data } => Some(data),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Panel::Unavailable { error } => Some(error.code.as_str()),
            _ => None,
        }
    }
}

/// Everything one refresh cycle produced for one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub cycle_id: Uuid,
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    /// Server-clock time the cycle ran at; unset when the clock could not be resolved.
    pub server_time: Option<NaiveDateTime>,
    pub session_start: Option<NaiveDateTime>,
    pub minutes_elapsed: u32,
    pub intraday: Panel<IndicatorSeries>,
    pub today: Panel<DailyAggregate>,
    pub history: Panel<DailySeries>,
    pub distribution: Panel<IntradayDistribution>,
}

impl DashboardSnapshot {
    /// Snapshot where every panel failed with the same error.
    pub fn failed(cycle_id: Uuid, symbol: &str, generated_at: DateTime<Utc>, err: &AppError) -> Self {
        Self {
            cycle_id,
            symbol: symbol.to_string(),
            generated_at,
            server_time: None,
            session_start: None,
            minutes_elapsed: 0,
            intraday: Panel::from_error(err),
            today: Panel::from_error(err),
            history: Panel::from_error(err),
            distribution: Panel::from_error(err),
        }
    }

    pub fn ready_panels(&self) -> usize {
        [
            self.intraday.is_ready(),
            self.today.is_ready(),
            self.history.is_ready(),
            self.distribution.is_ready(),
        ]
        .iter()
        .filter(|r| **r)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_serializes_with_status_tag() {
        let ready: Panel<u32> = Panel::Ready { data: 7 };
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["data"], 7);

        let pending: Panel<u32> = Panel::Pending;
        assert_eq!(serde_json::to_value(&pending).unwrap()["status"], "pending");

        let failed: Panel<u32> = Panel::from_error(&AppError::ConnectionFailed("down".into()));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["error"]["code"], "CONNECTION_FAILED");
    }

    #[test]
    fn test_failed_snapshot_has_no_ready_panels() {
        let err = AppError::ConnectionFailed("refused".into());
        let snap = DashboardSnapshot::failed(Uuid::new_v4(), "EURUSD", Utc::now(), &err);
        assert_eq!(snap.ready_panels(), 0);
        assert_eq!(snap.today.error_code(), Some("CONNECTION_FAILED"));
    }
}
