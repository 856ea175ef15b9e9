use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::data::{MarketDataSource, Session};
use crate::errors::AppError;
use crate::models::settings::{parse_zone, ClockConfig};

/// Whole minutes since midnight of `now`'s calendar day, in `[0, 1439]`.
pub fn minutes_since_midnight(now: NaiveDateTime) -> u32 {
    now.time().num_seconds_from_midnight() / 60
}

#[derive(Debug, Clone)]
enum OffsetPolicy {
    Source,
    Fixed(FixedOffset),
    Zone(Tz),
}

/// Resolves "now" on the trading server's clock.
#[derive(Debug, Clone)]
pub struct ServerClock {
    policy: OffsetPolicy,
}

impl ServerClock {
    pub fn from_config(config: &ClockConfig) -> Result<Self, AppError> {
        let policy = match config {
            ClockConfig::Source => OffsetPolicy::Source,
            ClockConfig::Utc => OffsetPolicy::Fixed(Utc.fix()),
            ClockConfig::Fixed { offset_minutes } => {
                let offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
                    AppError::InvalidConfig(format!("clock offset out of range: {} minutes", offset_minutes))
                })?;
                OffsetPolicy::Fixed(offset)
            }
            ClockConfig::Zone { zone } => OffsetPolicy::Zone(parse_zone(zone)?),
        };
        Ok(Self { policy })
    }

    /// Server UTC offset in effect at `utc_now`.
    pub fn offset_at<S: MarketDataSource + ?Sized>(
        &self,
        session: &mut Session<'_, S>,
        utc_now: DateTime<Utc>,
    ) -> Result<FixedOffset, AppError> {
        match &self.policy {
            OffsetPolicy::Source => session.server_utc_offset(utc_now),
            OffsetPolicy::Fixed(offset) => Ok(*offset),
            OffsetPolicy::Zone(tz) => Ok(tz.offset_from_utc_datetime(&utc_now.naive_utc()).fix()),
        }
    }

    pub fn server_now<S: MarketDataSource + ?Sized>(
        &self,
        session: &mut Session<'_, S>,
        utc_now: DateTime<Utc>,
    ) -> Result<NaiveDateTime, AppError> {
        let offset = self.offset_at(session, utc_now)?;
        Ok(to_server_time(utc_now, offset))
    }

    /// Minutes of the current server day that have elapsed at `utc_now`.
    pub fn elapsed_minutes<S: MarketDataSource + ?Sized>(
        &self,
        session: &mut Session<'_, S>,
        utc_now: DateTime<Utc>,
    ) -> Result<u32, AppError> {
        Ok(minutes_since_midnight(self.server_now(session, utc_now)?))
    }

    /// Midnight of the server day containing `server_now`.
    pub fn session_start(server_now: NaiveDateTime) -> NaiveDateTime {
        server_now.date().and_time(NaiveTime::MIN)
    }
}

pub fn to_server_time(utc_now: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    utc_now.with_timezone(&offset).naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemorySource;
    use crate::models::bar::test_support::at;

    fn utc(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap()
    }

    #[test]
    fn test_minutes_since_midnight_bounds() {
        assert_eq!(minutes_since_midnight(at(2024, 1, 15, 0, 0)), 0);
        assert_eq!(minutes_since_midnight(at(2024, 1, 15, 23, 59)), 1439);
        assert_eq!(minutes_since_midnight(at(2024, 1, 15, 9, 30)), 570);
    }

    #[test]
    fn test_server_midnight_with_fixed_offset() {
        let clock = ServerClock::from_config(&ClockConfig::Fixed { offset_minutes: 180 }).unwrap();
        let mut source = MemorySource::new();
        let mut session = Session::open(&mut source).unwrap();

        // 21:00 UTC is midnight on a UTC+3 server
        assert_eq!(clock.elapsed_minutes(&mut session, utc(2024, 7, 15, 21, 0)).unwrap(), 0);
        assert_eq!(clock.elapsed_minutes(&mut session, utc(2024, 7, 15, 20, 59)).unwrap(), 1439);
        let now = clock.server_now(&mut session, utc(2024, 7, 15, 21, 30)).unwrap();
        assert_eq!(ServerClock::session_start(now), at(2024, 7, 16, 0, 0));
    }

    #[test]
    fn test_zone_follows_daylight_saving() {
        let clock = ServerClock::from_config(&ClockConfig::Zone {
            zone: "Europe/Athens".into(),
        })
        .unwrap();
        let mut source = MemorySource::new();
        let mut session = Session::open(&mut source).unwrap();

        // EET (+2) in winter, EEST (+3) in summer
        assert_eq!(clock.elapsed_minutes(&mut session, utc(2024, 1, 15, 22, 0)).unwrap(), 0);
        assert_eq!(clock.elapsed_minutes(&mut session, utc(2024, 7, 15, 21, 0)).unwrap(), 0);
    }

    #[test]
    fn test_source_policy_asks_the_source() {
        let clock = ServerClock::from_config(&ClockConfig::Source).unwrap();
        let mut source = MemorySource::new().with_offset(FixedOffset::east_opt(2 * 3600).unwrap());
        let mut session = Session::open(&mut source).unwrap();
        let now = clock.server_now(&mut session, utc(2024, 1, 15, 10, 0)).unwrap();
        assert_eq!(now, at(2024, 1, 15, 12, 0));
    }

    #[test]
    fn test_out_of_range_fixed_offset_rejected() {
        let err = ServerClock::from_config(&ClockConfig::Fixed { offset_minutes: 24 * 60 }).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfig(_)));
    }
}
