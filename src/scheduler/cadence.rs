//! Fire-time calculation for the time-triggered jobs.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// When a job fires. All times are UTC.
///
/// ```toml
/// [scheduler.retention_cadence]
/// kind = "weekly"
/// weekday = "Sun"
/// at = "03:00:00"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cadence {
    Daily { at: NaiveTime },
    Weekly { weekday: Weekday, at: NaiveTime },
    Interval { seconds: u64 },
}

impl Cadence {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self::Daily {
            at: NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    pub fn weekly(weekday: Weekday, hour: u32, minute: u32) -> Self {
        Self::Weekly {
            weekday,
            at: NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Self::Daily { at } => {
                let candidate = after.date_naive().and_time(at).and_utc();
                if candidate > after {
                    candidate
                } else {
                    candidate + Duration::days(1)
                }
            }
            Self::Weekly { weekday, at } => {
                let today = after.weekday().num_days_from_monday() as i64;
                let target = weekday.num_days_from_monday() as i64;
                let days_ahead = (target - today).rem_euclid(7);
                let candidate =
                    (after.date_naive() + Duration::days(days_ahead)).and_time(at).and_utc();
                if candidate > after {
                    candidate
                } else {
                    candidate + Duration::days(7)
                }
            }
            Self::Interval { seconds } => after + Duration::seconds(seconds.max(1) as i64),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Interval { seconds: 0 })
    }
}
