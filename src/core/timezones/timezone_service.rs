// Schedule clock shared by the daily claims, the custom game lobby and the
// nightly MMR job. Everything here takes `now` as a parameter so callers (and
// tests) decide what time it is.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Daily rewards roll over at midnight in this zone.
pub const DAILY_RESET_TZ: Tz = chrono_tz::America::New_York;

/// The nightly MMR refresh runs at midnight in this zone.
pub const MMR_REFRESH_TZ: Tz = chrono_tz::America::Toronto;

#[derive(Debug, Error, PartialEq)]
pub enum TimezoneError {
    #[error("unknown timezone `{0}` (use est, cst or pst)")]
    UnknownZone(String),

    #[error("could not read `{0}` as a time (use 21:30 or 9:30 PM)")]
    InvalidTime(String),

    #[error("that time does not exist in the chosen timezone")]
    Nonexistent,
}

/// A zone a lobby start time can be entered in and is displayed in.
pub struct LobbyTimezone {
    pub key: &'static str,
    pub label: &'static str,
    pub tz: Tz,
}

pub struct TimezoneDisplay {
    pub label: &'static str,
    pub twelve_hour: String,
}

pub struct TimezoneService {
    zones: Vec<LobbyTimezone>,
}

impl Default for TimezoneService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimezoneService {
    pub fn new() -> Self {
        Self {
            zones: vec![
                LobbyTimezone {
                    key: "est",
                    label: "EST",
                    tz: chrono_tz::US::Eastern,
                },
                LobbyTimezone {
                    key: "cst",
                    label: "CST",
                    tz: chrono_tz::US::Central,
                },
                LobbyTimezone {
                    key: "pst",
                    label: "PST",
                    tz: chrono_tz::US::Pacific,
                },
            ],
        }
    }

    fn zone(&self, key: &str) -> Result<&LobbyTimezone, TimezoneError> {
        let key = key.trim().to_lowercase();
        self.zones
            .iter()
            .find(|z| z.key == key)
            .ok_or(TimezoneError::UnknownZone(key))
    }

    /// Parse a wall-clock time entered in one of the lobby zones.
    ///
    /// Accepts `21:30` or `9:30 PM`. A time that has already passed today
    /// (in that zone) is moved to tomorrow.
    pub fn parse_start_time(
        &self,
        text: &str,
        zone: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, TimezoneError> {
        let zone = self.zone(zone)?;
        let cleaned = text.trim().to_uppercase();

        let time = NaiveTime::parse_from_str(&cleaned, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&cleaned, "%I:%M %p"))
            .or_else(|_| NaiveTime::parse_from_str(&cleaned, "%I:%M%p"))
            .map_err(|_| TimezoneError::InvalidTime(text.trim().to_string()))?;

        let local_today = now.with_timezone(&zone.tz).date_naive();
        let mut start = local_to_utc(zone.tz, local_today, time)?;
        if start < now {
            let tomorrow = local_today + Duration::days(1);
            start = local_to_utc(zone.tz, tomorrow, time)?;
        }

        Ok(start)
    }

    /// Render an instant as "9:30 PM" in every lobby zone.
    pub fn format_in_zones(&self, instant: DateTime<Utc>) -> Vec<TimezoneDisplay> {
        self.zones
            .iter()
            .map(|zone| TimezoneDisplay {
                label: zone.label,
                twelve_hour: twelve_hour(instant.with_timezone(&zone.tz)),
            })
            .collect()
    }
}

fn local_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>, TimezoneError> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(TimezoneError::Nonexistent)
}

fn twelve_hour<T: TimeZone>(dt: DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    let text = dt.format("%I:%M %p").to_string();
    match text.strip_prefix('0') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

/// The calendar day a daily claim belongs to.
pub fn daily_reset_day(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&DAILY_RESET_TZ).date_naive()
}

/// The instant the current daily period began (New York midnight).
pub fn reset_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    local_to_utc(DAILY_RESET_TZ, daily_reset_day(now), NaiveTime::MIN)
        .unwrap_or(now - Duration::days(1))
}

/// Next midnight in `tz` strictly after `now`.
pub fn next_midnight(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let tomorrow = now.with_timezone(&tz).date_naive() + Duration::days(1);
    // Midnight can only be skipped by a DST jump in a handful of zones; fall back
    // to 01:00 there.
    local_to_utc(tz, tomorrow, NaiveTime::MIN)
        .or_else(|_| local_to_utc(tz, tomorrow, NaiveTime::from_hms_opt(1, 0, 0).unwrap_or_default()))
        .unwrap_or(now + Duration::days(1))
}

/// How long until daily claims open again.
pub fn time_until_reset(now: DateTime<Utc>) -> Duration {
    next_midnight(now, DAILY_RESET_TZ) - now
}

/// Format a duration as "5h 12m".
pub fn format_hours_minutes(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn daily_day_follows_new_york_not_utc() {
        // 03:00 UTC on Jan 2 is still Jan 1 in New York.
        let now = utc("2024-01-02T03:00:00Z");
        assert_eq!(
            daily_reset_day(now),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn time_until_reset_counts_to_new_york_midnight() {
        // 22:00 New York (EST, UTC-5)
        let now = utc("2024-01-02T03:00:00Z");
        let remaining = time_until_reset(now);
        assert_eq!(remaining, Duration::hours(2));
        assert_eq!(format_hours_minutes(remaining), "2h 0m");
        assert_eq!(reset_day_start(now), utc("2024-01-01T05:00:00Z"));
    }

    #[test]
    fn parse_start_time_accepts_both_formats() {
        let service = TimezoneService::new();
        let now = utc("2024-06-01T12:00:00Z"); // 08:00 EDT

        let a = service.parse_start_time("21:30", "est", now).unwrap();
        let b = service.parse_start_time("9:30 pm", "EST", now).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, utc("2024-06-02T01:30:00Z"));
    }

    #[test]
    fn parse_start_time_rolls_past_times_to_tomorrow() {
        let service = TimezoneService::new();
        let now = utc("2024-06-01T20:00:00Z"); // 13:00 PDT

        let start = service.parse_start_time("10:00", "pst", now).unwrap();
        assert_eq!(start, utc("2024-06-02T17:00:00Z"));
    }

    #[test]
    fn parse_start_time_rejects_garbage() {
        let service = TimezoneService::new();
        let now = utc("2024-06-01T20:00:00Z");

        assert_eq!(
            service.parse_start_time("soon", "est", now),
            Err(TimezoneError::InvalidTime("soon".to_string()))
        );
        assert!(matches!(
            service.parse_start_time("10:00", "gmt", now),
            Err(TimezoneError::UnknownZone(_))
        ));
    }

    #[test]
    fn format_in_zones_strips_leading_zero() {
        let service = TimezoneService::new();
        let displays = service.format_in_zones(utc("2024-06-02T01:30:00Z"));

        let rendered: Vec<_> = displays
            .iter()
            .map(|d| format!("{} {}", d.label, d.twelve_hour))
            .collect();
        assert_eq!(rendered, vec!["EST 9:30 PM", "CST 8:30 PM", "PST 6:30 PM"]);
    }
}
