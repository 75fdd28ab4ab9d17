//! Timestamp utilities and business-timezone arithmetic
//!
//! Scheduled follow-ups are wall-clock readings in Pacific Time regardless of
//! server or storage timezone. Every conversion goes through `chrono-tz` so
//! daylight-saving transitions are honoured.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat,
    TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::{Error, Result};

/// Business timezone for all scheduling math
pub const BUSINESS_TZ: Tz = chrono_tz::America::Los_Angeles;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Fixed-width storage form (lexical order == chronological order)
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Corrupt timestamp '{}': {}", value, e)))
}

/// Parse an optional stored timestamp
pub fn from_db_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(from_db).transpose()
}

/// Parse an "HH:MM" (or "HH:MM:SS") wall-clock time
pub fn parse_wall_time(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| Error::InvalidArgument(format!("Invalid time of day (expected HH:MM): {}", value)))
}

/// Parse a calendar date given as `YYYY-MM-DD` or as a full RFC 3339 timestamp.
///
/// Timestamps contribute their UTC calendar date, so a date never drifts with
/// the server timezone.
pub fn parse_calendar_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| Error::InvalidArgument(format!("Invalid date: {}", value)))
}

/// Convert a Pacific wall-clock reading to an absolute instant.
///
/// A reading inside the spring-forward gap is moved forward by the gap
/// (02:30 becomes 03:30 PDT). An ambiguous fall-back reading takes the
/// earlier instant.
pub fn business_to_utc(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let local = NaiveDateTime::new(date, time);
    match BUSINESS_TZ.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = local + Duration::hours(1);
            match BUSINESS_TZ.from_local_datetime(&shifted).earliest() {
                Some(dt) => dt.with_timezone(&Utc),
                None => Utc.from_utc_datetime(&local),
            }
        }
    }
}

/// Absolute instant of a scheduled follow-up; a missing or unreadable time
/// of day means local midnight.
pub fn scheduled_instant(date: NaiveDate, time: Option<&str>) -> DateTime<Utc> {
    let time = time
        .and_then(|t| parse_wall_time(t).ok())
        .unwrap_or(NaiveTime::MIN);
    business_to_utc(date, time)
}

/// Last millisecond of the given Pacific calendar day
pub fn business_end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let next_day = date.succ_opt().unwrap_or(date);
    business_to_utc(next_day, NaiveTime::MIN) - Duration::milliseconds(1)
}

/// Pacific calendar date and "HH:MM" reading of an instant
pub fn business_date_and_time(instant: DateTime<Utc>) -> (NaiveDate, String) {
    let local = instant.with_timezone(&BUSINESS_TZ);
    (local.date_naive(), local.format("%H:%M").to_string())
}
