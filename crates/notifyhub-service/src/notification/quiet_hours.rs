//! Quiet-hours and local-time-of-day scheduling math.
//!
//! All functions here are pure over the `now` they are given; the service
//! passes its [`Clock`](notifyhub_core::clock::Clock) reading in. Windows
//! are `"HH:MM"` strings local to an IANA timezone and may span midnight
//! (`22:00`–`06:00` covers late evening through early morning).

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;

/// Parse a `"HH:MM"` time-of-day string.
pub fn parse_hhmm(value: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
        AppError::with_source(
            ErrorKind::Validation,
            format!("Invalid time of day '{value}', expected HH:MM"),
            e,
        )
    })
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AppError::new(ErrorKind::Validation, format!("Unknown timezone '{name}'")))
}

/// Whether `time` falls inside the window. An overnight window (start >
/// end) wraps past midnight; an empty window (start == end) matches
/// nothing.
pub fn in_window(time: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start == end {
        false
    } else if start < end {
        start <= time && time < end
    } else {
        time >= start || time < end
    }
}

/// If `now` falls inside the user's quiet hours, the instant the window
/// ends; otherwise `None`.
pub fn next_active_time(
    now: DateTime<Utc>,
    timezone: &str,
    start: &str,
    end: &str,
) -> AppResult<Option<DateTime<Utc>>> {
    let tz = parse_timezone(timezone)?;
    let start = parse_hhmm(start)?;
    let end = parse_hhmm(end)?;

    let local = now.with_timezone(&tz);
    if !in_window(local.time(), start, end) {
        return Ok(None);
    }

    // In an overnight window that has not yet wrapped, the end lies on the
    // next calendar day.
    let end_date = if start > end && local.time() >= start {
        local.date_naive() + Duration::days(1)
    } else {
        local.date_naive()
    };

    let end_utc = resolve_local(&tz, end_date.and_time(end)).with_timezone(&Utc);
    Ok(Some(end_utc))
}

/// The next occurrence of a local time of day at or after `now`.
pub fn next_occurrence(
    now: DateTime<Utc>,
    timezone: &str,
    time_of_day: &str,
) -> AppResult<DateTime<Utc>> {
    let tz = parse_timezone(timezone)?;
    let time = parse_hhmm(time_of_day)?;

    let local = now.with_timezone(&tz);
    let mut candidate = local.date_naive().and_time(time);
    if resolve_local(&tz, candidate) <= local {
        candidate += Duration::days(1);
    }
    Ok(resolve_local(&tz, candidate).with_timezone(&Utc))
}

/// Resolve a naive local datetime against DST transitions: ambiguous times
/// take the earlier offset, nonexistent times shift forward an hour.
fn resolve_local(tz: &Tz, naive: chrono::NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(earliest, _) => earliest,
        chrono::LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}
