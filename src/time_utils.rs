// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.
//!
//! Task timestamps are stored as UTC ISO-8601 strings with millisecond
//! precision and a `Z` suffix (`2024-01-01T09:00:00.000Z`).

use chrono::{DateTime, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use std::str::FromStr;

/// Rendered in place of a due date when a task has none.
pub const NO_DEADLINE: &str = "No deadline";

/// Rendered when a stored due timestamp cannot be parsed.
pub const INVALID_DATE: &str = "Invalid Date";

const DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Time zone used to interpret due date/time input and to render due dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DueZone {
    /// The host's local time zone.
    #[default]
    Local,
    Utc,
}

impl FromStr for DueZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(DueZone::Local),
            "utc" => Ok(DueZone::Utc),
            other => Err(format!("unknown due time zone: {other}")),
        }
    }
}

/// Format a UTC timestamp as ISO-8601 with milliseconds and a `Z` suffix.
pub fn format_iso_millis(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current instant formatted for storage.
pub fn now_iso() -> String {
    format_iso_millis(Utc::now())
}

/// Combine a `YYYY-MM-DD` date and an `HH:MM[:SS]` time into a stored due
/// timestamp.
///
/// Returns `None` when either part is missing or blank. Input that does not
/// parse also yields `None`.
pub fn compose_due(zone: DueZone, date: Option<&str>, time: Option<&str>) -> Option<String> {
    let date = date.map(str::trim).filter(|d| !d.is_empty())?;
    let time = time.map(str::trim).filter(|t| !t.is_empty())?;

    let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        tracing::warn!(date, "Ignoring unparseable due date");
        return None;
    };
    let Ok(clock) = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
    else {
        tracing::warn!(time, "Ignoring unparseable due time");
        return None;
    };

    let naive = day.and_time(clock);
    let instant = match zone {
        DueZone::Utc => naive.and_utc(),
        // Skipped local times (DST gaps) have no instant.
        DueZone::Local => Local
            .from_local_datetime(&naive)
            .earliest()?
            .with_timezone(&Utc),
    };

    Some(format_iso_millis(instant))
}

/// Milliseconds since the epoch for a stored timestamp, if it parses.
pub fn due_sort_key(due: Option<&str>) -> Option<i64> {
    due.and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.timestamp_millis())
}

/// Render a due timestamp for display.
pub fn format_due(zone: DueZone, due: Option<&str>) -> String {
    let Some(raw) = due else {
        return NO_DEADLINE.to_string();
    };

    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => match zone {
            DueZone::Utc => dt.with_timezone(&Utc).format(DISPLAY_FORMAT).to_string(),
            DueZone::Local => dt.with_timezone(&Local).format(DISPLAY_FORMAT).to_string(),
        },
        Err(_) => INVALID_DATE.to_string(),
    }
}
