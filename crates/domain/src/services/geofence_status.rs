//! Geofence status evaluation.
//!
//! Status is derived from the geofence's active window against local
//! wall-clock time:
//! 1. Inactive flag, missing dates or unparseable dates/times: `inactive`
//! 2. Before the window start: `upcoming`
//! 3. After the window end: `expired`
//! 4. Otherwise (both boundaries inclusive): `active`
//!
//! The violation flag is reported separately and only decides the color
//! while the geofence is neither expired nor inactive.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{Geofence, StatusLabel};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M:%S %p"];

/// Temporal status plus violation sub-status of one geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeofenceAssessment {
    /// One of `active`, `upcoming`, `expired`, `inactive`.
    pub status: StatusLabel,
    /// One of `violating`, `safe`.
    pub violation: StatusLabel,
}

impl GeofenceAssessment {
    /// Label that decides how the geofence is drawn.
    ///
    /// Expired and inactive geofences are neutral regardless of the
    /// violation flag.
    pub fn display_label(&self) -> StatusLabel {
        match self.status {
            StatusLabel::Expired | StatusLabel::Inactive => self.status,
            _ => self.violation,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.status == StatusLabel::Expired
    }
}

/// Parses a time of day such as `09:30`, `09:30:15` or `09:30 AM`.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}

/// Parses a date (optionally carrying a time) and combines it with an
/// optional separate time of day.
///
/// A date without any time component starts at midnight. When `time` is
/// given it replaces whatever time the date carried; an unparseable `time`
/// makes the whole value invalid.
pub fn parse_date_time(date: &str, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = date.trim();
    if date.is_empty() {
        return None;
    }

    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => Some(parse_time_of_day(t)?),
        None => None,
    };

    let parsed = parse_date_component(date)?;
    Some(match time {
        Some(t) => parsed.date().and_time(t),
        None => parsed,
    })
}

fn parse_date_component(date: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    if let Some(dt) = DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
    {
        return Some(dt);
    }

    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Start and end of the geofence's active window, if both parse.
pub fn active_window(geofence: &Geofence) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = parse_date_time(
        geofence.start_date.as_deref()?,
        geofence.start_time.as_deref(),
    )?;
    let end = parse_date_time(geofence.end_date.as_deref()?, geofence.end_time.as_deref())?;
    Some((start, end))
}

/// Derives the temporal status of a geofence at `now`.
pub fn derive_status(geofence: &Geofence, now: NaiveDateTime) -> StatusLabel {
    if !geofence.is_active {
        return StatusLabel::Inactive;
    }

    let Some((start, end)) = active_window(geofence) else {
        return StatusLabel::Inactive;
    };

    if now < start {
        StatusLabel::Upcoming
    } else if now > end {
        StatusLabel::Expired
    } else {
        StatusLabel::Active
    }
}

/// Derives the temporal status against the current local time.
pub fn derive_status_now(geofence: &Geofence) -> StatusLabel {
    derive_status(geofence, Local::now().naive_local())
}

/// Maps the backend violation flag to a display label.
pub fn violation_status(geofence: &Geofence) -> StatusLabel {
    if geofence.is_violating {
        StatusLabel::Violating
    } else {
        StatusLabel::Safe
    }
}

/// Full assessment of a geofence at `now`.
pub fn assess(geofence: &Geofence, now: NaiveDateTime) -> GeofenceAssessment {
    GeofenceAssessment {
        status: derive_status(geofence, now),
        violation: violation_status(geofence),
    }
}

/// True when `now` lies inside an optional date window. Missing or
/// unparseable bounds leave that side open.
pub fn within_optional_window(
    start_date: Option<&str>,
    end_date: Option<&str>,
    now: NaiveDateTime,
) -> bool {
    let after_start = start_date
        .and_then(|d| parse_date_time(d, None))
        .map_or(true, |start| now >= start);
    let before_end = end_date
        .and_then(|d| parse_date_time(d, None))
        .map_or(true, |end| now <= end);
    after_start && before_end
}
