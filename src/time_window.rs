//! Time-of-day windows: parsing, normalization and wire formats.
//!
//! The UI works in `HH:MM`; the remote store and optimizer speak `HH:MM:SS`.
//! Windows are half-open same-day intervals; a missing bound is completed
//! from the other one, one hour apart, wrapping around midnight.

use chrono::{Duration, NaiveTime};
use thiserror::Error;

/// `HH:MM`, what the operator types and sees.
pub const DISPLAY_FORMAT: &str = "%H:%M";

/// `HH:MM:SS`, what the remote store persists.
pub const BACKEND_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeWindowError {
    #[error("invalid time {value:?}: expected HH:MM")]
    Format { value: String },
    #[error("time window start {start} must fall strictly before end {end}")]
    InvalidOrder { start: String, end: String },
}

/// A resolved delivery window within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parses a window from two `HH:MM` values without any normalization.
    pub fn from_display(start: &str, end: &str) -> Result<Self, TimeWindowError> {
        Ok(Self {
            start: parse_display(start)?,
            end: parse_display(end)?,
        })
    }

    pub fn start_display(&self) -> String {
        self.start.format(DISPLAY_FORMAT).to_string()
    }

    pub fn end_display(&self) -> String {
        self.end.format(DISPLAY_FORMAT).to_string()
    }

    pub fn start_backend(&self) -> String {
        self.start.format(BACKEND_FORMAT).to_string()
    }

    pub fn end_backend(&self) -> String {
        self.end.format(BACKEND_FORMAT).to_string()
    }
}

/// Non-blocking advisories produced while resolving a window. These are for
/// the operator's information, never hard errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowNote {
    /// The end was missing and derived as start + 1h.
    EndDerived,
    /// The start was missing and derived as end - 1h.
    StartDerived,
    /// A literal `00:00` start was moved to `00:01` to keep it apart from
    /// "no constraint".
    StartNudgedOffMidnight,
}

/// Outcome of [`resolve`]: the normalized window plus any advisories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub window: TimeWindow,
    pub notes: Vec<WindowNote>,
}

/// Normalizes a pair of optional `HH:MM` bounds into a window.
///
/// Blank input counts as absent. With both bounds absent there is no window.
/// A lone bound is completed one hour away, wrapping past midnight (the
/// strict start-before-end rule only applies when the operator supplied both
/// bounds; a derived window may legally wrap). A `00:00` start is nudged to
/// `00:01` after completion, reported via [`WindowNote::StartNudgedOffMidnight`],
/// except when the end is already `00:01` and the nudge would empty the window.
pub fn resolve(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<ResolvedWindow>, TimeWindowError> {
    let start = start.map(str::trim).filter(|value| !value.is_empty());
    let end = end.map(str::trim).filter(|value| !value.is_empty());

    let mut notes = Vec::new();
    let (start, end) = match (start, end) {
        (None, None) => return Ok(None),
        (Some(start), Some(end)) => {
            let start = parse_display(start)?;
            let end = parse_display(end)?;
            if start >= end {
                return Err(TimeWindowError::InvalidOrder {
                    start: start.format(DISPLAY_FORMAT).to_string(),
                    end: end.format(DISPLAY_FORMAT).to_string(),
                });
            }
            (start, end)
        }
        (Some(start), None) => {
            let start = parse_display(start)?;
            notes.push(WindowNote::EndDerived);
            (start, start + Duration::hours(1))
        }
        (None, Some(end)) => {
            let end = parse_display(end)?;
            notes.push(WindowNote::StartDerived);
            (end - Duration::hours(1), end)
        }
    };

    // A supplied 00:00-00:01 pair has no room for the nudge; the literal
    // midnight stays rather than collapsing the window.
    let nudged = NaiveTime::from_hms_opt(0, 1, 0).unwrap();
    let start = if start == NaiveTime::MIN && nudged < end {
        notes.push(WindowNote::StartNudgedOffMidnight);
        nudged
    } else {
        start
    };

    Ok(Some(ResolvedWindow {
        window: TimeWindow { start, end },
        notes,
    }))
}

/// Parses an `HH:MM` value.
pub fn parse_display(value: &str) -> Result<NaiveTime, TimeWindowError> {
    NaiveTime::parse_from_str(value.trim(), DISPLAY_FORMAT).map_err(|_| TimeWindowError::Format {
        value: value.to_string(),
    })
}

/// Parses an `HH:MM:SS` value.
pub fn parse_backend(value: &str) -> Result<NaiveTime, TimeWindowError> {
    NaiveTime::parse_from_str(value.trim(), BACKEND_FORMAT).map_err(|_| TimeWindowError::Format {
        value: value.to_string(),
    })
}

/// Parses a clock value in either wire format. Used on optimizer responses,
/// which are not consistent about carrying seconds.
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(value, BACKEND_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, DISPLAY_FORMAT))
        .ok()
}

/// `HH:MM` -> `HH:MM:SS` by zero-padding seconds.
pub fn display_to_backend(value: &str) -> Result<String, TimeWindowError> {
    Ok(parse_display(value)?.format(BACKEND_FORMAT).to_string())
}

/// `HH:MM:SS` -> `HH:MM` by truncating seconds.
pub fn backend_to_display(value: &str) -> Result<String, TimeWindowError> {
    Ok(parse_backend(value)?.format(DISPLAY_FORMAT).to_string())
}
