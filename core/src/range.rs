// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Conversion between the remote and the local representation of item spans.
//!
//! The remote store describes all-day spans as inclusive, date-only ranges
//! (`2025-01-10..2025-01-12` covers three days). The local store uses
//! exclusive end instants (`2025-01-10T00:00Z..2025-01-13T00:00Z`). Timed
//! spans are identical on both sides.

use std::fmt;

use jiff::civil::{Date, Time};
use jiff::tz::TimeZone;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::RangeError;

/// Span of a local item, with an exclusive end instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRange {
    /// First instant covered by the item.
    pub start: Timestamp,
    /// First instant not covered by the item.
    pub end: Timestamp,
    /// Whether the item covers whole days.
    pub all_day: bool,
}

/// Span of a remote item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteRange {
    /// Whole days, both ends inclusive.
    AllDay {
        /// First day of the span.
        first: Date,
        /// Last day of the span, included.
        last: Date,
    },

    /// Instants, identical semantics on both sides.
    Timed {
        /// Start instant.
        start: Timestamp,
        /// End instant.
        end: Timestamp,
    },
}

/// A single value as sent by the remote store: either a date or an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTime {
    /// Date without a time component.
    Date(Date),
    /// Absolute instant.
    Instant(Timestamp),
}

impl RemoteTime {
    fn date(self) -> Date {
        match self {
            Self::Date(d) => d,
            Self::Instant(ts) => utc_date(ts),
        }
    }

    fn instant(self) -> Result<Timestamp, RangeError> {
        match self {
            Self::Date(d) => midnight(d),
            Self::Instant(ts) => Ok(ts),
        }
    }
}

impl fmt::Display for RemoteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{d}"),
            Self::Instant(ts) => write!(f, "{ts}"),
        }
    }
}

/// Converts a local span to the remote representation.
///
/// For all-day items the exclusive end is moved back by one day. An end that
/// is not day-aligned still covers part of its day, so that day is kept.
pub fn to_remote_range(
    start: Timestamp,
    end: Timestamp,
    all_day: bool,
) -> Result<RemoteRange, RangeError> {
    if !all_day {
        return Ok(RemoteRange::Timed { start, end });
    }

    let first = utc_date(start);
    let end_date = utc_date(end);
    let last = if is_day_aligned(end) {
        end_date
            .yesterday()
            .map_err(|_| RangeError::Overflow(end_date.to_string()))?
    } else {
        end_date
    };

    Ok(RemoteRange::AllDay {
        first,
        last: last.max(first),
    })
}

/// Converts a remote span to the local representation.
pub fn to_local_range(range: &RemoteRange) -> Result<LocalRange, RangeError> {
    match *range {
        RemoteRange::Timed { start, end } => Ok(LocalRange {
            start,
            end,
            all_day: false,
        }),
        RemoteRange::AllDay { first, last } => {
            let last = last.max(first);
            let after = last
                .tomorrow()
                .map_err(|_| RangeError::Overflow(last.to_string()))?;
            Ok(LocalRange {
                start: midnight(first)?,
                end: midnight(after)?,
                all_day: true,
            })
        }
    }
}

impl RemoteRange {
    /// Builds a range from the raw values the remote store sends.
    ///
    /// Date-only values are valid for both kinds: for timed items they mean
    /// midnight UTC, for all-day items instants are truncated to their date.
    pub fn from_wire(start: &str, end: &str, all_day: bool) -> Result<Self, RangeError> {
        let start = parse_remote_time(start)?;
        let end = parse_remote_time(end)?;
        if all_day {
            Ok(Self::AllDay {
                first: start.date(),
                last: end.date(),
            })
        } else {
            Ok(Self::Timed {
                start: start.instant()?,
                end: end.instant()?,
            })
        }
    }

    /// Start of the range as an instant, used to locate occurrences.
    pub fn approx_start(&self) -> Result<Timestamp, RangeError> {
        match *self {
            Self::AllDay { first, .. } => midnight(first),
            Self::Timed { start, .. } => Ok(start),
        }
    }
}

impl LocalRange {
    /// Whether this span overlaps `[from, to)`. Zero-length spans overlap
    /// when their start lies inside the window.
    pub fn overlaps(&self, from: Timestamp, to: Timestamp) -> bool {
        if self.end <= self.start {
            return self.start >= from && self.start < to;
        }
        self.start < to && self.end > from
    }
}

/// Parses a remote date or datetime.
///
/// Accepts `2025-01-10`, `20250110`, RFC 3339 instants and the compact
/// `20250110T100000Z` form.
pub fn parse_remote_time(raw: &str) -> Result<RemoteTime, RangeError> {
    let raw = raw.trim();
    let invalid = || RangeError::InvalidValue(raw.to_string());

    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return jiff::fmt::strtime::parse("%Y%m%d", raw)
            .and_then(|tm| tm.to_date())
            .map(RemoteTime::Date)
            .map_err(|_| invalid());
    }

    if !raw.contains('T') && !raw.contains(' ') {
        return raw.parse::<Date>().map(RemoteTime::Date).map_err(|_| invalid());
    }

    if let Ok(ts) = raw.parse::<Timestamp>() {
        return Ok(RemoteTime::Instant(ts));
    }

    // Compact basic format, e.g. 20250110T100000Z or 20250110T100000+0100
    let compact = match raw.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+0000"),
        None => raw.to_string(),
    };
    jiff::fmt::strtime::parse("%Y%m%dT%H%M%S%z", &compact)
        .and_then(|tm| tm.to_timestamp())
        .map(RemoteTime::Instant)
        .map_err(|_| invalid())
}

/// Formats a range into the raw values the remote store expects.
pub fn format_remote_range(range: &RemoteRange) -> (String, String) {
    match range {
        RemoteRange::AllDay { first, last } => (first.to_string(), last.to_string()),
        RemoteRange::Timed { start, end } => (start.to_string(), end.to_string()),
    }
}

/// Time window fetched by the pull phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Inclusive lower bound.
    pub start: Timestamp,
    /// Exclusive upper bound.
    pub end: Timestamp,
}

impl Window {
    /// Window spanning `past` before and `future` after `now`.
    pub fn around(
        now: Timestamp,
        past: SignedDuration,
        future: SignedDuration,
    ) -> Result<Self, RangeError> {
        let overflow = || RangeError::Overflow(now.to_string());
        let start = now.checked_sub(past.abs()).map_err(|_| overflow())?;
        let end = now.checked_add(future.abs()).map_err(|_| overflow())?;
        Ok(Self { start, end })
    }

    /// Whether `range` has any overlap with this window.
    pub fn contains(&self, range: &LocalRange) -> bool {
        range.overlaps(self.start, self.end)
    }
}

fn utc_date(ts: Timestamp) -> Date {
    ts.to_zoned(TimeZone::UTC).date()
}

fn is_day_aligned(ts: Timestamp) -> bool {
    ts.to_zoned(TimeZone::UTC).time() == Time::midnight()
}

fn midnight(date: Date) -> Result<Timestamp, RangeError> {
    date.to_zoned(TimeZone::UTC)
        .map(|z| z.timestamp())
        .map_err(|_| RangeError::Overflow(date.to_string()))
}
