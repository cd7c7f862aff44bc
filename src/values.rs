use std::{cmp::Ordering, fmt::Display};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime};

#[cfg(feature = "json_dump")]
use serde::{Serialize, Serializer};

/// A capture timestamp as recorded by the device.
///
/// - `Zoned`: the UTC offset is known (e.g. EXIF `OffsetTimeOriginal`, Apple
///   `com.apple.quicktime.creationdate`).
/// - `Floating`: a wall-clock reading asserted to already be in the
///   photographer's local frame, but without a recorded offset (e.g. a plain
///   EXIF `DateTimeOriginal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureTime {
    Zoned(DateTime<FixedOffset>),
    Floating(NaiveDateTime),
}

impl CaptureTime {
    /// The wall-clock reading, ignoring any offset.
    pub fn local(&self) -> NaiveDateTime {
        match self {
            CaptureTime::Zoned(t) => t.naive_local(),
            CaptureTime::Floating(t) => *t,
        }
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            CaptureTime::Zoned(t) => Some(*t.offset()),
            CaptureTime::Floating(_) => None,
        }
    }

    /// Chronological order between two readings.
    ///
    /// Two zoned times compare as instants. As soon as one side is floating
    /// there is no common frame, so the wall-clock readings are compared.
    pub fn chrono_cmp(&self, other: &CaptureTime) -> Ordering {
        match (self, other) {
            (CaptureTime::Zoned(a), CaptureTime::Zoned(b)) => a.cmp(b),
            _ => self.local().cmp(&other.local()),
        }
    }

    /// Replace `slot` with `candidate` if the slot is empty or `candidate`
    /// is strictly earlier.
    pub(crate) fn keep_earliest(slot: &mut Option<CaptureTime>, candidate: CaptureTime) {
        match slot {
            Some(current) if candidate.chrono_cmp(current) != Ordering::Less => (),
            _ => *slot = Some(candidate),
        }
    }
}

impl Display for CaptureTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureTime::Zoned(t) => Display::fmt(&t.to_rfc3339(), f),
            CaptureTime::Floating(t) => Display::fmt(&t.format("%Y-%m-%dT%H:%M:%S"), f),
        }
    }
}

impl From<DateTime<FixedOffset>> for CaptureTime {
    fn from(value: DateTime<FixedOffset>) -> Self {
        CaptureTime::Zoned(value)
    }
}

impl From<NaiveDateTime> for CaptureTime {
    fn from(value: NaiveDateTime) -> Self {
        CaptureTime::Floating(value)
    }
}

#[cfg(feature = "json_dump")]
impl Serialize for CaptureTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A WGS-84 position in decimal degrees, north and east positive.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns an ISO 6709 geographic point location string such as
    /// `+48.85770+002.29500/`.
    pub fn to_iso6709(&self) -> String {
        format!(
            "{}{:08.5}{}{:09.5}/",
            if self.latitude >= 0.0 { '+' } else { '-' },
            self.latitude.abs(),
            if self.longitude >= 0.0 { '+' } else { '-' },
            self.longitude.abs(),
        )
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.7},{:.7}", self.latitude, self.longitude)
    }
}

/// An unsigned TIFF rational: numerator / denominator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct URational(pub u32, pub u32);

impl URational {
    /// `None` when the denominator is zero.
    pub fn to_float(&self) -> Option<f64> {
        if self.1 == 0 {
            None
        } else {
            Some(self.0 as f64 / self.1 as f64)
        }
    }
}

impl From<(u32, u32)> for URational {
    fn from(value: (u32, u32)) -> Self {
        Self(value.0, value.1)
    }
}

/// Seconds between 1904-01-01T00:00:00 and 1970-01-01T00:00:00.
pub(crate) const MAC_TO_UNIX_EPOCH_SECS: u64 = 2_082_844_800;

fn mac_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1904, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Converts a QuickTime/ISOBMFF timestamp (seconds since 1904-01-01) to a
/// calendar time.
///
/// Some Android devices write seconds since 1970 instead. Any value smaller
/// than the 1904..1970 distance is taken to be such a 1970-based count and is
/// shifted before any calendar arithmetic happens. Zero means "no date".
pub fn mac_time_to_datetime(seconds: u64) -> Option<NaiveDateTime> {
    if seconds == 0 {
        return None;
    }
    let seconds = if seconds < MAC_TO_UNIX_EPOCH_SECS {
        seconds + MAC_TO_UNIX_EPOCH_SECS
    } else {
        seconds
    };
    let seconds = i64::try_from(seconds).ok()?;
    mac_epoch().checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Parses an Exif date string (`YYYY:MM:DD HH:MM:SS`), together with its
/// Exif offset string (`±HH:MM`) when there is one.
pub(crate) fn parse_exif_time(s: &str, offset: Option<&str>) -> Option<CaptureTime> {
    match offset {
        Some(offset) => {
            let s = format!("{s}{offset}");
            DateTime::parse_from_str(&s, "%Y:%m:%d %H:%M:%S%z")
                .ok()
                .map(CaptureTime::Zoned)
        }
        None => NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S")
            .ok()
            .map(CaptureTime::Floating),
    }
}

/// Parses `2021-01-16T20:29:24-0800` style timestamps. RFC 3339 forms such
/// as `2018-05-06T09:30:00Z` are accepted too.
pub(crate) fn parse_iso8601_time(s: &str) -> Option<CaptureTime> {
    let s = s.trim();
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(CaptureTime::Zoned)
}

/// Parses a US style date such as `4/21/2012`; the time is midnight.
pub(crate) fn parse_us_date(s: &str) -> Option<CaptureTime> {
    NaiveDate::parse_from_str(s.trim(), "%m/%d/%Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(CaptureTime::Floating)
}
