//! Turning a UTC-only capture time into local time needs to know where the
//! picture was taken. The lookup itself (reverse geocoding services, caches,
//! retries) lives outside this crate, behind [`Geocoder`].

use chrono::TimeZone;
use chrono_tz::Tz;

use crate::{parser::ExtractionResult, values::CaptureTime, Coordinate};

/// A named place and, when known, its IANA timezone such as
/// `"Europe/Paris"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Place {
    pub name: String,
    pub timezone: Option<String>,
}

/// Reverse geocoding: coordinate in, place out.
pub trait Geocoder {
    type Error;

    fn place(&self, at: Coordinate) -> Result<Place, Self::Error>;
}

/// Returns the local capture time of `result`.
///
/// A preferred date is returned as is, without asking `geocoder`. A UTC-only
/// date with a coordinate is shifted into the timezone the geocoder reports
/// for that coordinate. `Ok(None)` means there is no date, no coordinate, or
/// no known timezone for the place.
pub fn resolve_local_time<G: Geocoder>(
    result: &ExtractionResult,
    geocoder: &G,
) -> Result<Option<CaptureTime>, G::Error> {
    if let Some(date) = result.preferred_date {
        return Ok(Some(date));
    }
    let (Some(utc), Some(at)) = (result.utc_only_date, result.coordinate) else {
        return Ok(None);
    };

    let place = geocoder.place(at)?;
    let Some(name) = place.timezone.as_deref() else {
        tracing::debug!(place = %place.name, "place has no timezone");
        return Ok(None);
    };
    let Ok(tz) = name.parse::<Tz>() else {
        tracing::warn!(timezone = %name, "unknown timezone");
        return Ok(None);
    };

    let local = tz.from_utc_datetime(&utc).fixed_offset();
    tracing::debug!(place = %place.name, %local, "Resolved local time");
    Ok(Some(CaptureTime::Zoned(local)))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::NaiveDateTime;

    use super::*;

    struct FixedPlace {
        timezone: Option<&'static str>,
        calls: Cell<usize>,
    }

    impl FixedPlace {
        fn new(timezone: Option<&'static str>) -> Self {
            Self {
                timezone,
                calls: Cell::new(0),
            }
        }
    }

    impl Geocoder for FixedPlace {
        type Error = String;

        fn place(&self, at: Coordinate) -> Result<Place, String> {
            self.calls.set(self.calls.get() + 1);
            Ok(Place {
                name: format!("somewhere near {at}"),
                timezone: self.timezone.map(str::to_owned),
            })
        }
    }

    struct Offline;

    impl Geocoder for Offline {
        type Error = &'static str;

        fn place(&self, _: Coordinate) -> Result<Place, &'static str> {
            Err("offline")
        }
    }

    fn utc_result(coordinate: Option<Coordinate>) -> ExtractionResult {
        let t = NaiveDateTime::parse_from_str("2024-07-14 10:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        ExtractionResult::utc_only(t, coordinate)
    }

    #[test]
    fn utc_to_place_zone() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let paris = FixedPlace::new(Some("Europe/Paris"));
        let result = utc_result(Some(Coordinate::new(48.8566, 2.3522)));
        let local = resolve_local_time(&result, &paris).unwrap().unwrap();
        assert_eq!(local.to_string(), "2024-07-14T12:00:00+02:00");
        assert_eq!(paris.calls.get(), 1);
    }

    #[test]
    fn preferred_date_skips_lookup() {
        let geocoder = FixedPlace::new(Some("Asia/Tokyo"));
        let t = NaiveDateTime::parse_from_str("2013-12-28 15:48:42", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let result = ExtractionResult::dated(
            CaptureTime::Floating(t),
            Some(Coordinate::new(35.0, 139.0)),
        );
        assert_eq!(
            resolve_local_time(&result, &geocoder).unwrap(),
            Some(CaptureTime::Floating(t))
        );
        assert_eq!(geocoder.calls.get(), 0);
    }

    #[test]
    fn unresolved() {
        let at = Some(Coordinate::new(0.0, -160.0));
        assert_eq!(
            resolve_local_time(&utc_result(at), &FixedPlace::new(None)).unwrap(),
            None
        );
        assert_eq!(
            resolve_local_time(&utc_result(at), &FixedPlace::new(Some("Mars/Base"))).unwrap(),
            None
        );
        assert_eq!(
            resolve_local_time(&utc_result(None), &FixedPlace::new(Some("UTC"))).unwrap(),
            None
        );
        assert_eq!(resolve_local_time(&utc_result(at), &Offline), Err("offline"));
    }
}
