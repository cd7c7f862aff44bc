//! Capture time and location of ISO base media files: MP4, MOV, HEIC.
//!
//! Sources are tried in this order, stopping at the first date:
//!
//! 1. HEIF Exif item (`meta/iinf` + `meta/iloc`)
//! 2. Apple QuickTime metadata (`moov/meta/keys` + `moov/meta/ilst`)
//! 3. Canon's embedded JPEG/Exif stream (`moov/udta/CNTH`)
//! 4. the movie header creation time (`moov/mvhd`)
//!
//! A source without a date, or one which fails to decode, only hands its
//! location (if any) on to the next one. `moov/udta/©xyz` only contributes a
//! location, read right before `mvhd`.

use std::io::{Read, Seek};

use nom::number::Endianness;

use crate::bbox::{
    find_box, major_brand, read_full_box, AppleMeta, BoxHeader, BoxKind, MvhdBox,
};
use crate::heif::decode_heif_exif;
use crate::iso6709::parse_iso6709;
use crate::jpeg::decode_jpeg;
use crate::parser::ExtractionResult;
use crate::source::{ByteSource, Encoding};
use crate::values::{parse_iso8601_time, parse_us_date, CaptureTime, Coordinate};
use crate::Error;

const LOCATION_KEY: &str = "com.apple.quicktime.location.ISO6709";
const CREATIONDATE_KEY: &str = "com.apple.quicktime.creationdate";

/// Sony writes local wall-clock time into `mvhd`; all its files (and, as
/// far as is known, only those) carry this major brand.
const LOCAL_TIME_BRAND: &[u8; 4] = b"MSNV";

/// Skipped in front of the JPEG stream inside `CNTH`.
const CNTH_PREFIX_LEN: u64 = 8;

#[tracing::instrument(skip_all)]
pub(crate) fn decode_isobmff<R: Read + Seek>(
    src: &mut ByteSource<R>,
) -> crate::Result<ExtractionResult> {
    let end = src.len();
    // diagnostic when no source has a date
    let mut missing = Error::MissingDate("no metadata atoms");
    let mut coordinate = None;

    match decode_heif_exif(src, 0, end) {
        Ok(Some(summary)) => {
            if let Some(date) = summary.date {
                return Ok(ExtractionResult::dated(date, summary.coordinate));
            }
            coordinate = summary.coordinate;
            missing = Error::MissingDate("exif lacks times");
        }
        Ok(None) => (),
        Err(e) => {
            tracing::warn!(error = %e, "skip HEIF Exif item");
            missing = e;
        }
    }

    let Some(moov) = find_box(src, BoxKind::Moov, 0, end)? else {
        return Ok(ExtractionResult::failed(missing).with_coordinate(coordinate));
    };

    if let Some(meta) = find_box(src, BoxKind::Meta, moov.payload_start, moov.end)? {
        match AppleMeta::read(src, &meta) {
            Ok(apple) => {
                if let Some(location) = apple.texts(LOCATION_KEY).last() {
                    coordinate = parse_iso6709(location).or(coordinate);
                }
                let date = apple
                    .texts(CREATIONDATE_KEY)
                    .filter_map(parse_creation_date)
                    .last();
                tracing::debug!(?date, ?coordinate, "QuickTime metadata");
                if let Some(date) = date {
                    return Ok(ExtractionResult::dated(date, coordinate));
                }
            }
            Err(e) => tracing::warn!(error = %e, "skip QuickTime metadata"),
        }
    }

    if let Some(udta) = find_box(src, BoxKind::Udta, moov.payload_start, moov.end)? {
        if let Some(cnth) = find_box(src, BoxKind::Cnth, udta.payload_start, udta.end)? {
            if cnth.payload_len() >= 2 * CNTH_PREFIX_LEN {
                tracing::debug!("decode CNTH");
                let start = cnth.payload_start + CNTH_PREFIX_LEN;
                match decode_jpeg(src, start, cnth.end) {
                    Ok(summary) => {
                        coordinate = coordinate.or(summary.coordinate);
                        if let Some(date) = summary.date {
                            return Ok(ExtractionResult::dated(date, coordinate));
                        }
                        missing = Error::MissingDate("exif lacks times");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "skip CNTH");
                        missing = e;
                    }
                }
            }
        }
        if let Some(xyz) = find_box(src, BoxKind::Xyz, udta.payload_start, udta.end)? {
            if let Some(location) = read_xyz(src, &xyz)? {
                coordinate = location;
            }
        }
    }

    if let Some(mvhd) = find_box(src, BoxKind::Mvhd, moov.payload_start, moov.end)? {
        if mvhd.payload_len() >= MvhdBox::MIN_PAYLOAD_LEN {
            let mvhd = read_full_box::<_, MvhdBox, _>(src, &mvhd)?;
            let brand = major_brand(src, 0, end)?;
            return Ok(movie_header_result(&mvhd, brand, coordinate));
        }
    }

    Ok(ExtractionResult::failed(missing).with_coordinate(coordinate))
}

/// `2021-01-16T20:29:24-0800` as written by iPhones, or `4/21/2012` as in
/// Apple's documentation.
fn parse_creation_date(s: &str) -> Option<CaptureTime> {
    parse_iso8601_time(s).or_else(|| parse_us_date(s))
}

/// `©xyz` holds a 2-byte string length, a 2-byte language code, then an
/// ISO 6709 string. `Some(parsed)` when the string was present, even if it
/// didn't parse.
fn read_xyz<R: Read + Seek>(
    src: &mut ByteSource<R>,
    xyz: &BoxHeader,
) -> crate::Result<Option<Option<Coordinate>>> {
    if xyz.payload_len() < 4 {
        return Ok(None);
    }
    let len = src.read_uint(xyz.payload_start, 2, Endianness::Big)?;
    if 4 + len > xyz.payload_len() {
        return Ok(None);
    }
    match src.read_string(xyz.payload_start + 4, len as usize, Encoding::Utf8) {
        Ok(s) => {
            tracing::debug!(%s, "Got ©xyz");
            Ok(Some(parse_iso6709(&s)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "invalid ©xyz text");
            Ok(None)
        }
    }
}

fn movie_header_result(
    mvhd: &MvhdBox,
    brand: Option<[u8; 4]>,
    coordinate: Option<Coordinate>,
) -> ExtractionResult {
    let Some(created) = mvhd.creation_time() else {
        return ExtractionResult::failed(Error::MissingDate("metadata has empty date"))
            .with_coordinate(coordinate);
    };
    tracing::debug!(%created, brand = ?brand.map(BoxKind::from), "Got mvhd");

    if brand.as_ref() == Some(LOCAL_TIME_BRAND) {
        ExtractionResult::dated(CaptureTime::Floating(created), coordinate)
    } else {
        ExtractionResult::utc_only(created, coordinate)
    }
}
