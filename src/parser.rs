use std::{
    fs::File,
    io::{Cursor, Read, Seek},
    path::Path,
};

use chrono::{FixedOffset, NaiveDateTime, TimeZone};

#[cfg(feature = "json_dump")]
use serde::{Serialize, Serializer};

use crate::{
    error::escape_bytes,
    exif::ExifSummary,
    file::{FileFormat, SNIFF_LEN},
    jpeg::decode_jpeg,
    mov::decode_isobmff,
    png::decode_png,
    source::ByteSource,
    values::{CaptureTime, Coordinate},
    Error,
};

/// What one file says about when and where it was captured.
///
/// At most one of `preferred_date` and `utc_only_date` is set. `diagnostic`
/// explains why there is no preferred date (or why decoding stopped); it is
/// the `Display` text of the corresponding [`Error`].
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionResult {
    /// A timestamp with a known UTC offset, or one asserted to already be the
    /// photographer's local wall-clock time.
    pub preferred_date: Option<CaptureTime>,

    /// A UTC timestamp whose local time can only be derived by looking up
    /// the timezone of the capture location, see
    /// [`resolve_local_time`](crate::resolve_local_time).
    #[cfg_attr(feature = "json_dump", serde(serialize_with = "serialize_utc"))]
    pub utc_only_date: Option<NaiveDateTime>,

    pub coordinate: Option<Coordinate>,
    pub diagnostic: Option<String>,
}

#[cfg(feature = "json_dump")]
fn serialize_utc<S: Serializer>(t: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
    match t {
        Some(t) => s.serialize_some(&t.and_utc().to_rfc3339()),
        None => s.serialize_none(),
    }
}

impl ExtractionResult {
    pub(crate) fn dated(date: CaptureTime, coordinate: Option<Coordinate>) -> Self {
        Self {
            preferred_date: Some(date),
            coordinate,
            ..Default::default()
        }
    }

    pub(crate) fn utc_only(date: NaiveDateTime, coordinate: Option<Coordinate>) -> Self {
        Self {
            utc_only_date: Some(date),
            coordinate,
            diagnostic: Some(Error::MetadataOnlyUtc.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn failed(error: Error) -> Self {
        tracing::debug!(%error, "no date");
        Self {
            diagnostic: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn with_coordinate(mut self, coordinate: Option<Coordinate>) -> Self {
        self.coordinate = coordinate;
        self
    }

    /// The preferred date, or else the UTC-only date as a `+00:00` time.
    pub fn date(&self) -> Option<CaptureTime> {
        self.preferred_date.or_else(|| {
            self.utc_only_date
                .map(|t| CaptureTime::Zoned(t.and_utc().fixed_offset()))
        })
    }

    /// Only a UTC date was found; its local time is unknown.
    pub fn is_utc_only(&self) -> bool {
        self.preferred_date.is_none() && self.utc_only_date.is_some()
    }

    /// The preferred date, or else the UTC-only date shifted to `offset`.
    pub fn localize(&self, offset: FixedOffset) -> Option<CaptureTime> {
        self.preferred_date.or_else(|| {
            self.utc_only_date
                .map(|t| CaptureTime::Zoned(offset.from_utc_datetime(&t)))
        })
    }

    /// A file stem like `2013.12.28 - 15.48.42`, from the wall-clock reading
    /// of the preferred date.
    pub fn suggested_stem(&self) -> Option<String> {
        self.preferred_date
            .map(|t| t.local().format("%Y.%m.%d - %H.%M.%S").to_string())
    }
}

impl From<ExifSummary> for ExtractionResult {
    fn from(summary: ExifSummary) -> Self {
        match summary.date {
            Some(date) => ExtractionResult::dated(date, summary.coordinate),
            None => ExtractionResult::failed(Error::MissingDate("exif lacks times"))
                .with_coordinate(summary.coordinate),
        }
    }
}

/// Extracts capture time and location from a seekable reader.
///
/// Never fails: every problem ends up in
/// [`ExtractionResult::diagnostic`].
pub fn extract<R: Read + Seek>(reader: R) -> ExtractionResult {
    let result = ByteSource::new(reader).and_then(|mut src| extract_source(&mut src));
    result.unwrap_or_else(ExtractionResult::failed)
}

/// Like [`extract`], for the file at `path`. A file which can't be opened
/// yields the diagnostic `unable to open <cause>`.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn extract_file<P: AsRef<Path>>(path: P) -> ExtractionResult {
    match File::open(path.as_ref()) {
        Ok(file) => extract(file),
        Err(e) => ExtractionResult::failed(e.into()),
    }
}

/// Like [`extract`], for an in-memory file.
pub fn extract_bytes(data: &[u8]) -> ExtractionResult {
    extract(Cursor::new(data))
}

/// Dispatches on the first 8 bytes of `src`.
#[tracing::instrument(skip_all)]
pub(crate) fn extract_source<R: Read + Seek>(
    src: &mut ByteSource<R>,
) -> crate::Result<ExtractionResult> {
    let len = src.len();
    if len < SNIFF_LEN as u64 {
        return Err(Error::FileTooSmall);
    }
    let header = src.read_array::<SNIFF_LEN>(0)?;
    let Some(format) = FileFormat::sniff(&header) else {
        return Err(Error::UnrecognizedHeader(escape_bytes(&header)));
    };
    tracing::debug!(%format, len, "Got file format");

    match format {
        FileFormat::Jpeg => decode_jpeg(src, 0, len).map(ExtractionResult::from),
        FileFormat::Isobmff => decode_isobmff(src),
        FileFormat::Png => decode_png(src),
    }
}
