use std::io::{Read, Seek};

use nom::{bytes::complete::tag, number, sequence::tuple, IResult};

use crate::exif::{decode_tiff, ExifSummary};
use crate::source::ByteSource;
use crate::Error;

/// `"Exif\0\0"` in front of the TIFF header of an APP1 segment.
const EXIF_IDENT: &[u8] = b"Exif\0\0";

/// Smallest APP1 size field worth looking into: the size field itself, the
/// Exif identifier and a few header bytes.
const MIN_EXIF_SEGMENT_SIZE: u16 = 14;

/// Decodes the Exif block of the JPEG stream occupying `[start, end)`.
///
/// The stream is walked segment by segment from just after SOI, up to the
/// first APP1 segment carrying Exif data; the walk gives up at SOS since image
/// data follows.
#[tracing::instrument(skip(src))]
pub(crate) fn decode_jpeg<R: Read + Seek>(
    src: &mut ByteSource<R>,
    start: u64,
    end: u64,
) -> crate::Result<ExifSummary> {
    let segment = find_exif_segment(src, start, end)?;
    decode_tiff(src, segment.tiff_start(), segment.end())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    marker_code: u8,
    /// Position of the `0xFF` marker byte.
    start: u64,
    /// Big endian length field, which counts itself.
    size: u16,
}

impl Segment {
    fn parse_header(input: &[u8], start: u64) -> IResult<&[u8], Segment> {
        let (remain, (_, marker_code, size)) =
            tuple((number::complete::u8, number::complete::u8, number::complete::be_u16))(input)?;
        Ok((
            remain,
            Segment {
                marker_code,
                start,
                size,
            },
        ))
    }

    fn payload_start(&self) -> u64 {
        self.start + 4
    }

    fn tiff_start(&self) -> u64 {
        self.payload_start() + EXIF_IDENT.len() as u64
    }

    fn end(&self) -> u64 {
        self.start + 2 + self.size as u64
    }
}

fn find_exif_segment<R: Read + Seek>(
    src: &mut ByteSource<R>,
    start: u64,
    end: u64,
) -> crate::Result<Segment> {
    let end = end.min(src.len());
    // skip SOI
    let mut pos = start + 2;

    loop {
        if pos + 4 > end {
            return Err(Error::MissingDate("did not find TIFF Exif block"));
        }
        let head = src.read_array::<4>(pos)?;
        let (_, segment) = Segment::parse_header(&head, pos)?;
        if segment.end() > end {
            return Err(Error::ContainerSizeMismatch("TIFF block size mismatch"));
        }
        pos = segment.end();
        tracing::debug!(marker = segment.marker_code, size = segment.size, "Got segment.");

        if segment.marker_code == MarkerCode::Sos.code() {
            return Err(Error::MissingDate(
                "did not find TIFF Exif block before image data",
            ));
        }
        if segment.marker_code != MarkerCode::APP1.code()
            || segment.size < MIN_EXIF_SEGMENT_SIZE
        {
            continue;
        }

        let ident = src.read_bytes(segment.payload_start(), EXIF_IDENT.len())?;
        if check_exif_header(&ident) {
            return Ok(segment);
        }
    }
}

pub(crate) fn check_exif_header(data: &[u8]) -> bool {
    tag::<_, _, nom::error::Error<_>>(EXIF_IDENT)(data).is_ok()
}

/// Quick signature check: SOI marker `[0xFF, 0xD8]`.
pub(crate) fn check_jpeg(input: &[u8]) -> bool {
    input.starts_with(&[0xFF, MarkerCode::Soi.code()])
}

/// https://www.disktuna.com/list-of-jpeg-markers/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerCode {
    // Start of Image
    Soi = 0xD8,

    // APP1 marker
    APP1 = 0xE1,

    // Start of Scan
    Sos = 0xDA,
}

impl MarkerCode {
    fn code(self) -> u8 {
        self as u8
    }
}
