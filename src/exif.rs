//! Capture time and GPS position from a TIFF/Exif block.
//!
//! The block is walked as a chain of IFDs: IFD0 first, then every IFD its
//! `next` pointer leads to, then the Exif sub-IFD, then the GPS IFD. Each
//! directory is visited at most once.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

use crate::error::{convert_parse_error, escape_bytes};
use crate::source::{decode_string, ByteSource, Encoding};
use crate::values::{parse_exif_time, CaptureTime, Coordinate};
use crate::Error;

pub use gps::{GPSInfo, LatLng};
pub use tags::ExifTag;

pub(crate) use ifd::TiffHeader;
use ifd::{IfdEntry, ImageFileDirectory, TIFF_HEADER_LEN};
use tags::DataFormat;

mod gps;
mod ifd;
mod tags;

/// Upper bound on the number of IFDs walked in one Exif block.
pub(crate) const MAX_IFDS: usize = 32;

/// Timestamp tags in the order their candidates are considered.
const TIME_TAGS: [ExifTag; 3] = [
    ExifTag::ModifyDate,
    ExifTag::DateTimeOriginal,
    ExifTag::CreateDate,
];

/// What one Exif block has to say about when and where.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifSummary {
    /// The earliest of `ModifyDate`, `DateTimeOriginal` and `CreateDate`
    /// that could be parsed, zoned when the matching offset tag is present.
    pub date: Option<CaptureTime>,
    pub coordinate: Option<Coordinate>,
}

/// Decodes the TIFF structure occupying `[start, end)` of `src`. All offsets
/// inside the block are relative to `start`, where the byte order mark sits.
///
/// Fails with [`Error::UnrecognizedBom`], [`Error::MarkerSizeWrong`] or
/// [`Error::MalformedIfd`] for structural problems. A block without any
/// usable timestamp is not an error: the summary simply has no date.
#[tracing::instrument(skip(src))]
pub(crate) fn decode_tiff<R: Read + Seek>(
    src: &mut ByteSource<R>,
    start: u64,
    end: u64,
) -> crate::Result<ExifSummary> {
    let end = end.min(src.len());
    let avail = end.saturating_sub(start).min(TIFF_HEADER_LEN) as usize;
    let head = src.read_bytes(start, avail)?;

    if TiffHeader::parse_bom(&head).is_err() {
        return Err(Error::UnrecognizedBom(escape_bytes(&head[..avail.min(4)])));
    }
    let (_, header) = TiffHeader::parse(&head).map_err(|_| Error::MarkerSizeWrong)?;
    tracing::debug!(?header, "Exif block");

    if start + header.ifd0_offset as u64 + ImageFileDirectory::table_len(0) > end {
        return Err(Error::MarkerSizeWrong);
    }

    let mut walker = IfdWalker {
        src,
        header,
        start,
        end,
        texts: HashMap::new(),
        gps: GPSInfo::default(),
    };
    walker.walk()?;
    Ok(walker.summary())
}

struct IfdWalker<'a, R> {
    src: &'a mut ByteSource<R>,
    header: TiffHeader,
    start: u64,
    end: u64,
    texts: HashMap<ExifTag, String>,
    gps: GPSInfo,
}

impl<R: Read + Seek> IfdWalker<'_, R> {
    fn walk(&mut self) -> crate::Result<()> {
        let mut next = self.header.ifd0_offset as u64;
        let mut sub_ifd = 0u64;
        let mut gps_ifd = 0u64;
        let mut visited = HashSet::new();

        loop {
            if next == 0 {
                next = if sub_ifd != 0 {
                    std::mem::take(&mut sub_ifd)
                } else if gps_ifd != 0 {
                    std::mem::take(&mut gps_ifd)
                } else {
                    break;
                };
            }

            if !visited.insert(next) {
                tracing::warn!(offset = next, "IFD visited twice; chain is cyclic");
                next = 0;
                continue;
            }
            if visited.len() > MAX_IFDS {
                tracing::warn!("too many IFDs; stop walking");
                break;
            }

            let ifd = self.read_ifd(next)?;
            for entry in ifd.entries.iter() {
                match ExifTag::try_from(entry.tag) {
                    Ok(ExifTag::ExifOffset) if entry.data_format == DataFormat::U32.code() => {
                        sub_ifd = entry.value_or_offset as u64;
                    }
                    Ok(ExifTag::GPSInfo) if entry.data_format == DataFormat::U32.code() => {
                        gps_ifd = entry.value_or_offset as u64;
                    }
                    Ok(tag) => self.collect(tag, entry)?,
                    Err(_) => (),
                }
            }
            next = ifd.next_ifd as u64;
        }
        Ok(())
    }

    fn read_ifd(&mut self, offset: u64) -> crate::Result<ImageFileDirectory> {
        let pos = self.start + offset;
        let malformed = Error::MalformedIfd { offset };
        if pos + 2 > self.end {
            return Err(malformed);
        }
        let num = self.src.read_uint(pos, 2, self.header.endian)? as u16;
        let len = ImageFileDirectory::table_len(num);
        if pos + len > self.end {
            tracing::warn!(offset, entries = num, "IFD runs past the Exif block");
            return Err(malformed);
        }

        let data = self.src.read_bytes(pos, len as usize)?;
        let (_, ifd) = ImageFileDirectory::parse(&data, self.header.endian)
            .map_err(|e| convert_parse_error(e, "IFD"))?;
        Ok(ifd)
    }

    fn collect(&mut self, tag: ExifTag, entry: &IfdEntry) -> crate::Result<()> {
        use ExifTag::*;

        let ascii = entry.data_format == DataFormat::Ascii.code();
        let rational = entry.data_format == DataFormat::URational.code();
        match tag {
            GPSLatitudeRef | GPSLongitudeRef if ascii && entry.components_num == 2 => {
                let hemisphere = Some(entry.raw[0] as char);
                if tag == GPSLatitudeRef {
                    self.gps.latitude_ref = hemisphere;
                } else {
                    self.gps.longitude_ref = hemisphere;
                }
            }
            GPSLatitude | GPSLongitude if rational && entry.components_num == 3 => {
                let Some(data) = self.entry_data(entry)? else {
                    return Ok(());
                };
                let (_, value) = LatLng::parse(&data, self.header.endian)
                    .map_err(|e| convert_parse_error(e, "GPS rationals"))?;
                if tag == GPSLatitude {
                    self.gps.latitude = Some(value);
                } else {
                    self.gps.longitude = Some(value);
                }
            }
            ModifyDate | DateTimeOriginal | CreateDate if ascii && entry.components_num == 20 => {
                self.collect_text(tag, entry)?;
            }
            OffsetTime | OffsetTimeOriginal | OffsetTimeDigitized if ascii => {
                self.collect_text(tag, entry)?;
            }
            _ => tracing::debug!(%tag, format = entry.data_format, "unexpected entry shape"),
        }
        Ok(())
    }

    fn collect_text(&mut self, tag: ExifTag, entry: &IfdEntry) -> crate::Result<()> {
        let Some(mut data) = self.entry_data(entry)? else {
            return Ok(());
        };
        // strip the NUL terminator (and any padding after it)
        if let Some(nul) = data.iter().position(|b| *b == 0) {
            data.truncate(nul);
        }
        match decode_string(data, Encoding::Ascii) {
            Ok(s) => {
                self.texts.insert(tag, s);
            }
            Err(e) => tracing::warn!(%tag, ?e, "skip text entry"),
        }
        Ok(())
    }

    /// Loads the value of `entry`, either from its inline data field or from
    /// the offset it points to. `None` if the value lies outside the block.
    fn entry_data(&mut self, entry: &IfdEntry) -> crate::Result<Option<Vec<u8>>> {
        let Some(size) = entry.data_size() else {
            return Ok(None);
        };
        if entry.is_inline() {
            return Ok(Some(entry.raw[..size as usize].to_vec()));
        }

        let pos = self.start + entry.value_or_offset as u64;
        if pos + size > self.end {
            tracing::warn!(tag = entry.tag, pos, size, "entry value out of range");
            return Ok(None);
        }
        self.src.read_bytes(pos, size as usize).map(Some)
    }

    fn summary(&self) -> ExifSummary {
        let mut date = None;
        for tag in TIME_TAGS {
            let Some(time) = self.texts.get(&tag) else {
                continue;
            };
            let offset = tag
                .offset_tag()
                .and_then(|t| self.texts.get(&t))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty());

            match parse_exif_time(time, offset) {
                Some(t) => CaptureTime::keep_earliest(&mut date, t),
                None => tracing::debug!(%tag, %time, ?offset, "unparsable Exif time"),
            }
        }

        ExifSummary {
            date,
            coordinate: self.gps.coordinate(),
        }
    }
}
