//! ISO base media file format (MP4/MOV/HEIF) box plumbing.
//!
//! Boxes are never loaded as a tree. A [`BoxWalker`] steps over the siblings
//! inside one byte range of a [`ByteSource`], handing out [`BoxHeader`]s; the
//! few boxes whose bodies matter are then read and parsed with nom.

use std::fmt::Display;
use std::io::{Read, Seek};
use std::ops::Range;

use nom::{
    bytes::complete::take,
    number::complete::{be_u24, be_u32, be_u64, u8},
    sequence::tuple,
    IResult,
};

use crate::error::{convert_parse_error, escape_bytes};
use crate::source::ByteSource;
use crate::Error;

mod iinf;
mod iloc;
mod ilst;
mod keys;
mod meta;
mod mvhd;
pub(crate) use iinf::IinfBox;
pub(crate) use iloc::IlocBox;
pub(crate) use ilst::IlstBox;
pub(crate) use keys::KeysBox;
pub(crate) use meta::{AppleMeta, ExifLocation, HeifMeta};
pub(crate) use mvhd::MvhdBox;

/// Box bodies larger than this are never loaded into memory.
pub(crate) const MAX_BODY_LEN: u64 = 100 * 1024 * 1024;

/// Nesting limit for [`dump_box_tree`].
const MAX_DUMP_DEPTH: usize = 32;

/// The four character codes this crate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxKind {
    Ftyp,
    Moov,
    Meta,
    Iinf,
    Infe,
    Iloc,
    Iref,
    Mdat,
    Keys,
    Ilst,
    Udta,
    Mvhd,
    /// Canon's Exif carrier in `moov/udta`.
    Cnth,
    /// `©xyz`, an ISO 6709 location in `moov/udta`.
    Xyz,
    Other([u8; 4]),
}

impl BoxKind {
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            BoxKind::Ftyp => *b"ftyp",
            BoxKind::Moov => *b"moov",
            BoxKind::Meta => *b"meta",
            BoxKind::Iinf => *b"iinf",
            BoxKind::Infe => *b"infe",
            BoxKind::Iloc => *b"iloc",
            BoxKind::Iref => *b"iref",
            BoxKind::Mdat => *b"mdat",
            BoxKind::Keys => *b"keys",
            BoxKind::Ilst => *b"ilst",
            BoxKind::Udta => *b"udta",
            BoxKind::Mvhd => *b"mvhd",
            BoxKind::Cnth => *b"CNTH",
            BoxKind::Xyz => *b"\xA9xyz",
            BoxKind::Other(code) => *code,
        }
    }
}

impl From<[u8; 4]> for BoxKind {
    fn from(code: [u8; 4]) -> Self {
        match &code {
            b"ftyp" => BoxKind::Ftyp,
            b"moov" => BoxKind::Moov,
            b"meta" => BoxKind::Meta,
            b"iinf" => BoxKind::Iinf,
            b"infe" => BoxKind::Infe,
            b"iloc" => BoxKind::Iloc,
            b"iref" => BoxKind::Iref,
            b"mdat" => BoxKind::Mdat,
            b"keys" => BoxKind::Keys,
            b"ilst" => BoxKind::Ilst,
            b"udta" => BoxKind::Udta,
            b"mvhd" => BoxKind::Mvhd,
            b"CNTH" => BoxKind::Cnth,
            b"\xA9xyz" => BoxKind::Xyz,
            _ => BoxKind::Other(code),
        }
    }
}

impl Display for BoxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // String::from_utf8 would fail on "©xyz"
        let s = self
            .fourcc()
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == 0xA9 {
                    b as char
                } else {
                    '*'
                }
            })
            .collect::<String>();
        f.write_str(&s)
    }
}

/// Location of one box inside the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub kind: BoxKind,
    /// Offset of the size field.
    pub start: u64,
    /// First byte after the size/type (and largesize) fields.
    pub payload_start: u64,
    pub end: u64,
}

impl BoxHeader {
    /// `(box_size, fourcc, header_size)`; a size field of 1 means the real
    /// size follows as a 64-bit `largesize`.
    fn parse(input: &[u8]) -> IResult<&[u8], (u64, [u8; 4], u64)> {
        let (remain, (size, code)) = tuple((be_u32, take(4usize)))(input)?;
        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(code);

        if size == 1 {
            let (remain, large) = be_u64(remain)?;
            Ok((remain, (large, fourcc, 16)))
        } else {
            Ok((remain, (size as u64, fourcc, 8)))
        }
    }

    /// Reads the header of the box at `pos`, which must end by `end`.
    ///
    /// Returns `None` ("no more boxes") when fewer than 8 bytes are left, when
    /// the size is 0 or smaller than the header, or when the box would
    /// overrun `end`.
    pub fn read<R: Read + Seek>(
        src: &mut ByteSource<R>,
        pos: u64,
        end: u64,
    ) -> crate::Result<Option<BoxHeader>> {
        let end = end.min(src.len());
        if pos.checked_add(8).map_or(true, |x| x > end) {
            return Ok(None);
        }
        let head = src.read_bytes(pos, (end - pos).min(16) as usize)?;
        let Ok((_, (size, fourcc, header_size))) = BoxHeader::parse(&head) else {
            // largesize doesn't fit
            return Ok(None);
        };

        if size < header_size || pos.checked_add(size).map_or(true, |x| x > end) {
            tracing::debug!(pos, size, end, "box doesn't fit; stop walking");
            return Ok(None);
        }

        Ok(Some(BoxHeader {
            kind: fourcc.into(),
            start: pos,
            payload_start: pos + header_size,
            end: pos + size,
        }))
    }

    pub fn payload_len(&self) -> u64 {
        self.end - self.payload_start
    }

    pub fn payload(&self) -> Range<u64> {
        self.payload_start..self.end
    }
}

/// Steps over sibling boxes in `[pos, end)`.
#[derive(Debug, Clone)]
pub(crate) struct BoxWalker {
    pos: u64,
    end: u64,
}

impl BoxWalker {
    pub fn new(start: u64, end: u64) -> Self {
        Self { pos: start, end }
    }

    pub fn next_box<R: Read + Seek>(
        &mut self,
        src: &mut ByteSource<R>,
    ) -> crate::Result<Option<BoxHeader>> {
        let Some(header) = BoxHeader::read(src, self.pos, self.end)? else {
            return Ok(None);
        };
        // every box is at least 8 bytes long, so this always advances
        self.pos = header.end;
        Ok(Some(header))
    }
}

/// Finds the first sibling of `kind` in `[start, end)`; children are not
/// searched.
pub(crate) fn find_box<R: Read + Seek>(
    src: &mut ByteSource<R>,
    kind: BoxKind,
    start: u64,
    end: u64,
) -> crate::Result<Option<BoxHeader>> {
    let mut walker = BoxWalker::new(start, end);
    while let Some(header) = walker.next_box(src)? {
        if header.kind == kind {
            return Ok(Some(header));
        }
    }
    Ok(None)
}

/// Reads the payload of `header` into memory.
pub(crate) fn read_payload<R: Read + Seek>(
    src: &mut ByteSource<R>,
    header: &BoxHeader,
) -> crate::Result<Vec<u8>> {
    if header.payload_len() > MAX_BODY_LEN {
        tracing::warn!(kind = %header.kind, len = header.payload_len(), "box body is too big");
        return Err(Error::ContainerSizeMismatch("box body is too big"));
    }
    src.read_bytes(header.payload_start, header.payload_len() as usize)
}

/// Reads and parses a full box (one starting with version and flags).
pub(crate) fn read_full_box<O, T: ParseBox<O>, R: Read + Seek>(
    src: &mut ByteSource<R>,
    header: &BoxHeader,
) -> crate::Result<O> {
    let payload = read_payload(src, header)?;
    let (_, parsed) = T::parse_box(&payload)
        .map_err(|e| convert_parse_error(e, &format!("invalid {} box", header.kind)))?;
    Ok(parsed)
}

/// Version and flags at the start of a full box payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullBoxHeader {
    pub version: u8, // 8 bits
    pub flags: u32,  // 24 bits
}

impl FullBoxHeader {
    pub const SIZE: u64 = 4;

    fn parse(input: &[u8]) -> IResult<&[u8], FullBoxHeader> {
        let (remain, (version, flags)) = tuple((u8, be_u24))(input)?;
        Ok((remain, FullBoxHeader { version, flags }))
    }
}

pub(crate) trait ParseBody<O> {
    fn parse_body(body: &[u8], header: FullBoxHeader) -> IResult<&[u8], O>;
}

pub(crate) trait ParseBox<O> {
    fn parse_box(payload: &[u8]) -> IResult<&[u8], O>;
}

/// auto implements parse_box for each Box which implements ParseBody
impl<O, T: ParseBody<O>> ParseBox<O> for T {
    fn parse_box(payload: &[u8]) -> IResult<&[u8], O> {
        let (body, header) = FullBoxHeader::parse(payload)?;
        let (remain, parsed) = Self::parse_body(body, header)?;
        if !remain.is_empty() {
            tracing::debug!(trailing = remain.len(), "ignore trailing bytes in box body");
        }
        Ok((remain, parsed))
    }
}

/// Major brand of the `ftyp` box found among the siblings in `[start, end)`.
pub(crate) fn major_brand<R: Read + Seek>(
    src: &mut ByteSource<R>,
    start: u64,
    end: u64,
) -> crate::Result<Option<[u8; 4]>> {
    let Some(ftyp) = find_box(src, BoxKind::Ftyp, start, end)? else {
        return Ok(None);
    };
    if ftyp.payload_len() < 4 {
        return Ok(None);
    }
    Ok(Some(src.read_array::<4>(ftyp.payload_start)?))
}

/// Lists the box hierarchy in `range`, one line per box, for debugging.
///
/// Each line reads `kind:payload_start-end:first bytes`, indented by depth.
/// `meta` and `iref` are entered past their version/flags, `iinf` past its
/// item count; `mdat`, `ftyp`, `infe` and `iloc` are leaves. Any other box
/// is optimistically treated as a container, which yields nothing (or
/// nonsense) for boxes holding plain data.
pub fn dump_box_tree<R: Read + Seek>(
    src: &mut ByteSource<R>,
    range: Range<u64>,
) -> crate::Result<Vec<String>> {
    let mut lines = Vec::new();
    dump_level(src, range, 0, &mut lines)?;
    Ok(lines)
}

fn dump_level<R: Read + Seek>(
    src: &mut ByteSource<R>,
    range: Range<u64>,
    depth: usize,
    lines: &mut Vec<String>,
) -> crate::Result<()> {
    if depth >= MAX_DUMP_DEPTH {
        tracing::warn!(depth, "box tree too deep; stop descending");
        return Ok(());
    }

    let mut walker = BoxWalker::new(range.start, range.end);
    while let Some(header) = walker.next_box(src)? {
        let len = header.payload_len().min(24);
        let head = src.read_bytes(header.payload_start, len as usize)?;
        lines.push(format!(
            "{}{}:{}-{}:{}{}",
            "  ".repeat(depth),
            header.kind,
            header.payload_start,
            header.end,
            escape_bytes(&head),
            if len < header.payload_len() { "..." } else { "" },
        ));

        let children = match header.kind {
            BoxKind::Mdat | BoxKind::Ftyp | BoxKind::Infe | BoxKind::Iloc => continue,
            BoxKind::Meta | BoxKind::Iref => header.payload_start + FullBoxHeader::SIZE,
            BoxKind::Iinf => {
                if header.payload_len() < FullBoxHeader::SIZE {
                    continue;
                }
                let version = src.read_array::<1>(header.payload_start)?[0];
                header.payload_start + if version == 0 { 6 } else { 8 }
            }
            _ => header.payload_start,
        };
        dump_level(src, children..header.end, depth + 1, lines)?;
    }
    Ok(())
}
