use std::fmt::Debug;

use nom::{
    branch::alt,
    bytes::complete::{tag, take},
    combinator::map,
    multi::count,
    number::{complete, Endianness},
    sequence::tuple,
    IResult,
};

use super::tags::component_size;

pub(crate) const TIFF_HEADER_LEN: u64 = 8;
pub(crate) const IFD_ENTRY_SIZE: u64 = 12;

/// TIFF Header
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct TiffHeader {
    pub endian: Endianness,
    pub ifd0_offset: u32,
}

impl Debug for TiffHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endian_str = match self.endian {
            Endianness::Big => "Big",
            Endianness::Little => "Little",
            Endianness::Native => "Native",
        };
        f.debug_struct("TiffHeader")
            .field("endian", &endian_str)
            .field("ifd0_offset", &format!("{:#x}", self.ifd0_offset))
            .finish()
    }
}

impl TiffHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], TiffHeader> {
        let (remain, endian) = TiffHeader::parse_bom(input)?;
        let (remain, ifd0_offset) = complete::u32(endian)(remain)?;
        Ok((
            remain,
            TiffHeader {
                endian,
                ifd0_offset,
            },
        ))
    }

    /// Byte order mark plus the 0x2a magic: `MM\0*` or `II*\0`.
    pub fn parse_bom(input: &[u8]) -> IResult<&[u8], Endianness> {
        alt((
            map(tag(&b"MM\x00\x2a"[..]), |_| Endianness::Big),
            map(tag(&b"II\x2a\x00"[..]), |_| Endianness::Little),
        ))(input)
    }
}

/// One 12 bytes directory entry.
///
/// | 2   | 2           | 4              | 4                      |
/// | tag | data format | components num | data (value or offset) |
///
/// If `components num * bytes per component` is at most 4, the data field
/// holds the value itself, otherwise an offset from the TIFF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IfdEntry {
    pub tag: u16,
    pub data_format: u16,
    pub components_num: u32,
    pub value_or_offset: u32,
    pub raw: [u8; 4],
}

impl IfdEntry {
    fn parse(input: &[u8], endian: Endianness) -> IResult<&[u8], IfdEntry> {
        let (remain, (tag, data_format, components_num, raw)) = tuple((
            complete::u16(endian),
            complete::u16(endian),
            complete::u32(endian),
            take(4usize),
        ))(input)?;
        let (_, value_or_offset) = complete::u32(endian)(raw)?;

        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(raw);

        Ok((
            remain,
            IfdEntry {
                tag,
                data_format,
                components_num,
                value_or_offset,
                raw: bytes,
            },
        ))
    }

    /// Size of the value in bytes, `None` for unknown formats or overflow.
    pub fn data_size(&self) -> Option<u64> {
        component_size(self.data_format)?.checked_mul(self.components_num as u64)
    }

    pub fn is_inline(&self) -> bool {
        self.data_size().is_some_and(|size| size <= 4)
    }
}

/// https://www.media.mit.edu/pia/Research/deepview/exif.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageFileDirectory {
    pub entries: Vec<IfdEntry>,
    /// Offset of the next IFD in the chain, 0 when this is the last one.
    pub next_ifd: u32,
}

impl ImageFileDirectory {
    /// Byte length of a directory with `entry_num` entries, including the
    /// entry counter and the trailing next-IFD pointer.
    pub fn table_len(entry_num: u16) -> u64 {
        2 + entry_num as u64 * IFD_ENTRY_SIZE + 4
    }

    pub fn parse(input: &[u8], endian: Endianness) -> IResult<&[u8], ImageFileDirectory> {
        let (remain, num) = complete::u16(endian)(input)?;
        let (remain, entries) = count(|i| IfdEntry::parse(i, endian), num as usize)(remain)?;
        let (remain, next_ifd) = complete::u32(endian)(remain)?;
        Ok((remain, ImageFileDirectory { entries, next_ifd }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(b"MM\x00\x2a\x00\x00\x00\x08", Endianness::Big, 8)]
    #[test_case(b"II\x2a\x00\x08\x00\x00\x00", Endianness::Little, 8)]
    #[test_case(b"II\x2a\x00\x00\x01\x00\x00", Endianness::Little, 0x100)]
    fn tiff_header(data: &[u8], endian: Endianness, offset: u32) {
        let (remain, header) = TiffHeader::parse(data).unwrap();
        assert!(remain.is_empty());
        assert_eq!(header.endian, endian);
        assert_eq!(header.ifd0_offset, offset);
    }

    #[test_case(b"MM\x2a\x00\x00\x00\x00\x08")]
    #[test_case(b"IM\x2a\x00\x00\x00\x00\x08")]
    #[test_case(b"II\x2a")]
    fn bad_bom(data: &[u8]) {
        assert!(TiffHeader::parse(data).is_err());
    }

    #[test]
    fn directory() {
        let data = [
            0x00, 0x02, // 2 entries
            0x90, 0x03, 0x00, 0x02, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x26, //
            0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02, b'N', 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, // last
        ];
        let (remain, ifd) = ImageFileDirectory::parse(&data, Endianness::Big).unwrap();
        assert!(remain.is_empty());
        assert_eq!(ifd.next_ifd, 0);
        assert_eq!(ifd.entries.len(), 2);
        assert_eq!(data.len() as u64, ImageFileDirectory::table_len(2));

        let date = ifd.entries[0];
        assert_eq!(date.tag, 0x9003);
        assert_eq!(date.data_size(), Some(20));
        assert!(!date.is_inline());
        assert_eq!(date.value_or_offset, 0x26);

        let lat_ref = ifd.entries[1];
        assert!(lat_ref.is_inline());
        assert_eq!(lat_ref.raw[0], b'N');
    }

    #[test]
    fn truncated_directory() {
        let data = [0x03, 0x00, 0x01, 0x00];
        assert!(ImageFileDirectory::parse(&data, Endianness::Little).is_err());
    }
}
