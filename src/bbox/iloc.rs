use nom::{
    bytes::complete::take,
    combinator::{cond, fail, map},
    error::context,
    multi::count,
    number::complete::{be_u16, be_u32, be_u8},
    IResult,
};

use super::{FullBoxHeader, ParseBody};

/// Item location box: where each HEIF item's bytes live.
///
/// atom-path: meta/iloc
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IlocBox {
    pub items: Vec<ItemLocation>,
}

const MAX_ILOC_EXTENTS_PER_ITEM: u16 = 32;

#[derive(Debug, Clone, Copy)]
struct FieldSizes {
    offset: u8,
    length: u8,
    base_offset: u8,
    index: u8,
}

impl ParseBody<IlocBox> for IlocBox {
    /// Items are parsed one by one; a truncated or otherwise broken record
    /// ends the table but keeps the items read so far.
    fn parse_body(remain: &[u8], header: FullBoxHeader) -> IResult<&[u8], IlocBox> {
        let version = header.version;

        // four 4-bit field widths
        let (remain, (offset_size, length_size)) = map(be_u8, |x| (x >> 4, x & 0xF))(remain)?;
        let (remain, (base_offset_size, index_size)) = map(be_u8, |x| (x >> 4, x & 0xF))(remain)?;

        let mut iloc = IlocBox { items: Vec::new() };
        if version > 2 {
            tracing::debug!(version, "unsupported iloc version");
            return Ok((remain, iloc));
        }

        let (mut remain, item_count) = if version < 2 {
            map(be_u16, |x| x as u32)(remain)?
        } else {
            be_u32(remain)?
        };

        let sizes = FieldSizes {
            offset: offset_size,
            length: length_size,
            base_offset: base_offset_size,
            // reserved in version 0
            index: if version == 0 { 0 } else { index_size },
        };
        for _ in 0..item_count {
            match ItemLocation::parse(remain, version, sizes) {
                Ok((rem, item)) => {
                    iloc.items.push(item);
                    remain = rem;
                }
                Err(e) => {
                    tracing::debug!(?e, parsed = iloc.items.len(), "iloc item table ends early");
                    break;
                }
            }
        }

        Ok((remain, iloc))
    }
}

impl IlocBox {
    /// `(offset, length)` of item `id` when it is stored as one plain extent
    /// of the file: construction method 0, data reference 0, no base
    /// offset. Other layouts are not supported.
    pub fn file_extent(&self, id: u32) -> Option<(u64, u64)> {
        self.items
            .iter()
            .filter(|item| item.id == id)
            .find_map(|item| item.plain_file_extent())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemLocationExtent {
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemLocation {
    pub id: u32,
    /// 0: file offset, 1: idat offset, 2: item offset; absent in version 0
    pub construction_method: Option<u8>,
    pub data_ref_index: u16,
    pub base_offset: u64,
    pub extents: Vec<ItemLocationExtent>,
}

impl ItemLocation {
    fn parse(input: &[u8], version: u8, sizes: FieldSizes) -> IResult<&[u8], ItemLocation> {
        let (remain, id) = if version < 2 {
            map(be_u16, |x| x as u32)(input)?
        } else {
            be_u32(input)?
        };

        let (remain, construction_method) =
            cond(version >= 1, map(be_u16, |x| (x & 0xF) as u8))(remain)?;

        let (remain, data_ref_index) = be_u16(remain)?;

        let (remain, base_offset) = parse_sized_uint(
            sizes.base_offset,
            remain,
            "base_offset_size is larger than 8",
        )?;

        let (remain, extent_count) = be_u16(remain)?;
        if extent_count > MAX_ILOC_EXTENTS_PER_ITEM {
            context("extent_count > 32", fail::<_, (), _>)(remain)?;
        }

        let (remain, extents) = count(
            |remain| {
                // extent index, not needed
                let (remain, _) =
                    parse_sized_uint(sizes.index, remain, "index_size is larger than 8")?;
                let (remain, offset) =
                    parse_sized_uint(sizes.offset, remain, "offset_size is larger than 8")?;
                let (remain, length) =
                    parse_sized_uint(sizes.length, remain, "length_size is larger than 8")?;
                Ok((
                    remain,
                    ItemLocationExtent { offset, length },
                ))
            },
            extent_count as usize,
        )(remain)?;

        Ok((
            remain,
            ItemLocation {
                id,
                construction_method,
                data_ref_index,
                base_offset,
                extents,
            },
        ))
    }

    fn plain_file_extent(&self) -> Option<(u64, u64)> {
        if self.construction_method.unwrap_or(0) != 0
            || self.data_ref_index != 0
            || self.base_offset != 0
        {
            return None;
        }
        match self.extents.as_slice() {
            [extent] => Some((extent.offset, extent.length)),
            _ => None,
        }
    }
}

/// Big endian unsigned integer `size` bytes wide; a size of 0 reads nothing
/// and yields 0.
fn parse_sized_uint<'a>(size: u8, remain: &'a [u8], msg: &'static str) -> IResult<&'a [u8], u64> {
    if size > 8 {
        return context(msg, fail)(remain);
    }
    let (remain, bytes) = take(size as usize)(remain)?;
    let v = bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
    Ok((remain, v))
}
