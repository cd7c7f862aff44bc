use std::io::{Read, Seek};

use nom::bytes::complete::take;
use nom::number::complete::{be_u24, be_u32, u8};
use nom::sequence::tuple;

use crate::source::ByteSource;

use super::{read_payload, BoxHeader, BoxWalker};

/// Represents an [item list atom][1].
///
/// ilst is not a fullbox, it doesn't have version & flags. Each child box is
/// named by the big endian 1-based index of its key in the `keys` box.
///
/// atom-path: moov/meta/ilst
///
/// [1]: https://developer.apple.com/documentation/quicktime-file-format/metadata_item_list_atom
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IlstBox {
    pub items: Vec<IlstItem>,
}

/// Smallest item payload: the `data` box header, type and locale.
const MIN_ITEM_LEN: u64 = 16;

impl IlstBox {
    /// Reads the items of `ilst`. Walking stops at the first item whose
    /// index is 0 or exceeds `key_count`, or which is too small to hold a
    /// value.
    pub fn read<R: Read + Seek>(
        src: &mut ByteSource<R>,
        ilst: &BoxHeader,
        key_count: usize,
    ) -> crate::Result<IlstBox> {
        let mut items = Vec::new();
        if ilst.payload_len() < MIN_ITEM_LEN {
            return Ok(IlstBox { items });
        }

        let mut walker = BoxWalker::new(ilst.payload_start, ilst.end);
        while let Some(child) = walker.next_box(src)? {
            if child.payload_len() < MIN_ITEM_LEN {
                break;
            }
            let index = u32::from_be_bytes(child.kind.fourcc());
            if index == 0 || index as usize > key_count {
                tracing::debug!(index, key_count, "ilst item refers to no key");
                break;
            }
            let payload = read_payload(src, &child)?;
            let (_, item) = IlstItem::parse(index, &payload)?;
            items.push(item);
        }
        Ok(IlstBox { items })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IlstItem {
    index: u32, // 1-based index (start from 1)

    /// Type indicator, see [type
    /// indicator](https://developer.apple.com/documentation/quicktime-file-format/type_indicator)
    type_set: u8,
    type_code: u32, // 24-bits

    /// Everything after the locale, up to the end of the item.
    pub value: Vec<u8>,
}

impl IlstItem {
    /// Parses an item payload: a `data` box holding type, locale and value.
    /// The inner box's size and name are not checked.
    fn parse(index: u32, input: &[u8]) -> nom::IResult<&[u8], IlstItem> {
        // data box size and name, type indicator, then locale
        let (value, (_, _, type_set, type_code, _)) =
            tuple((be_u32, take(4usize), u8, be_u24, be_u32))(input)?;

        Ok((
            &value[value.len()..], // Safe-slice
            IlstItem {
                index,
                type_set,
                type_code,
                value: value.to_vec(),
            },
        ))
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// The value as text, if it is typed UTF-8 (well-known type 1).
    pub fn text(&self) -> Option<&str> {
        if self.type_set != 0 || self.type_code != 1 {
            return None;
        }
        std::str::from_utf8(&self.value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{bbox, ilst_item, ilst_typed_item};

    fn read(items: &[Vec<u8>], key_count: usize) -> IlstBox {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let data = bbox(b"ilst", &items.concat());
        let mut src = ByteSource::from_bytes(&data);
        let len = src.len();
        let header = BoxHeader::read(&mut src, 0, len).unwrap().unwrap();
        IlstBox::read(&mut src, &header, key_count).unwrap()
    }

    #[test]
    fn ilst_box() {
        let ilst = read(
            &[
                ilst_item(1, "Apple"),
                ilst_typed_item(2, 22, &[1]),
                ilst_item(3, "+27.1281+100.2508+000.000/"),
                ilst_item(4, "2019-02-12T15:27:12+08:00"),
            ],
            4,
        );
        let items = ilst
            .items
            .iter()
            .map(|x| (x.index(), x.text()))
            .collect::<Vec<_>>();
        assert_eq!(
            items,
            [
                (1, Some("Apple")),
                (2, None),
                (3, Some("+27.1281+100.2508+000.000/")),
                (4, Some("2019-02-12T15:27:12+08:00")),
            ]
        );
        assert_eq!(ilst.items[0].value, b"Apple");
    }

    #[test]
    fn stops_at_unknown_index() {
        let ilst = read(
            &[ilst_item(1, "Apple"), ilst_item(5, "x"), ilst_item(2, "y")],
            2,
        );
        assert_eq!(ilst.items.len(), 1);

        let ilst = read(&[ilst_item(0, "Apple"), ilst_item(1, "y")], 2);
        assert!(ilst.items.is_empty());
    }

    #[test]
    fn invalid_utf8() {
        let ilst = read(&[ilst_typed_item(1, 1, b"\xff\xfe")], 1);
        assert_eq!(ilst.items.len(), 1);
        assert_eq!(ilst.items[0].text(), None);
    }
}
