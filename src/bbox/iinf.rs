use std::io::{Read, Seek};

use nom::{
    bytes::complete::take,
    combinator::{fail, map},
    error::context,
    number::complete::{be_u16, be_u32},
    IResult,
};

use crate::source::ByteSource;

use super::{read_full_box, BoxHeader, BoxKind, BoxWalker, FullBoxHeader, ParseBody};

/// Item information box, the list of items of a HEIF file.
///
/// atom-path: meta/iinf
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IinfBox {
    pub entries: Vec<InfeBox>,
}

impl IinfBox {
    /// Reads the `infe` children following the item count.
    ///
    /// The walk stops at the first child which is not an `infe` of version
    /// 2 or 3; the declared item count is informational only.
    pub fn read<R: Read + Seek>(
        src: &mut ByteSource<R>,
        iinf: &BoxHeader,
    ) -> crate::Result<Option<IinfBox>> {
        if iinf.payload_len() < 8 {
            return Ok(None);
        }
        let head = src.read_bytes(iinf.payload_start, 8)?;
        let (remain, item_count) = IinfBox::parse_head(&head)?;
        tracing::debug!(item_count, "Got iinf");
        let entries_start = iinf.payload_start + (head.len() - remain.len()) as u64;

        let mut entries = Vec::new();
        let mut walker = BoxWalker::new(entries_start, iinf.end);
        while let Some(child) = walker.next_box(src)? {
            if child.kind != BoxKind::Infe {
                break;
            }
            match read_full_box::<_, InfeBox, _>(src, &child) {
                Ok(infe) => entries.push(infe),
                Err(e) => {
                    tracing::debug!(error = %e, "stop reading item infos");
                    break;
                }
            }
        }

        Ok(Some(IinfBox { entries }))
    }

    /// Version, flags and the item count, whose width depends on the version.
    fn parse_head(input: &[u8]) -> IResult<&[u8], u32> {
        let (remain, header) = FullBoxHeader::parse(input)?;
        let (remain, item_count) = if header.version > 0 {
            be_u32(remain)?
        } else {
            map(be_u16, |x| x as u32)(remain)?
        };
        Ok((remain, item_count))
    }

    /// ID of the item typed `Exif`; the last such entry wins.
    pub fn exif_item_id(&self) -> Option<u32> {
        self.entries
            .iter()
            .filter(|e| &e.item_type == b"Exif")
            .map(|e| e.id)
            .last()
    }
}

/// Info entry box. Only versions 2 and 3 carry an item type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InfeBox {
    pub id: u32,
    pub item_type: [u8; 4],
}

impl ParseBody<InfeBox> for InfeBox {
    fn parse_body(remain: &[u8], header: FullBoxHeader) -> IResult<&[u8], InfeBox> {
        let version = header.version;
        if !(2..=3).contains(&version) {
            context("infe version is not 2 or 3", fail::<_, (), _>)(remain)?;
        }

        let (remain, id) = if version > 2 {
            be_u32(remain)?
        } else {
            map(be_u16, |x| x as u32)(remain)?
        };
        // item protection index
        let (remain, _) = be_u16(remain)?;
        let (remain, code) = take(4usize)(remain)?;

        let mut item_type = [0u8; 4];
        item_type.copy_from_slice(code);
        tracing::debug!(id, version, item_type = %BoxKind::from(item_type), "Got infe");

        // item name and content type follow; nothing here needs them
        Ok((
            &remain[remain.len()..], // Safe-slice
            InfeBox { id, item_type },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::ParseBox;
    use crate::testkit::{bbox, full_box, iinf, infe};
    use test_case::test_case;

    fn read(data: &[u8]) -> Option<IinfBox> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut src = ByteSource::from_bytes(data);
        let len = src.len();
        let header = BoxHeader::read(&mut src, 0, len).unwrap().unwrap();
        IinfBox::read(&mut src, &header).unwrap()
    }

    #[test_case(0)]
    #[test_case(1)]
    fn exif_item(version: u8) {
        let data = iinf(
            version,
            &[infe(2, 1, b"hvc1"), infe(2, 7, b"Exif"), infe(2, 8, b"mime")],
        );
        let iinf = read(&data).unwrap();
        assert_eq!(iinf.entries.len(), 3);
        assert_eq!(iinf.exif_item_id(), Some(7));
    }

    #[test]
    fn last_exif_wins() {
        let data = iinf(0, &[infe(2, 3, b"Exif"), infe(3, 0x10001, b"Exif")]);
        assert_eq!(read(&data).unwrap().exif_item_id(), Some(0x10001));
    }

    #[test]
    fn stops_at_foreign_entry() {
        let data = iinf(
            0,
            &[
                infe(2, 1, b"hvc1"),
                infe(1, 2, b"Exif"),
                infe(2, 3, b"Exif"),
            ],
        );
        let iinf = read(&data).unwrap();
        assert_eq!(iinf.entries.len(), 1);
        assert_eq!(iinf.exif_item_id(), None);

        let data = iinf_with_free();
        assert_eq!(read(&data).unwrap().exif_item_id(), None);
    }

    fn iinf_with_free() -> Vec<u8> {
        let mut payload = 2u16.to_be_bytes().to_vec();
        payload.extend(bbox(b"free", b""));
        payload.extend(infe(2, 1, b"Exif"));
        full_box(b"iinf", 0, 0, &payload)
    }

    #[test]
    fn too_short() {
        assert_eq!(read(&full_box(b"iinf", 0, 0, &[0, 0])), None);

        // infe without room for the item type
        let short = full_box(b"infe", 2, 0, &[0, 1, 0, 0]);
        assert!(InfeBox::parse_box(&short[8..]).is_err());
    }
}
