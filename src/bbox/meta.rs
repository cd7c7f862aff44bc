use std::io::{Read, Seek};

use crate::source::ByteSource;

use super::{
    find_box, read_full_box, BoxHeader, BoxKind, FullBoxHeader, IinfBox, IlocBox, IlstBox,
    KeysBox,
};

/// The item tables of a HEIF `meta` box, which is a full box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeifMeta {
    iinf: Option<IinfBox>,
    iloc: Option<IlocBox>,
}

/// Byte range of an Exif item, as recorded in `iloc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExifLocation {
    pub item_id: u32,
    pub offset: u64,
    pub length: u64,
}

impl HeifMeta {
    #[tracing::instrument(skip_all)]
    pub fn read<R: Read + Seek>(
        src: &mut ByteSource<R>,
        meta: &BoxHeader,
    ) -> crate::Result<HeifMeta> {
        let start = meta.payload_start + FullBoxHeader::SIZE;

        let iinf = match find_box(src, BoxKind::Iinf, start, meta.end)? {
            Some(header) => IinfBox::read(src, &header)?,
            None => None,
        };
        let iloc = match find_box(src, BoxKind::Iloc, start, meta.end)? {
            Some(header) if header.payload_len() >= 4 => {
                match read_full_box::<_, IlocBox, _>(src, &header) {
                    Ok(iloc) => Some(iloc),
                    Err(e) => {
                        tracing::debug!(error = %e, "ignore iloc");
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(HeifMeta { iinf, iloc })
    }

    /// Where the item typed `Exif` is stored, if it is a single plain extent
    /// of the file.
    pub fn exif_location(&self) -> Option<ExifLocation> {
        let item_id = self.iinf.as_ref()?.exif_item_id()?;
        let (offset, length) = self.iloc.as_ref()?.file_extent(item_id)?;
        Some(ExifLocation {
            item_id,
            offset,
            length,
        })
    }
}

/// QuickTime metadata: the `keys` and `ilst` boxes inside `moov/meta`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct AppleMeta {
    keys: Option<KeysBox>,
    ilst: Option<IlstBox>,
}

impl AppleMeta {
    /// QuickTime's `meta` is a plain box while MP4's is a full box, so the
    /// children are looked for right at the payload start first, then past
    /// version and flags.
    #[tracing::instrument(skip_all)]
    pub fn read<R: Read + Seek>(
        src: &mut ByteSource<R>,
        meta: &BoxHeader,
    ) -> crate::Result<AppleMeta> {
        let found = AppleMeta::read_from(src, meta.payload_start, meta.end)?;
        if (found.keys.is_some() || found.ilst.is_some())
            || meta.payload_len() < FullBoxHeader::SIZE
        {
            return Ok(found);
        }
        AppleMeta::read_from(src, meta.payload_start + FullBoxHeader::SIZE, meta.end)
    }

    fn read_from<R: Read + Seek>(
        src: &mut ByteSource<R>,
        start: u64,
        end: u64,
    ) -> crate::Result<AppleMeta> {
        let keys = match find_box(src, BoxKind::Keys, start, end)? {
            Some(header) if header.payload_len() >= 8 => {
                match read_full_box::<_, KeysBox, _>(src, &header) {
                    Ok(keys) => Some(keys),
                    Err(e) => {
                        tracing::debug!(error = %e, "ignore keys");
                        None
                    }
                }
            }
            _ => None,
        };

        let key_count = keys.as_ref().map_or(0, |k| k.entries.len());
        let ilst = match find_box(src, BoxKind::Ilst, start, end)? {
            Some(header) => Some(IlstBox::read(src, &header, key_count)?),
            None => None,
        };

        Ok(AppleMeta { keys, ilst })
    }

    /// Text values of every item stored under `key`, in file order.
    pub fn texts<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let keys = self.keys.as_ref();
        self.ilst
            .iter()
            .flat_map(|ilst| ilst.items.iter())
            .filter(move |item| {
                keys.and_then(|k| k.get(item.index()))
                    .is_some_and(|entry| entry.key == key)
            })
            .filter_map(|item| item.text())
    }
}
