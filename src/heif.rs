use std::io::{Read, Seek};

use crate::bbox::{find_box, BoxKind, ExifLocation, HeifMeta};
use crate::exif::{decode_tiff, ExifSummary};
use crate::source::ByteSource;

/// An Exif item starts with a 4-byte TIFF header offset, then `"Exif\0\0"`.
const EXIF_ITEM_TIFF_START: u64 = 10;

/// Finds the Exif item of a HEIF/HEIC file and decodes it.
///
/// The top level `meta` box is searched in `[start, end)`; its `iinf` names
/// the item typed `Exif` and its `iloc` tells where that item is stored.
/// Returns `Ok(None)` when there is no such item, when it is not stored as a
/// single plain extent, or when the bytes found there don't look like Exif,
/// so the caller can go on with other metadata sources.
#[tracing::instrument(skip(src))]
pub(crate) fn decode_heif_exif<R: Read + Seek>(
    src: &mut ByteSource<R>,
    start: u64,
    end: u64,
) -> crate::Result<Option<ExifSummary>> {
    let Some(meta) = find_box(src, BoxKind::Meta, start, end)? else {
        return Ok(None);
    };
    let Some(location) = HeifMeta::read(src, &meta)?.exif_location() else {
        tracing::debug!("no Exif item in meta");
        return Ok(None);
    };
    let ExifLocation {
        item_id,
        offset,
        length,
    } = location;
    tracing::debug!(item_id, offset, length, "Got Exif item");

    let Some(item_end) = offset.checked_add(length).filter(|x| *x <= src.len()) else {
        tracing::warn!(offset, length, "Exif item lies outside the file");
        return Ok(None);
    };
    if !src.contains(offset + 4, 4) || &src.read_array::<4>(offset + 4)? != b"Exif" {
        tracing::warn!(offset, "Exif item lacks the Exif tag");
        return Ok(None);
    }

    decode_tiff(src, offset + EXIF_ITEM_TIFF_START, item_end).map(Some)
}
