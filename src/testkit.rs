//! Builders for small synthetic media files. There is no binary sample
//! corpus; every test assembles exactly the structures it needs.

use nom::number::Endianness;

fn put_u16(buf: &mut Vec<u8>, v: u16, endian: Endianness) {
    match endian {
        Endianness::Little => buf.extend_from_slice(&v.to_le_bytes()),
        _ => buf.extend_from_slice(&v.to_be_bytes()),
    }
}

fn put_u32(buf: &mut Vec<u8>, v: u32, endian: Endianness) {
    match endian {
        Endianness::Little => buf.extend_from_slice(&v.to_le_bytes()),
        _ => buf.extend_from_slice(&v.to_be_bytes()),
    }
}

/// Big endian integer of `width` bytes.
pub(crate) fn be_uint(v: u64, width: usize) -> Vec<u8> {
    v.to_be_bytes()[8 - width..].to_vec()
}

// ---------------------------------------------------------------- TIFF/Exif

#[derive(Debug, Clone)]
pub(crate) enum TiffValue {
    /// NUL terminated by the builder.
    Ascii(&'static str),
    U32(u32),
    Rationals(Vec<(u32, u32)>),
}

pub(crate) fn rationals(v: &[(u32, u32)]) -> TiffValue {
    TiffValue::Rationals(v.to_vec())
}

impl TiffValue {
    fn format(&self) -> u16 {
        match self {
            TiffValue::Ascii(_) => 2,
            TiffValue::U32(_) => 4,
            TiffValue::Rationals(_) => 5,
        }
    }

    fn count(&self) -> u32 {
        match self {
            TiffValue::Ascii(s) => s.len() as u32 + 1,
            TiffValue::U32(_) => 1,
            TiffValue::Rationals(v) => v.len() as u32,
        }
    }

    fn bytes(&self, endian: Endianness) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            TiffValue::Ascii(s) => {
                buf.extend_from_slice(s.as_bytes());
                buf.push(0);
            }
            TiffValue::U32(v) => put_u32(&mut buf, *v, endian),
            TiffValue::Rationals(v) => {
                for (n, d) in v {
                    put_u32(&mut buf, *n, endian);
                    put_u32(&mut buf, *d, endian);
                }
            }
        }
        buf
    }
}

type Entries = Vec<(u16, TiffValue)>;

/// Lays out a TIFF block: header, IFD0, Exif sub-IFD, GPS IFD, each IFD
/// directly followed by its out-of-line values. Sub-IFD pointers are added
/// to IFD0 when the sub-IFD has entries.
#[derive(Debug, Clone)]
pub(crate) struct TiffBuilder {
    endian: Endianness,
    ifd0: Entries,
    exif: Entries,
    gps: Entries,
}

impl TiffBuilder {
    pub fn new(endian: Endianness) -> Self {
        Self {
            endian,
            ifd0: Vec::new(),
            exif: Vec::new(),
            gps: Vec::new(),
        }
    }

    pub fn ifd0(mut self, tag: u16, value: TiffValue) -> Self {
        self.ifd0.push((tag, value));
        self
    }

    pub fn exif(mut self, tag: u16, value: TiffValue) -> Self {
        self.exif.push((tag, value));
        self
    }

    pub fn gps(mut self, tag: u16, value: TiffValue) -> Self {
        self.gps.push((tag, value));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut ifd0 = self.ifd0.clone();
        if !self.exif.is_empty() {
            ifd0.push((0x8769, TiffValue::U32(0)));
        }
        if !self.gps.is_empty() {
            ifd0.push((0x8825, TiffValue::U32(0)));
        }

        let ifd0_offset = 8u32;
        let exif_offset = ifd0_offset + ifd_len(&ifd0, self.endian);
        let gps_offset = exif_offset + ifd_len(&self.exif, self.endian);
        for (tag, value) in ifd0.iter_mut() {
            match tag {
                0x8769 => *value = TiffValue::U32(exif_offset),
                0x8825 => *value = TiffValue::U32(gps_offset),
                _ => (),
            }
        }

        let mut buf = match self.endian {
            Endianness::Little => b"II\x2a\x00".to_vec(),
            _ => b"MM\x00\x2a".to_vec(),
        };
        put_u32(&mut buf, ifd0_offset, self.endian);
        write_ifd(&mut buf, &ifd0, self.endian);
        if !self.exif.is_empty() {
            write_ifd(&mut buf, &self.exif, self.endian);
        }
        if !self.gps.is_empty() {
            write_ifd(&mut buf, &self.gps, self.endian);
        }
        buf
    }
}

fn ifd_len(entries: &Entries, endian: Endianness) -> u32 {
    if entries.is_empty() {
        return 0;
    }
    let table = 2 + entries.len() * 12 + 4;
    let data: usize = entries
        .iter()
        .map(|(_, v)| v.bytes(endian).len())
        .filter(|len| *len > 4)
        .sum();
    (table + data) as u32
}

/// Appends one IFD at the current end of `buf`, which is also its offset
/// from the TIFF header.
fn write_ifd(buf: &mut Vec<u8>, entries: &Entries, endian: Endianness) {
    let base = buf.len();
    let mut data_pos = base + 2 + entries.len() * 12 + 4;
    let mut data = Vec::new();

    put_u16(buf, entries.len() as u16, endian);
    for (tag, value) in entries {
        put_u16(buf, *tag, endian);
        put_u16(buf, value.format(), endian);
        put_u32(buf, value.count(), endian);
        let bytes = value.bytes(endian);
        if bytes.len() <= 4 {
            let mut raw = bytes.clone();
            raw.resize(4, 0);
            buf.extend_from_slice(&raw);
        } else {
            put_u32(buf, data_pos as u32, endian);
            data_pos += bytes.len();
            data.extend_from_slice(&bytes);
        }
    }
    put_u32(buf, 0, endian);
    buf.extend_from_slice(&data);
}

// --------------------------------------------------------------------- JPEG

pub(crate) fn jpeg_segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0xFF, marker];
    buf.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// SOI, an Exif APP1 segment wrapping `tiff`, a short SOS segment and EOI.
pub(crate) fn jpeg_with_exif(tiff: &[u8]) -> Vec<u8> {
    let mut app1 = b"Exif\0\0".to_vec();
    app1.extend_from_slice(tiff);

    let mut buf = vec![0xFF, 0xD8];
    buf.extend(jpeg_segment(0xE1, &app1));
    buf.extend(jpeg_segment(0xDA, &[0; 10]));
    buf.extend_from_slice(&[0xFF, 0xD9]);
    buf
}

// ------------------------------------------------------------------ ISOBMFF

pub(crate) fn bbox(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut buf = (payload.len() as u32 + 8).to_be_bytes().to_vec();
    buf.extend_from_slice(kind);
    buf.extend_from_slice(payload);
    buf
}

/// A box using the 64-bit `largesize` form (size field == 1).
pub(crate) fn large_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut buf = 1u32.to_be_bytes().to_vec();
    buf.extend_from_slice(kind);
    buf.extend_from_slice(&(payload.len() as u64 + 16).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

pub(crate) fn full_box(kind: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![version];
    body.extend_from_slice(&flags.to_be_bytes()[1..]);
    body.extend_from_slice(payload);
    bbox(kind, &body)
}

pub(crate) fn ftyp(major_brand: &[u8; 4]) -> Vec<u8> {
    let mut payload = major_brand.to_vec();
    payload.extend_from_slice(&[0, 0, 0, 0]);
    payload.extend_from_slice(b"isom");
    payload.extend_from_slice(major_brand);
    bbox(b"ftyp", &payload)
}

/// `moov/mvhd` with the given creation time (seconds since 1904).
pub(crate) fn mvhd(version: u8, creation_time: u64) -> Vec<u8> {
    let mut payload = Vec::new();
    if version != 0 {
        payload.extend_from_slice(&creation_time.to_be_bytes());
        payload.extend_from_slice(&creation_time.to_be_bytes());
        payload.extend_from_slice(&600u32.to_be_bytes());
        payload.extend_from_slice(&6000u64.to_be_bytes());
    } else {
        payload.extend_from_slice(&(creation_time as u32).to_be_bytes());
        payload.extend_from_slice(&(creation_time as u32).to_be_bytes());
        payload.extend_from_slice(&600u32.to_be_bytes());
        payload.extend_from_slice(&6000u32.to_be_bytes());
    }
    // rate, volume, reserved, matrix, pre-defined, next track id
    payload.extend_from_slice(&[0; 80]);
    full_box(b"mvhd", version, 0, &payload)
}

/// `keys` box of `mdta` keys, indexed from 1 in order.
pub(crate) fn keys(names: &[&str]) -> Vec<u8> {
    let mut payload = (names.len() as u32).to_be_bytes().to_vec();
    for name in names {
        payload.extend_from_slice(&(name.len() as u32 + 8).to_be_bytes());
        payload.extend_from_slice(b"mdta");
        payload.extend_from_slice(name.as_bytes());
    }
    full_box(b"keys", 0, 0, &payload)
}

/// One `ilst` child: a box named by the 1-based key index holding a `data`
/// box of type 1 (UTF-8).
pub(crate) fn ilst_item(index: u32, value: &str) -> Vec<u8> {
    ilst_typed_item(index, 1, value.as_bytes())
}

pub(crate) fn ilst_typed_item(index: u32, data_type: u32, value: &[u8]) -> Vec<u8> {
    let mut data = data_type.to_be_bytes().to_vec();
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(value);
    bbox(&index.to_be_bytes(), &bbox(b"data", &data))
}

/// `moov/meta` in the QuickTime flavour: a plain box holding hdlr, keys and
/// ilst.
pub(crate) fn apple_meta(keys_box: &[u8], ilst_items: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = full_box(b"hdlr", 0, 0, b"\0\0\0\0mdta\0\0\0\0\0\0\0\0\0\0\0\0\0");
    payload.extend_from_slice(keys_box);
    payload.extend(bbox(b"ilst", &ilst_items.concat()));
    bbox(b"meta", &payload)
}

/// `udta/©xyz` with an ISO 6709 string.
pub(crate) fn xyz(iso6709: &str) -> Vec<u8> {
    let mut payload = (iso6709.len() as u16).to_be_bytes().to_vec();
    payload.extend_from_slice(&0x15c7u16.to_be_bytes());
    payload.extend_from_slice(iso6709.as_bytes());
    bbox(b"\xA9xyz", &payload)
}

pub(crate) fn infe(version: u8, item_id: u32, item_type: &[u8; 4]) -> Vec<u8> {
    let mut payload = if version >= 3 {
        item_id.to_be_bytes().to_vec()
    } else {
        (item_id as u16).to_be_bytes().to_vec()
    };
    payload.extend_from_slice(&0u16.to_be_bytes());
    payload.extend_from_slice(item_type);
    payload.push(0);
    full_box(b"infe", version, 0, &payload)
}

pub(crate) fn iinf(version: u8, entries: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = if version == 0 {
        (entries.len() as u16).to_be_bytes().to_vec()
    } else {
        (entries.len() as u32).to_be_bytes().to_vec()
    };
    payload.extend_from_slice(&entries.concat());
    full_box(b"iinf", version, 0, &payload)
}

#[derive(Debug, Clone)]
pub(crate) struct IlocItem {
    pub id: u32,
    pub construction_method: u8,
    pub data_ref_index: u16,
    pub base_offset: u64,
    pub extents: Vec<(u64, u64)>,
}

impl IlocItem {
    pub fn file_extent(id: u32, offset: u64, length: u64) -> Self {
        Self {
            id,
            construction_method: 0,
            data_ref_index: 0,
            base_offset: 0,
            extents: vec![(offset, length)],
        }
    }
}

/// Field widths in bytes: offset, length, base offset, index.
pub(crate) type IlocSizes = (u8, u8, u8, u8);

pub(crate) fn iloc(version: u8, sizes: IlocSizes, items: &[IlocItem]) -> Vec<u8> {
    let (offset_size, length_size, base_offset_size, index_size) = sizes;
    let index_size = if version == 0 { 0 } else { index_size };

    let mut payload = vec![
        (offset_size << 4) | length_size,
        (base_offset_size << 4) | index_size,
    ];
    let id_width = if version < 2 { 2 } else { 4 };
    payload.extend(be_uint(items.len() as u64, id_width));
    for item in items {
        payload.extend(be_uint(item.id as u64, id_width));
        if version >= 1 {
            payload.extend(be_uint(item.construction_method as u64, 2));
        }
        payload.extend(be_uint(item.data_ref_index as u64, 2));
        payload.extend(be_uint(item.base_offset, base_offset_size as usize));
        payload.extend(be_uint(item.extents.len() as u64, 2));
        for (i, (offset, length)) in item.extents.iter().enumerate() {
            payload.extend(be_uint(i as u64 + 1, index_size as usize));
            payload.extend(be_uint(*offset, offset_size as usize));
            payload.extend(be_uint(*length, length_size as usize));
        }
    }
    full_box(b"iloc", version, 0, &payload)
}

/// A HEIF file whose `meta` describes one Exif item stored in `mdat`.
///
/// Layout: `ftyp`, `meta` (hdlr, iinf, iloc), `mdat` holding a 4-byte TIFF
/// header offset, `"Exif\0\0"` and the TIFF block.
pub(crate) fn heic_with_exif(tiff: &[u8], iloc_version: u8, sizes: IlocSizes) -> Vec<u8> {
    let mut exif_item = 6u32.to_be_bytes().to_vec();
    exif_item.extend_from_slice(b"Exif\0\0");
    exif_item.extend_from_slice(tiff);

    let ftyp_box = ftyp(b"heic");
    let build_meta = |offset: u64| {
        let mut payload = full_box(b"hdlr", 0, 0, b"\0\0\0\0pict\0\0\0\0\0\0\0\0\0\0\0\0\0");
        payload.extend(iinf(
            0,
            &[infe(2, 1, b"hvc1"), infe(2, 2, b"Exif"), infe(2, 3, b"mime")],
        ));
        payload.extend(iloc(
            iloc_version,
            sizes,
            &[
                IlocItem::file_extent(1, 0, 0),
                IlocItem::file_extent(2, offset, exif_item.len() as u64),
            ],
        ));
        full_box(b"meta", 0, 0, &payload)
    };

    // the meta size doesn't depend on the offset value, only on its width
    let meta_len = build_meta(0).len() as u64;
    let offset = ftyp_box.len() as u64 + meta_len + 8;

    let mut buf = ftyp_box;
    buf.extend(build_meta(offset));
    buf.extend(bbox(b"mdat", &exif_item));
    buf
}

// ---------------------------------------------------------------------- PNG

pub(crate) const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// A chunk with a zero CRC; CRCs are not checked by the decoder.
pub(crate) fn png_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut buf = (data.len() as u32).to_be_bytes().to_vec();
    buf.extend_from_slice(kind);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&[0; 4]);
    buf
}

pub(crate) fn png(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = PNG_SIGNATURE.to_vec();
    buf.extend(png_chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0]));
    for chunk in chunks {
        buf.extend_from_slice(chunk);
    }
    buf.extend(png_chunk(b"IEND", b""));
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiff_layout() {
        let tiff = TiffBuilder::new(Endianness::Big)
            .ifd0(0x0132, TiffValue::Ascii("2020:05:01 12:00:00"))
            .exif(0x9003, TiffValue::Ascii("2020:05:01 10:00:00"))
            .build();
        // header + IFD0 (2 entries + 20 bytes value) + Exif IFD (1 entry + 20)
        assert_eq!(tiff.len(), 8 + (2 + 24 + 4 + 20) + (2 + 12 + 4 + 20));
        // the ExifOffset pointer targets the Exif IFD
        assert_eq!(&tiff[8 + 2 + 12..8 + 2 + 12 + 2], &[0x87, 0x69]);
        assert_eq!(&tiff[8 + 2 + 12 + 8..8 + 2 + 24], &58u32.to_be_bytes());
    }

    #[test]
    fn heic_exif_offset() {
        let tiff = TiffBuilder::new(Endianness::Big).build();
        let heic = heic_with_exif(&tiff, 1, (4, 4, 0, 0));
        let mdat = heic.len() - tiff.len() - 10 - 8;
        assert_eq!(&heic[mdat + 4..mdat + 8], b"mdat");
        assert_eq!(&heic[mdat + 12..mdat + 16], b"Exif");
    }
}
