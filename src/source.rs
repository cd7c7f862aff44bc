use std::io::{Cursor, Read, Seek, SeekFrom};

use nom::number::{complete, Endianness};

use crate::Error;

/// Character encodings understood by [`ByteSource::read_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// 7-bit ASCII, any byte >= 0x80 is rejected.
    Ascii,
    /// ISO-8859-1, every byte maps to the code point of the same value.
    Latin1,
    Utf8,
}

/// A bounds-checked random-access view over a seekable reader of fixed
/// length.
///
/// Every read names an absolute `offset` and a length. Reads reaching past the
/// end of the source fail with [`Error::OutOfRange`] instead of silently
/// returning fewer bytes, so decoders either check bounds up front or
/// propagate the failure.
///
/// Only the requested ranges are ever loaded, which keeps multi-gigabyte
/// videos cheap: the metadata boxes are found by seeking over `mdat`.
#[derive(Debug)]
pub struct ByteSource<R> {
    reader: R,
    len: u64,
}

impl<'a> ByteSource<Cursor<&'a [u8]>> {
    /// Create a source over an in-memory buffer.
    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self {
            len: data.len() as u64,
            reader: Cursor::new(data),
        }
    }
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wrap `reader`; its total length is determined by seeking to the end.
    pub fn new(mut reader: R) -> crate::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        Ok(Self { reader, len })
    }

    /// Total length of the source in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `[offset, offset + len)` lies entirely within the source.
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        offset.checked_add(len).is_some_and(|end| end <= self.len)
    }

    fn check_range(&self, offset: u64, len: u64) -> crate::Result<()> {
        if self.contains(offset, len) {
            Ok(())
        } else {
            Err(Error::OutOfRange {
                offset,
                len,
                source_len: self.len,
            })
        }
    }

    /// Read exactly `len` bytes starting at `offset`.
    pub fn read_bytes(&mut self, offset: u64, len: usize) -> crate::Result<Vec<u8>> {
        self.check_range(offset, len as u64)?;
        let mut buf = vec![0u8; len];
        if len > 0 {
            self.reader.seek(SeekFrom::Start(offset))?;
            self.reader.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    /// Read a fixed number of bytes, e.g. a four character code.
    pub fn read_array<const N: usize>(&mut self, offset: u64) -> crate::Result<[u8; N]> {
        self.check_range(offset, N as u64)?;
        let mut buf = [0u8; N];
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read an unsigned integer `width` bytes wide (0..=8). A width of 0
    /// yields 0 without touching the source, which is how optional fields
    /// with a zero size nibble (e.g. in `iloc`) are encoded.
    pub fn read_uint(
        &mut self,
        offset: u64,
        width: usize,
        endian: Endianness,
    ) -> crate::Result<u64> {
        if width > 8 {
            return Err(Error::ParseFailed(format!(
                "integer width {width} is larger than 8 bytes"
            )));
        }
        let data = self.read_bytes(offset, width)?;
        decode_uint(&data, endian)
    }

    /// Read a two's complement signed integer `width` bytes wide (1..=8).
    pub fn read_int(
        &mut self,
        offset: u64,
        width: usize,
        endian: Endianness,
    ) -> crate::Result<i64> {
        let v = self.read_uint(offset, width, endian)?;
        if width == 0 || width >= 8 {
            return Ok(v as i64);
        }
        let shift = 64 - width as u32 * 8;
        Ok(((v << shift) as i64) >> shift)
    }

    /// Read `len` bytes at `offset` and decode them with `encoding`.
    pub fn read_string(
        &mut self,
        offset: u64,
        len: usize,
        encoding: Encoding,
    ) -> crate::Result<String> {
        let data = self.read_bytes(offset, len)?;
        decode_string(data, encoding)
    }
}

pub(crate) fn decode_string(data: Vec<u8>, encoding: Encoding) -> crate::Result<String> {
    match encoding {
        Encoding::Ascii => {
            if !data.is_ascii() {
                return Err(Error::InvalidText(format!(
                    "non-ASCII bytes in {}",
                    crate::error::escape_bytes(&data)
                )));
            }
            Ok(String::from_utf8(data)?)
        }
        Encoding::Latin1 => Ok(data.iter().map(|b| *b as char).collect()),
        Encoding::Utf8 => Ok(String::from_utf8(data)?),
    }
}

fn decode_uint(data: &[u8], endian: Endianness) -> crate::Result<u64> {
    type E<'a> = nom::error::Error<&'a [u8]>;

    let v = match data.len() {
        0 => 0,
        1 => complete::u8::<_, E>(data)?.1 as u64,
        2 => complete::u16::<_, E>(endian)(data)?.1 as u64,
        3 => complete::u24::<_, E>(endian)(data)?.1 as u64,
        4 => complete::u32::<_, E>(endian)(data)?.1 as u64,
        8 => complete::u64::<_, E>(endian)(data)?.1,
        _ => {
            let big = match endian {
                Endianness::Big => true,
                Endianness::Little => false,
                Endianness::Native => cfg!(target_endian = "big"),
            };
            let fold = |acc: u64, b: &u8| (acc << 8) | *b as u64;
            if big {
                data.iter().fold(0, fold)
            } else {
                data.iter().rev().fold(0, fold)
            }
        }
    };
    Ok(v)
}
