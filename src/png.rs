use std::io::{Read, Seek};

use nom::{bytes::complete::take, number::complete::be_u32, sequence::tuple, IResult};

use crate::bbox::MAX_BODY_LEN;
use crate::exif::decode_tiff;
use crate::parser::ExtractionResult;
use crate::source::{decode_string, ByteSource, Encoding};
use crate::values::{parse_iso8601_time, CaptureTime};
use crate::Error;

pub(crate) const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Length, type and CRC around the chunk data.
const CHUNK_OVERHEAD: u64 = 12;

/// `tEXt` keywords holding dates.
const DATE_KEYWORDS: [&str; 2] = ["date:create", "date:modify"];

pub(crate) fn check_png(input: &[u8]) -> bool {
    input.starts_with(PNG_SIGNATURE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    kind: [u8; 4],
    /// Position of the length field.
    start: u64,
    data_len: u32,
}

impl Chunk {
    fn parse_header(input: &[u8], start: u64) -> IResult<&[u8], Chunk> {
        let (remain, (data_len, code)) = tuple((be_u32, take(4usize)))(input)?;
        let mut kind = [0u8; 4];
        kind.copy_from_slice(code);
        Ok((
            remain,
            Chunk {
                kind,
                start,
                data_len,
            },
        ))
    }

    fn data_start(&self) -> u64 {
        self.start + 8
    }

    fn data_end(&self) -> u64 {
        self.data_start() + self.data_len as u64
    }

    fn end(&self) -> u64 {
        self.start + CHUNK_OVERHEAD + self.data_len as u64
    }
}

/// Decodes a PNG stream: the first `eXIf` chunk wins outright, otherwise the
/// earliest `date:create`/`date:modify` of the `tEXt` chunks is used.
///
/// Chunks are walked until one doesn't fit; CRCs are not verified.
#[tracing::instrument(skip_all)]
pub(crate) fn decode_png<R: Read + Seek>(
    src: &mut ByteSource<R>,
) -> crate::Result<ExtractionResult> {
    let end = src.len();
    let mut pos = PNG_SIGNATURE.len() as u64;
    let mut date = None;

    while pos + CHUNK_OVERHEAD <= end {
        let head = src.read_array::<8>(pos)?;
        let (_, chunk) = Chunk::parse_header(&head, pos)?;
        if chunk.end() > end {
            tracing::debug!(?chunk, "chunk overruns the file");
            break;
        }
        pos = chunk.end();

        match &chunk.kind {
            b"eXIf" => {
                let summary = decode_tiff(src, chunk.data_start(), chunk.data_end())?;
                return Ok(summary.into());
            }
            b"tEXt" => {
                if let Some(t) = text_chunk_date(src, &chunk)? {
                    CaptureTime::keep_earliest(&mut date, t);
                }
            }
            _ => (),
        }
    }

    match date {
        Some(date) => Ok(ExtractionResult::dated(date, None)),
        None => Err(Error::MissingDate("no eXIf or date found in PNG")),
    }
}

/// `keyword\0text`, both Latin-1.
fn text_chunk_date<R: Read + Seek>(
    src: &mut ByteSource<R>,
    chunk: &Chunk,
) -> crate::Result<Option<CaptureTime>> {
    if chunk.data_len as u64 > MAX_BODY_LEN {
        return Ok(None);
    }
    let data = src.read_bytes(chunk.data_start(), chunk.data_len as usize)?;
    let Some(null) = data.iter().position(|b| *b == 0) else {
        return Ok(None);
    };
    let (keyword, text) = (&data[..null], &data[null + 1..]); // Safe-slice

    let keyword = decode_string(keyword.to_vec(), Encoding::Latin1)?;
    if !DATE_KEYWORDS.contains(&keyword.as_str()) {
        return Ok(None);
    }
    let text = decode_string(text.to_vec(), Encoding::Latin1)?;
    let date = parse_iso8601_time(&text);
    tracing::debug!(%keyword, %text, ?date, "Got tEXt date");
    Ok(date)
}
