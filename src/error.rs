use std::{io, string::FromUtf8Error};
use thiserror::Error;

/// Every failure the decoders can report.
///
/// The `Display` text of a variant is exactly the diagnostic string that ends
/// up in [`ExtractionResult::diagnostic`](crate::ExtractionResult), so callers
/// which only care about "why was there no date" can simply print it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("read of {len} bytes at offset {offset} is out of range (source length {source_len})")]
    OutOfRange {
        offset: u64,
        len: u64,
        source_len: u64,
    },

    #[error("unrecognized header {0}")]
    UnrecognizedHeader(String),

    #[error("Exif unrecognized BOM {0}")]
    UnrecognizedBom(String),

    #[error("Exif marker size wrong")]
    MarkerSizeWrong,

    /// A container (JPEG segment, box, chunk) claims more bytes than its
    /// parent holds.
    #[error("{0}")]
    ContainerSizeMismatch(&'static str),

    /// The entry table of an IFD runs past the end of the Exif block.
    #[error("malformed IFD at offset {offset:#x}")]
    MalformedIfd { offset: u64 },

    #[error("{0}")]
    MissingDate(&'static str),

    #[error("metadata only has UTC time")]
    MetadataOnlyUtc,

    #[error("file too small")]
    FileTooSmall,

    #[error("invalid text; {0}")]
    InvalidText(String),

    #[error("parse failed; {0}")]
    ParseFailed(String),

    #[error("unable to open {0}")]
    Io(#[from] io::Error),
}

use Error::*;

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        InvalidText(value.to_string())
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(e: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        convert_parse_error(e, "")
    }
}

pub(crate) fn convert_parse_error(e: nom::Err<nom::error::Error<&[u8]>>, message: &str) -> Error {
    let s = match e {
        nom::Err::Incomplete(_) => format!("{e}; {message}"),
        nom::Err::Error(e) => format!("{}; {message}", e.code.description()),
        nom::Err::Failure(e) => format!("{}; {message}", e.code.description()),
    };

    ParseFailed(s)
}

/// Renders raw bytes the way diagnostics echo them, e.g. `b'This is '`.
pub(crate) fn escape_bytes(bytes: &[u8]) -> String {
    format!("b'{}'", bytes.escape_ascii())
}
