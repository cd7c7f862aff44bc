use std::fmt::Display;

use crate::{jpeg::check_jpeg, png::check_png};

/// Number of leading bytes [`FileFormat::sniff`] looks at.
pub const SNIFF_LEN: usize = 8;

/// The container formats capture times can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// JPEG with an Exif APP1 segment.
    Jpeg,
    /// ISO base media file format: MP4, MOV, HEIF/HEIC, 3GP ...
    Isobmff,
    Png,
}

impl FileFormat {
    /// Identifies the format from the first 8 bytes of a file.
    ///
    /// - `FF D8`: JPEG
    /// - `ftyp` at offset 4: ISO base media
    /// - the PNG signature `89 50 4E 47 0D 0A 1A 0A`
    pub fn sniff(header: &[u8; SNIFF_LEN]) -> Option<FileFormat> {
        if check_jpeg(header) {
            Some(FileFormat::Jpeg)
        } else if &header[4..8] == b"ftyp" {
            Some(FileFormat::Isobmff)
        } else if check_png(header) {
            Some(FileFormat::Png)
        } else {
            None
        }
    }
}

impl Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::Jpeg => "JPEG",
            FileFormat::Isobmff => "ISOBMFF",
            FileFormat::Png => "PNG",
        }
        .fmt(f)
    }
}
