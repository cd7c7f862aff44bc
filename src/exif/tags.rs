//! The Exif tags the capture-time decoder cares about, see
//! https://exiftool.org/TagNames/EXIF.html

use std::fmt::Display;

/// Recognized Exif tags. Every other tag is skipped while walking an IFD.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy)]
pub enum ExifTag {
    ModifyDate = 0x0000_0132,
    DateTimeOriginal = 0x0000_9003,
    CreateDate = 0x0000_9004,
    OffsetTime = 0x0000_9010,
    OffsetTimeOriginal = 0x0000_9011,
    OffsetTimeDigitized = 0x0000_9012,

    GPSLatitudeRef = 0x00001,
    GPSLatitude = 0x00002,
    GPSLongitudeRef = 0x00003,
    GPSLongitude = 0x00004,

    // sub ifd
    ExifOffset = 0x0000_8769,
    GPSInfo = 0x0000_8825,
}

impl ExifTag {
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// The offset tag matching a timestamp tag, e.g. `OffsetTimeOriginal`
    /// for `DateTimeOriginal`.
    pub fn offset_tag(self) -> Option<ExifTag> {
        match self {
            ExifTag::ModifyDate => Some(ExifTag::OffsetTime),
            ExifTag::DateTimeOriginal => Some(ExifTag::OffsetTimeOriginal),
            ExifTag::CreateDate => Some(ExifTag::OffsetTimeDigitized),
            _ => None,
        }
    }
}

impl TryFrom<u16> for ExifTag {
    type Error = u16;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        use ExifTag::*;

        let tag = match v {
            x if x == ModifyDate.code() => ModifyDate,
            x if x == DateTimeOriginal.code() => DateTimeOriginal,
            x if x == CreateDate.code() => CreateDate,
            x if x == OffsetTime.code() => OffsetTime,
            x if x == OffsetTimeOriginal.code() => OffsetTimeOriginal,
            x if x == OffsetTimeDigitized.code() => OffsetTimeDigitized,
            x if x == GPSLatitudeRef.code() => GPSLatitudeRef,
            x if x == GPSLatitude.code() => GPSLatitude,
            x if x == GPSLongitudeRef.code() => GPSLongitudeRef,
            x if x == GPSLongitude.code() => GPSLongitude,
            x if x == ExifOffset.code() => ExifOffset,
            x if x == GPSInfo.code() => GPSInfo,
            o => return Err(o),
        };
        Ok(tag)
    }
}

impl Display for ExifTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: &str = match self {
            ExifTag::ModifyDate => "ModifyDate",
            ExifTag::DateTimeOriginal => "DateTimeOriginal",
            ExifTag::CreateDate => "CreateDate",
            ExifTag::OffsetTime => "OffsetTime",
            ExifTag::OffsetTimeOriginal => "OffsetTimeOriginal",
            ExifTag::OffsetTimeDigitized => "OffsetTimeDigitized",
            ExifTag::GPSLatitudeRef => "GPSLatitudeRef",
            ExifTag::GPSLatitude => "GPSLatitude",
            ExifTag::GPSLongitudeRef => "GPSLongitudeRef",
            ExifTag::GPSLongitude => "GPSLongitude",
            ExifTag::ExifOffset => "ExifOffset",
            ExifTag::GPSInfo => "GPSInfo",
        };
        s.fmt(f)
    }
}

/// Value formats of an IFD entry.
///
/// | Value           |             1 |             2 |              3 |               4 |                 5 |
/// |-----------------+---------------+---------------+----------------+-----------------+-------------------|
/// | Format          | unsigned byte | ascii strings | unsigned short |   unsigned long | unsigned rational |
/// | Bytes/component |             1 |             1 |              2 |               4 |                 8 |
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub(crate) enum DataFormat {
    Ascii = 2,
    U32 = 4,
    URational = 5,
}

impl DataFormat {
    pub(crate) fn code(self) -> u16 {
        self as u16
    }
}

/// Size in bytes of one component of `data_format`, `None` for unknown
/// formats.
pub(crate) fn component_size(data_format: u16) -> Option<u64> {
    let size = match data_format {
        // u8 | string | i8 | undefined
        1 | 2 | 6 | 7 => 1,
        // u16 | i16
        3 | 8 => 2,
        // u32 | i32 | f32
        4 | 9 | 0xb => 4,
        // unsigned rational | signed rational | f64
        5 | 0xa | 0xc => 8,
        _ => return None,
    };
    Some(size)
}
