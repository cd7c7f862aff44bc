use chrono::NaiveDateTime;
use nom::{
    combinator::map,
    number::complete::{be_u32, be_u64},
    sequence::tuple,
};

use crate::values::mac_time_to_datetime;

use super::{FullBoxHeader, ParseBody};

/// Represents a [movie header atom][1].
///
/// mvhd is a fullbox which contains version & flags. Version 0 stores the
/// creation and modification times as 32-bit values; any later version uses
/// 64-bit ones.
///
/// atom-path: moov/mvhd
///
/// [1]: https://developer.apple.com/documentation/quicktime-file-format/movie_header_atom
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MvhdBox {
    /// seconds since midnight, January 1, 1904
    creation_time: u64,
}

impl MvhdBox {
    /// Smallest payload worth reading a creation time from.
    pub const MIN_PAYLOAD_LEN: u64 = 20;

    /// Creation time, nominally UTC. `None` when the field is zero.
    pub fn creation_time(&self) -> Option<NaiveDateTime> {
        mac_time_to_datetime(self.creation_time)
    }
}

impl ParseBody<Self> for MvhdBox {
    fn parse_body(body: &[u8], header: FullBoxHeader) -> nom::IResult<&[u8], Self> {
        // creation time, then modification time
        let (remain, (creation_time, _)) = if header.version != 0 {
            tuple((be_u64, be_u64))(body)?
        } else {
            tuple((map(be_u32, u64::from), map(be_u32, u64::from)))(body)?
        };

        Ok((
            remain,
            Self { creation_time },
        ))
    }
}
