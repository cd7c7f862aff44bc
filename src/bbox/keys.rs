use nom::bytes::complete::take;
use nom::combinator::{fail, map};
use nom::error::context;
use nom::multi::many_m_n;
use nom::number::complete::be_u32;
use nom::IResult;

use super::{FullBoxHeader, ParseBody};

/// Represents a [keys atom][1].
///
/// `keys` is a fullbox which contains version & flags.
///
/// atom-path: moov/meta/keys
///
/// [1]: https://developer.apple.com/documentation/quicktime-file-format/metadata_item_keys_atom
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeysBox {
    pub entries: Vec<KeyEntry>,
}

impl ParseBody<KeysBox> for KeysBox {
    /// Entries are read until `entry_count` is reached or one doesn't fit.
    fn parse_body(body: &[u8], _: FullBoxHeader) -> IResult<&[u8], KeysBox> {
        let (remain, entry_count) = be_u32(body)?;
        let (remain, entries) = many_m_n(0, entry_count as usize, KeyEntry::parse)(remain)?;

        Ok((
            remain,
            KeysBox { entries },
        ))
    }
}

impl KeysBox {
    /// Looks up a key by the 1-based index `ilst` items refer to it with.
    pub fn get(&self, index: u32) -> Option<&KeyEntry> {
        let i = index.checked_sub(1)?;
        self.entries.get(i as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct KeyEntry {
    pub key: String, // len: size - 8
}

impl KeyEntry {
    fn parse(input: &[u8]) -> IResult<&[u8], KeyEntry> {
        let (remain, size) = be_u32(input)?;
        let Some(key_len) = size.checked_sub(8) else {
            return context("invalid KeyEntry size", fail)(input);
        };
        // key namespace, `mdta` in practice
        let (remain, _) = take(4usize)(remain)?;
        let (remain, key) = map(take(key_len), String::from_utf8_lossy)(remain)?;

        Ok((
            remain,
            KeyEntry {
                key: key.into_owned(),
            },
        ))
    }
}
