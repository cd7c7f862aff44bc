//! picdate finds out when and where a photo or video was captured, written
//! in pure Rust with [nom](https://github.com/rust-bakery/nom). The container
//! formats are decoded directly, no external metadata tool is needed.
//!
//! ## Key Features
//!
//! - Format auto-detecting: the first 8 bytes decide between JPEG, ISO base
//!   media (mp4/mov/3gp/heic/heif) and PNG, file extensions are ignored.
//!
//! - Time zones done right: a capture time is either *zoned* (its UTC offset
//!   is known), *floating* (a wall-clock reading from the camera) or, for
//!   many videos, *UTC only*. UTC-only times can be moved into local time
//!   with [`resolve_local_time`] and a [`Geocoder`] of your choice.
//!
//! - Real-world files: several non-conforming writers are handled, e.g.
//!   Canon's `CNTH` thumbnails, Samsung's `©xyz` location atom, Sony's `MSNV`
//!   brand storing local time in `mvhd`, and `iloc` boxes with any field
//!   widths.
//!
//! - Cheap on big files: only the metadata ranges are read. `mdat` payloads
//!   are seeked over, never loaded.
//!
//! - Robust: never panics on malformed input, every problem ends up as a
//!   [`diagnostic`](ExtractionResult::diagnostic). The decoders are fuzzed
//!   with [afl.rs](https://github.com/rust-fuzz/afl.rs).
//!
//! ## Usage
//!
//! ```rust
//! use picdate::*;
//!
//! let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
//! let text = b"date:create\x002018-05-06T09:30:00+02:00";
//! png.extend((text.len() as u32).to_be_bytes());
//! png.extend(b"tEXt");
//! png.extend(text);
//! png.extend([0; 4]); // CRC, not checked
//!
//! let result = extract_bytes(&png);
//! assert_eq!(
//!     result.preferred_date.unwrap().to_string(),
//!     "2018-05-06T09:30:00+02:00"
//! );
//! assert_eq!(
//!     result.suggested_stem().as_deref(),
//!     Some("2018.05.06 - 09.30.00")
//! );
//!
//! let result = extract_bytes(b"GIF89a\x01\x00\x01\x00");
//! assert_eq!(result.preferred_date, None);
//! assert_eq!(
//!     result.diagnostic.as_deref(),
//!     Some("unrecognized header b'GIF89a\\x01\\x00'")
//! );
//! ```
//!
//! Files are opened with [`extract_file`]; any `Read + Seek` works with
//! [`extract`].
//!
//! ## Async API Usage
//!
//! Enable `async` feature flag for picdate in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! picdate = { version = "0.1", features = ["async"] }
//! ```
//!
//! ```rust
//! #[cfg(feature = "async")]
//! #[tokio::main]
//! async fn main() {
//!     let result = picdate::extract_file_async("./no/such/file.heic").await;
//!     assert!(result.diagnostic.unwrap().starts_with("unable to open"));
//! }
//!
//! #[cfg(not(feature = "async"))]
//! fn main() {}
//! ```
//!
//! ## JSON
//!
//! With the `json_dump` feature, [`ExtractionResult`] implements
//! `serde::Serialize`.

pub use parser::{extract, extract_bytes, extract_file, ExtractionResult};
#[cfg(feature = "async")]
pub use parser_async::{extract_async, extract_file_async};

pub use bbox::{dump_box_tree, BoxHeader, BoxKind};
pub use exif::{ExifTag, GPSInfo, LatLng};
pub use file::FileFormat;
pub use geocode::{resolve_local_time, Geocoder, Place};
pub use iso6709::parse_iso6709;
pub use source::{ByteSource, Encoding};
pub use values::{mac_time_to_datetime, CaptureTime, Coordinate, URational};

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

mod bbox;
mod error;
mod exif;
mod file;
mod geocode;
mod heif;
mod iso6709;
mod jpeg;
mod mov;
mod parser;
#[cfg(feature = "async")]
mod parser_async;
mod png;
mod source;
mod values;

#[cfg(test)]
mod testkit;
