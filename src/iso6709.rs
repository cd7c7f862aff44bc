//! ISO 6709 point strings, as found in QuickTime `©xyz` atoms and the
//! `com.apple.quicktime.location.ISO6709` metadata item.
//!
//! Accepted shape: `±DD[.f]±DDD[.f]` followed by one of `+`, `-` or `/`. The
//! latitude may carry 2, 4 or 6 digits (degrees, degrees + minutes,
//! degrees + minutes + seconds), the longitude 3, 5 or 7. Anything after the
//! longitude (altitude, `CRS...`) is ignored.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::values::Coordinate;

static ISO6709: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([+-])(\d\d|\d\d\d\d|\d\d\d\d\d\d)(\.\d*)?([+-])(\d\d\d|\d\d\d\d\d|\d\d\d\d\d\d\d)(\.\d*)?[+\-/]",
    )
    .expect("ISO 6709 pattern is valid")
});

/// Parses an ISO 6709 string into decimal degrees, e.g.
/// `"+46.7888-124.0958+018.337/"` gives `(46.7888, -124.0958)`.
///
/// Returns `None` when `s` does not match the grammar.
pub fn parse_iso6709(s: &str) -> Option<Coordinate> {
    let caps = ISO6709.captures(s)?;
    let latitude = component(&caps, 1, 2)?;
    let longitude = component(&caps, 4, 3)?;
    Some(Coordinate::new(latitude, longitude))
}

/// Decodes one signed component. `degree_digits` is 2 for latitude and 3 for
/// longitude; the digit count of the match tells whether minutes and seconds
/// follow. The fraction belongs to the last field present, and the sign is
/// applied once to the whole magnitude.
fn component(caps: &Captures, group: usize, degree_digits: usize) -> Option<f64> {
    let sign = if &caps[group] == "-" { -1.0 } else { 1.0 };
    let digits = &caps[group + 1];
    let frac = caps.get(group + 2).map_or("", |m| m.as_str());

    let field = |range: std::ops::Range<usize>| digits.get(range)?.parse::<f64>().ok();
    let last = |from: usize| format!("{}{frac}", digits.get(from..)?).parse::<f64>().ok();

    let d = degree_digits;
    let magnitude = match digits.len() - d {
        0 => last(0)?,
        2 => field(0..d)? + last(d)? / 60.0,
        _ => field(0..d)? + field(d..d + 2)? / 60.0 + last(d + 2)? / 3600.0,
    };
    Some(sign * magnitude)
}
