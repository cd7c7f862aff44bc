use nom::{multi::count, number::complete, number::Endianness, IResult};

use crate::values::{Coordinate, URational};

/// GPS fields gathered from the GPS IFD of an Exif block.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GPSInfo {
    // N, S
    pub latitude_ref: Option<char>,
    // degree, minute, second,
    pub latitude: Option<LatLng>,

    // E, W
    pub longitude_ref: Option<char>,
    // degree, minute, second,
    pub longitude: Option<LatLng>,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct LatLng(pub URational, pub URational, pub URational);

impl LatLng {
    /// Parses the three unsigned rationals of a `GPSLatitude` or
    /// `GPSLongitude` value.
    pub(crate) fn parse(input: &[u8], endian: Endianness) -> IResult<&[u8], LatLng> {
        let (remain, v) = count(complete::u32(endian), 6)(input)?;
        Ok((
            remain,
            LatLng(
                URational(v[0], v[1]),
                URational(v[2], v[3]),
                URational(v[4], v[5]),
            ),
        ))
    }

    /// `degrees + minutes / 60 + seconds / 3600`; `None` if any denominator
    /// is zero.
    pub fn to_degrees(&self) -> Option<f64> {
        Some(self.0.to_float()? + self.1.to_float()? / 60.0 + self.2.to_float()? / 3600.0)
    }
}

impl From<[(u32, u32); 3]> for LatLng {
    fn from(value: [(u32, u32); 3]) -> Self {
        let [d, m, s] = value.map(URational::from);
        Self(d, m, s)
    }
}

impl GPSInfo {
    /// The signed position, available once both hemispheres and both
    /// magnitudes were seen. `N` and `E` are positive, anything else counts
    /// as south/west.
    pub fn coordinate(&self) -> Option<Coordinate> {
        let latitude = self.latitude?.to_degrees()?;
        let longitude = self.longitude?.to_degrees()?;
        let lat_sign = if self.latitude_ref? == 'N' { 1.0 } else { -1.0 };
        let lon_sign = if self.longitude_ref? == 'E' { 1.0 } else { -1.0 };
        Some(Coordinate::new(latitude * lat_sign, longitude * lon_sign))
    }
}
