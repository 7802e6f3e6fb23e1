//! The selected region of interest and its URL parameter form.
//!
//! A region is written as `bbox:west,south,east,north` or `polygon:<polyline>`, where the polygon's
//! open ring is stored with the encoded polyline algorithm (precision 5, latitude first).

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::projection::{GeoBounds, GeoPos};

const POLYLINE_FACTOR: f64 = 1e5;

/// Errors that can occur while parsing a region.
#[derive(Error, Debug, PartialEq)]
pub enum RegionParseError {
    /// The text has no `kind:` prefix or the kind is unknown.
    #[error("Unknown region kind `{0}`")]
    UnknownKind(String),

    /// A bbox coordinate is not a number.
    #[error("Invalid bbox coordinate `{0}`")]
    InvalidNumber(String),

    /// A bbox does not have exactly four coordinates.
    #[error("A bbox needs 4 coordinates, got {0}")]
    WrongArity(usize),

    /// The polyline ends in the middle of a value.
    #[error("Malformed polyline")]
    MalformedPolyline,

    /// A polygon needs at least three points.
    #[error("A polygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),

    /// A decoded point lies outside longitude ±180 or latitude ±90.
    #[error("Point ({lon}, {lat}) is out of range")]
    OutOfRange {
        /// Decoded longitude.
        lon: f64,
        /// Decoded latitude.
        lat: f64,
    },
}

/// A user-selected geographic area.
#[derive(Clone, Debug, PartialEq)]
pub enum Region {
    /// `[west, south, east, north]`.
    BBox([f64; 4]),
    /// An open ring of points; the closing point is implied.
    Polygon(Vec<GeoPos>),
}

impl Region {
    /// The open ring outlining the region. A bbox yields its corners counter-clockwise from south-west.
    pub fn ring(&self) -> Vec<GeoPos> {
        match self {
            Region::BBox([west, south, east, north]) => vec![
                GeoPos {
                    lon: *west,
                    lat: *south,
                },
                GeoPos {
                    lon: *east,
                    lat: *south,
                },
                GeoPos {
                    lon: *east,
                    lat: *north,
                },
                GeoPos {
                    lon: *west,
                    lat: *north,
                },
            ],
            Region::Polygon(points) => points.clone(),
        }
    }

    /// The bounds enclosing the region, or `None` for an empty polygon.
    pub fn bounds(&self) -> Option<GeoBounds> {
        match self {
            Region::BBox(bbox) => Some(GeoBounds::from_bbox(*bbox)),
            Region::Polygon(points) => GeoBounds::from_points(points),
        }
    }

    /// The region as a closed polygon.
    pub fn to_polygon(&self) -> geo::Polygon<f64> {
        let coords: Vec<geo::Coord<f64>> = self.ring().into_iter().map(Into::into).collect();
        // `Polygon::new` closes the ring.
        geo::Polygon::new(geo::LineString::new(coords), vec![])
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::BBox([west, south, east, north]) => {
                write!(f, "bbox:{},{},{},{}", west, south, east, north)
            }
            Region::Polygon(points) => write!(f, "polygon:{}", encode_polyline(points)),
        }
    }
}

impl FromStr for Region {
    type Err = RegionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, body) = s
            .split_once(':')
            .ok_or_else(|| RegionParseError::UnknownKind(s.to_string()))?;
        match kind {
            "bbox" => {
                let coords = body
                    .split(',')
                    .map(|c| {
                        c.trim()
                            .parse::<f64>()
                            .map_err(|_| RegionParseError::InvalidNumber(c.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let bbox: [f64; 4] = coords
                    .as_slice()
                    .try_into()
                    .map_err(|_| RegionParseError::WrongArity(coords.len()))?;
                Ok(Region::BBox(bbox))
            }
            "polygon" => {
                let points = decode_polyline(body)?;
                if points.len() < 3 {
                    return Err(RegionParseError::TooFewPoints(points.len()));
                }
                Ok(Region::Polygon(points))
            }
            other => Err(RegionParseError::UnknownKind(other.to_string())),
        }
    }
}

fn encode_polyline(points: &[GeoPos]) -> String {
    let mut out = String::new();
    let (mut prev_lat, mut prev_lon) = (0_i64, 0_i64);
    for p in points {
        let lat = (p.lat * POLYLINE_FACTOR).round() as i64;
        let lon = (p.lon * POLYLINE_FACTOR).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }
    out
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((((v & 0x1f) | 0x20) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}

fn decode_polyline(text: &str) -> Result<Vec<GeoPos>, RegionParseError> {
    let mut bytes = text.bytes();
    let mut points = Vec::new();
    let (mut lat, mut lon) = (0_i64, 0_i64);

    loop {
        let Some(d_lat) = decode_value(&mut bytes)? else {
            break;
        };
        let d_lon = decode_value(&mut bytes)?.ok_or(RegionParseError::MalformedPolyline)?;
        lat = lat
            .checked_add(d_lat)
            .ok_or(RegionParseError::MalformedPolyline)?;
        lon = lon
            .checked_add(d_lon)
            .ok_or(RegionParseError::MalformedPolyline)?;
        let point = GeoPos {
            lon: lon as f64 / POLYLINE_FACTOR,
            lat: lat as f64 / POLYLINE_FACTOR,
        };
        if point.lon.abs() > 180.0 || point.lat.abs() > 90.0 {
            return Err(RegionParseError::OutOfRange {
                lon: point.lon,
                lat: point.lat,
            });
        }
        points.push(point);
    }
    Ok(points)
}

/// Reads one value. `Ok(None)` at a clean end of input.
fn decode_value(bytes: &mut impl Iterator<Item = u8>) -> Result<Option<i64>, RegionParseError> {
    let mut result = 0_i64;
    let mut shift = 0;
    let mut started = false;
    loop {
        let Some(b) = bytes.next() else {
            return if started {
                Err(RegionParseError::MalformedPolyline)
            } else {
                Ok(None)
            };
        };
        if !(63..=126).contains(&b) || shift > 60 {
            return Err(RegionParseError::MalformedPolyline);
        }
        started = true;
        let chunk = (b - 63) as i64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    let value = if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn bbox_ring_has_four_corners() {
        let ring = Region::BBox([1.0, 2.0, 3.0, 4.0]).ring();
        assert_eq!(
            ring,
            vec![
                GeoPos { lon: 1.0, lat: 2.0 },
                GeoPos { lon: 3.0, lat: 2.0 },
                GeoPos { lon: 3.0, lat: 4.0 },
                GeoPos { lon: 1.0, lat: 4.0 },
            ]
        );
    }

    #[test]
    fn polygon_is_closed() {
        let polygon = Region::BBox([0.0, 0.0, 2.0, 1.0]).to_polygon();
        assert_eq!(polygon.exterior().0.len(), 5);
        assert!((polygon.unsigned_area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn polygon_bounds() {
        let region = Region::Polygon(vec![
            GeoPos { lon: 0.0, lat: 0.0 },
            GeoPos { lon: 4.0, lat: 1.0 },
            GeoPos { lon: 1.0, lat: 3.0 },
        ]);
        assert_eq!(region.bounds().unwrap().to_bbox(), [0.0, 0.0, 4.0, 3.0]);
        assert!(Region::Polygon(vec![]).bounds().is_none());
    }

    #[test]
    fn parses_bbox() {
        let region: Region = "bbox:-0.5,51.2,0.3,51.7".parse().unwrap();
        assert_eq!(region, Region::BBox([-0.5, 51.2, 0.3, 51.7]));
        assert_eq!(region.to_string(), "bbox:-0.5,51.2,0.3,51.7");
    }

    #[test]
    fn decodes_reference_polyline() {
        // The reference example of the encoded polyline algorithm.
        let points = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        let expected = [(-120.2, 38.5), (-120.95, 40.7), (-126.453, 43.252)];
        assert_eq!(points.len(), 3);
        for (p, (lon, lat)) in points.iter().zip(expected) {
            assert!((p.lon - lon).abs() < 1e-9);
            assert!((p.lat - lat).abs() < 1e-9);
        }
        let region = Region::Polygon(points);
        assert_eq!(region.to_string(), "polygon:_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            "circle:1,2".parse::<Region>(),
            Err(RegionParseError::UnknownKind("circle".to_string()))
        );
        assert_eq!(
            "bbox:1,2,3".parse::<Region>(),
            Err(RegionParseError::WrongArity(3))
        );
        assert_eq!(
            "bbox:1,2,x,4".parse::<Region>(),
            Err(RegionParseError::InvalidNumber("x".to_string()))
        );
        assert_eq!(
            "polygon:_p~iF~ps|U".parse::<Region>(),
            Err(RegionParseError::TooFewPoints(1))
        );
        assert_eq!(
            "polygon:_p~iF~ps|U_".parse::<Region>(),
            Err(RegionParseError::MalformedPolyline)
        );
        assert!("nonsense".parse::<Region>().is_err());
    }

    #[test]
    fn huge_polyline_deltas_are_an_error() {
        let mut text = String::from("polygon:");
        for _ in 0..4 {
            encode_value(1 << 61, &mut text);
            encode_value(0, &mut text);
        }
        assert!(text.parse::<Region>().is_err());
    }

    #[test]
    fn polyline_outside_world_is_rejected() {
        let mut text = String::from("polygon:");
        // Latitude 100 degrees.
        encode_value(10_000_000, &mut text);
        encode_value(0, &mut text);
        assert_eq!(
            text.parse::<Region>(),
            Err(RegionParseError::OutOfRange {
                lon: 0.0,
                lat: 100.0
            })
        );
    }
}
