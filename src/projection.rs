//! Map projection and geographic primitives.

use egui::{Pos2, Rect};
use serde::{Deserialize, Serialize};

use crate::{TILE_SIZE, lat_to_y, lon_to_x, x_to_lon, y_to_lat};

/// The northern and southern limit of the Web Mercator projection.
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// A geographical position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl From<(f64, f64)> for GeoPos {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

impl From<GeoPos> for (f64, f64) {
    fn from(pos: GeoPos) -> Self {
        (pos.lon, pos.lat)
    }
}

impl From<GeoPos> for geo::Coord<f64> {
    fn from(pos: GeoPos) -> Self {
        geo::coord! { x: pos.lon, y: pos.lat }
    }
}

/// An axis aligned geographical rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// Western longitude.
    pub west: f64,
    /// Southern latitude.
    pub south: f64,
    /// Eastern longitude.
    pub east: f64,
    /// Northern latitude.
    pub north: f64,
}

impl GeoBounds {
    /// Creates bounds from a `[west, south, east, north]` array.
    pub fn from_bbox([west, south, east, north]: [f64; 4]) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Smallest bounds containing all the given points, or `None` if there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPos>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let init = Self {
            west: first.lon,
            south: first.lat,
            east: first.lon,
            north: first.lat,
        };
        Some(iter.fold(init, |b, p| Self {
            west: b.west.min(p.lon),
            south: b.south.min(p.lat),
            east: b.east.max(p.lon),
            north: b.north.max(p.lat),
        }))
    }

    /// The bounds as `[west, south, east, north]`.
    pub fn to_bbox(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// The geographical center of the bounds.
    pub fn center(&self) -> GeoPos {
        GeoPos {
            lon: (self.west + self.east) / 2.0,
            lat: (self.south + self.north) / 2.0,
        }
    }

    /// Extends each side by `ratio` times the span of the bounds. Negative ratios shrink.
    pub fn pad(&self, ratio: f64) -> Self {
        let lon_buffer = (self.east - self.west).abs() * ratio;
        let lat_buffer = (self.north - self.south).abs() * ratio;
        Self {
            west: self.west - lon_buffer,
            south: self.south - lat_buffer,
            east: self.east + lon_buffer,
            north: self.north + lat_buffer,
        }
    }

    /// Converts the bounds into a closed polygon.
    pub fn to_polygon(&self) -> geo::Polygon<f64> {
        geo::Rect::new(
            geo::coord! { x: self.west, y: self.south },
            geo::coord! { x: self.east, y: self.north },
        )
        .to_polygon()
    }
}

/// A helper for converting between geographical and screen coordinates.
pub struct MapProjection {
    zoom: u8,
    center: GeoPos,
    widget_rect: Rect,
}

impl MapProjection {
    /// Creates a new `MapProjection`.
    pub(crate) fn new(zoom: u8, center: GeoPos, widget_rect: Rect) -> Self {
        Self {
            zoom,
            center,
            widget_rect,
        }
    }

    /// The zoom level this projection was made for.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// The screen rectangle of the map widget.
    pub fn widget_rect(&self) -> Rect {
        self.widget_rect
    }

    /// Projects a geographical coordinate to a screen coordinate.
    pub fn project(&self, geo_pos: GeoPos) -> Pos2 {
        let center_x = lon_to_x(self.center.lon, self.zoom);
        let center_y = lat_to_y(self.center.lat, self.zoom);

        let dx = (lon_to_x(geo_pos.lon, self.zoom) - center_x) * TILE_SIZE as f64;
        let dy = (lat_to_y(geo_pos.lat, self.zoom) - center_y) * TILE_SIZE as f64;

        self.widget_rect.center() + egui::vec2(dx as f32, dy as f32)
    }

    /// Un-projects a screen coordinate to a geographical coordinate.
    pub fn unproject(&self, screen_pos: Pos2) -> GeoPos {
        let rel = screen_pos - self.widget_rect.center();

        let target_x = lon_to_x(self.center.lon, self.zoom) + rel.x as f64 / TILE_SIZE as f64;
        let target_y = lat_to_y(self.center.lat, self.zoom) + rel.y as f64 / TILE_SIZE as f64;

        GeoPos {
            lon: x_to_lon(target_x, self.zoom),
            lat: y_to_lat(target_y, self.zoom),
        }
    }

    /// Un-projects a screen rectangle to geographical bounds.
    pub fn unproject_rect(&self, rect: Rect) -> GeoBounds {
        let south_west = self.unproject(rect.left_bottom());
        let north_east = self.unproject(rect.right_top());
        GeoBounds {
            west: south_west.lon,
            south: south_west.lat,
            east: north_east.lon,
            north: north_east.lat,
        }
    }
}
