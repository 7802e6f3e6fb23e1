//! Layers for the map view that can handle input, and draw on top of the map view different kinds of data.
//!
use egui::{Painter, Pos2, Response};
use std::any::Any;

use crate::projection::MapProjection;

/// The editable outline of the selected region.
pub mod boundary;

/// Data features with attribute sub-filters.
pub mod features;

/// GeoJSON import and export for layers.
#[cfg(feature = "geojson")]
pub mod geojson;

/// A trait for map layers.
pub trait Layer: Any {
    /// Handles user input for the layer. Returns `true` if the input was handled and should not be
    /// processed further by the map.
    fn handle_input(&mut self, response: &Response, projection: &MapProjection) -> bool;

    /// Draws the layer.
    fn draw(&self, painter: &Painter, projection: &MapProjection);

    /// Gets the layer as a `dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Gets the layer as a mutable `dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Position of the projection of `p` onto segment `a`-`b`, clamped to `0.0..=1.0`.
pub(crate) fn projection_factor(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let l2 = ab.length_sq();
    if l2 == 0.0 {
        return 0.0;
    }
    ((p - a).dot(ab) / l2).clamp(0.0, 1.0)
}

/// Squared distance from `p` to the segment `a`-`b`.
pub(crate) fn dist_sq_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let closest = a.lerp(b, projection_factor(p, a, b));
    p.distance_sq(closest)
}

/// Whether segments `p1`-`q1` and `p2`-`q2` properly cross. Collinear overlaps are not counted.
pub(crate) fn segments_intersect(p1: Pos2, q1: Pos2, p2: Pos2, q2: Pos2) -> bool {
    fn side(p: Pos2, q: Pos2, r: Pos2) -> i8 {
        let cross = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
        if cross.abs() < 1e-6 {
            0
        } else if cross > 0.0 {
            1
        } else {
            -1
        }
    }

    side(p1, q1, p2) != side(p1, q1, q2) && side(p2, q2, p1) != side(p2, q2, q1)
}
