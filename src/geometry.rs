//! Decides how the camera reacts when the selected region changes.

use geo::{BooleanOps, ChamberlainDuquetteArea, Intersects, Line, LineString, Polygon};
use thiserror::Error;

/// How the viewport moves to show a new region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Jump to the region without animation.
    Snap,
    /// Animate the camera to the region.
    Fly,
    /// Leave the camera where it is.
    Stay,
}

/// Geometry that the transition decision cannot work with.
#[derive(Error, Debug, PartialEq)]
pub enum GeometryError {
    /// The boundary ring has fewer than three distinct points.
    #[error("Boundary needs at least 3 points, got {0}")]
    TooFewPoints(usize),

    /// A coordinate is NaN or infinite.
    #[error("Boundary has a non-finite coordinate")]
    NonFinite,

    /// Two edges of the boundary cross.
    #[error("Boundary edges {0} and {1} intersect")]
    SelfIntersecting(usize, usize),

    /// The viewport has no area.
    #[error("Viewport has no area")]
    EmptyViewport,
}

/// Chooses between flying to the boundary and staying put.
///
/// The camera flies when the boundary swallows the whole viewport, or when the part of the viewport
/// outside the boundary is larger than `1 - min_coverage` of the viewport, i.e. the boundary is
/// small on screen or off screen. Otherwise the current view already frames it.
pub fn choose_transition(
    viewport: &Polygon<f64>,
    boundary: &Polygon<f64>,
    min_coverage: f64,
) -> Result<Transition, GeometryError> {
    validate_ring(boundary)?;

    let viewport_area = spherical_area(viewport);
    if !(viewport_area.is_finite() && viewport_area > 0.0) {
        return Err(GeometryError::EmptyViewport);
    }

    let leftover = viewport.difference(boundary);
    if leftover.0.is_empty() {
        return Ok(Transition::Fly);
    }

    let leftover_area: f64 = leftover.iter().map(spherical_area).sum();
    if !leftover_area.is_finite() {
        return Err(GeometryError::NonFinite);
    }
    if leftover_area > viewport_area * (1.0 - min_coverage) {
        Ok(Transition::Fly)
    } else {
        Ok(Transition::Stay)
    }
}

/// Area in square meters of the exterior minus the holes, whatever the ring orientation.
fn spherical_area(polygon: &Polygon<f64>) -> f64 {
    let ring_area = |ring: &LineString<f64>| {
        Polygon::new(ring.clone(), vec![]).chamberlain_duquette_unsigned_area()
    };
    let holes: f64 = polygon.interiors().iter().map(ring_area).sum();
    ring_area(polygon.exterior()) - holes
}

/// Checks that the polygon's exterior is a simple ring with finite coordinates.
pub fn validate_ring(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    let coords = &polygon.exterior().0;
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(GeometryError::NonFinite);
    }

    // The exterior is closed, so the last coordinate repeats the first.
    let mut distinct = coords.clone();
    distinct.dedup();
    let open_len = distinct.len().saturating_sub(1);
    if open_len < 3 {
        return Err(GeometryError::TooFewPoints(open_len));
    }

    let edges: Vec<Line<f64>> = distinct.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    let n = edges.len();
    for i in 0..n {
        // Adjacent edges share an endpoint; the first and last edge are adjacent too.
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return Err(GeometryError::SelfIntersecting(i, j));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::GeoBounds;
    use geo::polygon;

    const MIN_COVERAGE: f64 = 0.1;

    fn viewport() -> Polygon<f64> {
        GeoBounds::from_bbox([0.0, 0.0, 10.0, 10.0]).to_polygon()
    }

    #[test]
    fn boundary_containing_viewport_flies() {
        let boundary = GeoBounds::from_bbox([-5.0, -5.0, 15.0, 15.0]).to_polygon();
        assert_eq!(
            choose_transition(&viewport(), &boundary, MIN_COVERAGE),
            Ok(Transition::Fly)
        );
    }

    #[test]
    fn boundary_equal_to_viewport_flies() {
        assert_eq!(
            choose_transition(&viewport(), &viewport(), MIN_COVERAGE),
            Ok(Transition::Fly)
        );
    }

    #[test]
    fn small_boundary_flies() {
        let boundary = GeoBounds::from_bbox([4.0, 4.0, 5.0, 5.0]).to_polygon();
        assert_eq!(
            choose_transition(&viewport(), &boundary, MIN_COVERAGE),
            Ok(Transition::Fly)
        );
    }

    #[test]
    fn boundary_outside_viewport_flies() {
        let boundary = GeoBounds::from_bbox([40.0, 40.0, 50.0, 50.0]).to_polygon();
        assert_eq!(
            choose_transition(&viewport(), &boundary, MIN_COVERAGE),
            Ok(Transition::Fly)
        );
    }

    #[test]
    fn well_framed_boundary_stays() {
        let boundary = GeoBounds::from_bbox([2.0, 2.0, 8.0, 8.0]).to_polygon();
        assert_eq!(
            choose_transition(&viewport(), &boundary, MIN_COVERAGE),
            Ok(Transition::Stay)
        );
    }

    #[test]
    fn leftover_with_hole_is_smaller_than_viewport() {
        let boundary = GeoBounds::from_bbox([2.0, 2.0, 8.0, 8.0]).to_polygon();
        let leftover = viewport().difference(&boundary);
        let leftover_area: f64 = leftover.iter().map(spherical_area).sum();
        let viewport_area = spherical_area(&viewport());
        let boundary_area = spherical_area(&boundary);
        assert!(leftover_area < viewport_area);
        assert!((leftover_area + boundary_area - viewport_area).abs() / viewport_area < 1e-6);
    }

    #[test]
    fn self_intersecting_boundary_is_rejected() {
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 4.0),
            (x: 4.0, y: 0.0),
            (x: 0.0, y: 4.0)
        ];
        assert!(matches!(
            choose_transition(&viewport(), &bowtie, MIN_COVERAGE),
            Err(GeometryError::SelfIntersecting(_, _))
        ));
    }

    #[test]
    fn degenerate_boundaries_are_rejected() {
        let line = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 1.0, y: 1.0)];
        assert_eq!(validate_ring(&line), Err(GeometryError::TooFewPoints(2)));

        let nan = polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 1.0), (x: 1.0, y: 0.0)];
        assert_eq!(validate_ring(&nan), Err(GeometryError::NonFinite));
    }

    #[test]
    fn empty_viewport_is_rejected() {
        let flat = GeoBounds::from_bbox([0.0, 0.0, 10.0, 0.0]).to_polygon();
        let boundary = GeoBounds::from_bbox([2.0, 2.0, 8.0, 8.0]).to_polygon();
        assert_eq!(
            choose_transition(&flat, &boundary, MIN_COVERAGE),
            Err(GeometryError::EmptyViewport)
        );
    }
}
