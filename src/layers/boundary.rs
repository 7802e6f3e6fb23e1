//! A layer showing the selected region as an editable polygon.
//!
//! Vertices can be dragged, a double click on an edge inserts a vertex, and a secondary click on a
//! vertex removes it. Every change marks the layer as edited; callers pick the mark up with
//! [`BoundaryLayer::take_edited`].

use crate::layers::{Layer, dist_sq_to_segment, projection_factor, segments_intersect};
use crate::projection::{GeoPos, MapProjection};
use egui::{Color32, Mesh, Painter, Pos2, Response, Shape, Stroke};
use log::warn;
use std::any::Any;

/// The rendered outline of a region.
#[derive(Clone, Debug)]
pub struct BoundaryLayer {
    points: Vec<GeoPos>,

    /// Outline style.
    pub stroke: Stroke,

    /// Fill color of the polygon.
    pub fill: Color32,

    /// The radius of the vertex handles.
    pub node_radius: f32,

    /// The fill color of the vertex handles.
    pub node_fill: Color32,

    /// Whether the user may edit the outline.
    pub editable: bool,

    dragged_node: Option<usize>,
    edited: bool,
}

impl BoundaryLayer {
    /// Creates a boundary from an open ring of points.
    pub fn new(points: Vec<GeoPos>) -> Self {
        Self {
            points,
            stroke: Stroke::new(1.0, Color32::GRAY),
            fill: Color32::from_rgba_unmultiplied(128, 128, 128, 40),
            node_radius: 5.0,
            node_fill: Color32::WHITE,
            editable: false,
            dragged_node: None,
            edited: false,
        }
    }

    /// Enables interactive editing.
    pub fn enable_edit(mut self) -> Self {
        self.editable = true;
        self
    }

    /// The current open ring.
    pub fn ring(&self) -> &[GeoPos] {
        &self.points
    }

    /// Returns whether the outline was edited since the last call, and clears the mark.
    pub fn take_edited(&mut self) -> bool {
        std::mem::take(&mut self.edited)
    }

    /// Moves a vertex. Rejected when it would make the ring self-intersect.
    pub fn move_node(&mut self, index: usize, to: GeoPos, projection: &MapProjection) -> bool {
        if index >= self.points.len() || !self.is_move_valid(index, projection.project(to), projection)
        {
            return false;
        }
        self.points[index] = to;
        self.edited = true;
        true
    }

    /// Inserts a vertex after `index`.
    pub fn insert_node(&mut self, index: usize, pos: GeoPos) {
        let at = (index + 1).min(self.points.len());
        self.points.insert(at, pos);
        self.edited = true;
    }

    /// Removes a vertex, keeping at least a triangle.
    pub fn remove_node(&mut self, index: usize) -> bool {
        if self.points.len() <= 3 || index >= self.points.len() {
            return false;
        }
        self.points.remove(index);
        self.edited = true;
        true
    }

    fn handle_edit_input(&mut self, response: &Response, projection: &MapProjection) -> bool {
        if response.double_clicked() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                if self.find_node_at(pointer_pos, projection).is_none() {
                    if let Some(index) = self.find_segment_at(pointer_pos, projection) {
                        let a = projection.project(self.points[index]);
                        let b = projection.project(self.points[(index + 1) % self.points.len()]);
                        // Interpolate on screen so the new vertex sits under the pointer.
                        let on_edge = a.lerp(b, projection_factor(pointer_pos, a, b));
                        self.insert_node(index, projection.unproject(on_edge));
                        return true;
                    }
                }
            }
        }

        if response.secondary_clicked() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                if let Some(index) = self.find_node_at(pointer_pos, projection) {
                    return self.remove_node(index);
                }
            }
        }

        if response.drag_started() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                self.dragged_node = self.find_node_at(pointer_pos, projection);
            }
        }

        if response.dragged() {
            if let Some(index) = self.dragged_node {
                if let Some(pointer_pos) = response.ctx.input(|i| i.pointer.interact_pos()) {
                    self.move_node(index, projection.unproject(pointer_pos), projection);
                }
            }
        }

        if response.drag_stopped() {
            self.dragged_node = None;
        }

        let is_dragging = self.dragged_node.is_some();
        if is_dragging {
            response.ctx.set_cursor_icon(egui::CursorIcon::Grabbing);
        } else if let Some(pointer_pos) = response.hover_pos() {
            if self.find_node_at(pointer_pos, projection).is_some() {
                response.ctx.set_cursor_icon(egui::CursorIcon::Grab);
            }
        }

        // Only swallow input aimed at the outline; everything else pans the map.
        is_dragging
    }

    fn find_node_at(&self, screen_pos: Pos2, projection: &MapProjection) -> Option<usize> {
        let tolerance_sq = (self.node_radius * 3.0).powi(2);
        self.points
            .iter()
            .position(|p| projection.project(*p).distance_sq(screen_pos) < tolerance_sq)
    }

    fn find_segment_at(&self, screen_pos: Pos2, projection: &MapProjection) -> Option<usize> {
        let tolerance_sq = (self.node_radius * 2.0).powi(2);
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        (0..n).find(|&i| {
            let a = projection.project(self.points[i]);
            let b = projection.project(self.points[(i + 1) % n]);
            dist_sq_to_segment(screen_pos, a, b) < tolerance_sq
        })
    }

    /// Checks if moving a vertex to `new_screen_pos` keeps the ring simple.
    fn is_move_valid(&self, index: usize, new_screen_pos: Pos2, projection: &MapProjection) -> bool {
        let n = self.points.len();
        if n < 4 {
            // A triangle cannot self-intersect.
            return true;
        }

        let screen: Vec<Pos2> = self.points.iter().map(|p| projection.project(*p)).collect();
        let prev = (index + n - 1) % n;
        let next = (index + 1) % n;
        let moved = [(prev, screen[prev]), (next, screen[next])];

        (0..n).all(|i| {
            let j = (i + 1) % n;
            if i == index || j == index {
                return true;
            }
            moved.iter().all(|&(end, end_pos)| {
                i == end || j == end || !segments_intersect(end_pos, new_screen_pos, screen[i], screen[j])
            })
        })
    }
}

impl Layer for BoundaryLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, response: &Response, projection: &MapProjection) -> bool {
        self.editable && self.handle_edit_input(response, projection)
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        if self.points.len() < 3 {
            warn!("Boundary has fewer than three points: {:?}", self.points);
            return;
        }

        let screen_points: Vec<Pos2> = self.points.iter().map(|p| projection.project(*p)).collect();

        let flat_points: Vec<f64> = screen_points
            .iter()
            .flat_map(|p| [p.x as f64, p.y as f64])
            .collect();
        match earcutr::earcut(&flat_points, &[], 2) {
            Ok(indices) => {
                let mut mesh = Mesh::default();
                mesh.vertices = screen_points
                    .iter()
                    .map(|p| egui::epaint::Vertex {
                        pos: *p,
                        uv: Default::default(),
                        color: self.fill,
                    })
                    .collect();
                mesh.indices = indices.into_iter().map(|i| i as u32).collect();
                painter.add(Shape::Mesh(mesh.into()));
            }
            Err(e) => warn!("Unable to triangulate boundary: {:?}", e),
        }

        painter.add(Shape::Path(egui::epaint::PathShape {
            points: screen_points.clone(),
            closed: true,
            fill: Color32::TRANSPARENT,
            stroke: self.stroke.into(),
        }));

        if self.editable {
            for point in &screen_points {
                painter.circle_filled(*point, self.node_radius, self.node_fill);
                painter.circle_stroke(*point, self.node_radius, self.stroke);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{Rect, pos2, vec2};

    fn square() -> Vec<GeoPos> {
        vec![
            GeoPos { lon: 0.0, lat: 0.0 },
            GeoPos { lon: 1.0, lat: 0.0 },
            GeoPos { lon: 1.0, lat: 1.0 },
            GeoPos { lon: 0.0, lat: 1.0 },
        ]
    }

    fn projection() -> MapProjection {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0));
        MapProjection::new(6, GeoPos { lon: 0.5, lat: 0.5 }, rect)
    }

    #[test]
    fn new_boundary_is_read_only() {
        let layer = BoundaryLayer::new(square());
        assert!(!layer.editable);
        assert!(layer.enable_edit().editable);
    }

    #[test]
    fn edits_are_reported_once() {
        let mut layer = BoundaryLayer::new(square()).enable_edit();
        assert!(!layer.take_edited());
        layer.insert_node(0, GeoPos { lon: 0.5, lat: -0.2 });
        assert_eq!(layer.ring().len(), 5);
        assert_eq!(layer.ring()[1], GeoPos { lon: 0.5, lat: -0.2 });
        assert!(layer.take_edited());
        assert!(!layer.take_edited());
    }

    #[test]
    fn move_rejects_self_intersection() {
        let mut layer = BoundaryLayer::new(square());
        let projection = projection();
        // Pulling a corner across the opposite edge would twist the ring.
        assert!(!layer.move_node(0, GeoPos { lon: 1.5, lat: 0.5 }, &projection));
        assert!(!layer.take_edited());
        assert!(layer.move_node(0, GeoPos { lon: -0.2, lat: -0.2 }, &projection));
        assert_eq!(layer.ring()[0], GeoPos { lon: -0.2, lat: -0.2 });
        assert!(layer.take_edited());
    }

    #[test]
    fn remove_keeps_a_triangle() {
        let mut layer = BoundaryLayer::new(square());
        assert!(layer.remove_node(3));
        assert!(!layer.remove_node(0));
        assert_eq!(layer.ring().len(), 3);
    }

    #[test]
    fn boundary_as_any() {
        let mut layer = BoundaryLayer::new(square());
        assert!(layer.as_any().is::<BoundaryLayer>());
        assert!(layer.as_any_mut().is::<BoundaryLayer>());
    }
}
