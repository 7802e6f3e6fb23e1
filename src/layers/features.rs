//! A layer rendering data features, narrowed down by attribute sub-filters.
//!
//! Each [`FilterKind`] owns one sub-filter slot. The effective filter is the conjunction of all
//! occupied slots, so setting the time filter never disturbs the experience filter.

use crate::filter::{FilterExpr, FilterKind, Properties};
use crate::layers::Layer;
use crate::projection::{GeoPos, MapProjection};
use egui::{Color32, Mesh, Painter, Pos2, Response, Shape, Stroke};
use log::{debug, warn};
use std::any::Any;
use std::collections::BTreeMap;

/// The shape of a feature.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureGeometry {
    /// A single position.
    Point(GeoPos),
    /// An open ring.
    Polygon(Vec<GeoPos>),
}

/// A feature drawn by the layer.
#[derive(Clone, Debug, PartialEq)]
pub struct MapFeature {
    /// Where the feature is.
    pub geometry: FeatureGeometry,
    /// Attributes used by filters.
    pub properties: Properties,
}

/// Layer holding features and their active sub-filters.
#[derive(Clone, Debug)]
pub struct FeatureLayer {
    features: Vec<MapFeature>,
    sub_filters: BTreeMap<FilterKind, FilterExpr>,

    /// Outline of polygon features.
    pub stroke: Stroke,

    /// Fill of polygon features and points.
    pub fill: Color32,

    /// Radius of point features.
    pub point_radius: f32,
}

impl Default for FeatureLayer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeatureLayer {
    /// Creates a layer showing `features`, initially unfiltered.
    pub fn new(features: Vec<MapFeature>) -> Self {
        Self {
            features,
            sub_filters: BTreeMap::new(),
            stroke: Stroke::new(1.0, Color32::from_rgb(200, 60, 40)),
            fill: Color32::from_rgba_unmultiplied(230, 80, 50, 120),
            point_radius: 3.0,
        }
    }

    /// All features regardless of filters.
    pub fn features(&self) -> &[MapFeature] {
        &self.features
    }

    /// Replaces the sub-filter for `kind`.
    pub fn set_sub_filter(&mut self, kind: FilterKind, expr: FilterExpr) {
        debug!("Sub-filter {:?} set to {}", kind, expr.to_json());
        self.sub_filters.insert(kind, expr);
    }

    /// The sub-filter for `kind`, if one was set.
    pub fn sub_filter(&self, kind: FilterKind) -> Option<&FilterExpr> {
        self.sub_filters.get(&kind)
    }

    /// The conjunction of all sub-filters, or `None` when unfiltered.
    pub fn filter(&self) -> Option<FilterExpr> {
        if self.sub_filters.is_empty() {
            None
        } else {
            Some(FilterExpr::All(self.sub_filters.values().cloned().collect()))
        }
    }

    /// Features passing every sub-filter.
    pub fn visible_features(&self) -> impl Iterator<Item = &MapFeature> {
        self.features.iter().filter(|f| {
            self.sub_filters
                .values()
                .all(|expr| expr.matches(&f.properties))
        })
    }

    fn draw_polygon(&self, painter: &Painter, screen_points: Vec<Pos2>) {
        let flat: Vec<f64> = screen_points
            .iter()
            .flat_map(|p| [p.x as f64, p.y as f64])
            .collect();
        match earcutr::earcut(&flat, &[], 2) {
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
            Err(e) => warn!("Unable to triangulate feature: {:?}", e),
        }
        painter.add(Shape::closed_line(screen_points, self.stroke));
    }
}

impl Layer for FeatureLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, _response: &Response, _projection: &MapProjection) -> bool {
        false
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        let clip = painter.clip_rect();
        for feature in self.visible_features() {
            match &feature.geometry {
                FeatureGeometry::Point(pos) => {
                    let p = projection.project(*pos);
                    if clip.expand(self.point_radius).contains(p) {
                        painter.circle_filled(p, self.point_radius, self.fill);
                    }
                }
                FeatureGeometry::Polygon(ring) if ring.len() >= 3 => {
                    let screen: Vec<Pos2> = ring.iter().map(|p| projection.project(*p)).collect();
                    if clip.intersects(egui::Rect::from_points(&screen)) {
                        self.draw_polygon(painter, screen);
                    }
                }
                FeatureGeometry::Polygon(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterRange;
    use serde_json::json;

    fn building(lon: f64, timestamp: f64, experience: f64) -> MapFeature {
        let mut properties = Properties::new();
        properties.insert("_timestamp".to_string(), json!(timestamp));
        properties.insert("_userExperience".to_string(), json!(experience));
        MapFeature {
            geometry: FeatureGeometry::Point(GeoPos { lon, lat: 0.0 }),
            properties,
        }
    }

    fn layer() -> FeatureLayer {
        FeatureLayer::new(vec![
            building(0.0, 100.0, 1.0),
            building(1.0, 200.0, 50.0),
            building(2.0, 300.0, 500.0),
        ])
    }

    #[test]
    fn unfiltered_shows_everything() {
        let layer = layer();
        assert!(layer.filter().is_none());
        assert_eq!(layer.visible_features().count(), 3);
    }

    #[test]
    fn sub_filters_combine() {
        let mut layer = layer();
        layer.set_sub_filter(
            FilterKind::Time,
            FilterExpr::for_range(FilterKind::Time, Some(FilterRange::new(150.0, 300.0))),
        );
        assert_eq!(layer.visible_features().count(), 2);
        layer.set_sub_filter(
            FilterKind::Experience,
            FilterExpr::for_range(FilterKind::Experience, Some(FilterRange::new(0.0, 100.0))),
        );
        let visible: Vec<_> = layer.visible_features().collect();
        assert_eq!(visible, vec![&layer.features()[1]]);
    }

    #[test]
    fn cleared_sub_filter_hides_everything() {
        let mut layer = layer();
        layer.set_sub_filter(FilterKind::Time, FilterExpr::for_range(FilterKind::Time, None));
        assert_eq!(layer.visible_features().count(), 0);
    }

    #[test]
    fn setting_same_filter_twice_is_idempotent() {
        let mut layer = layer();
        let expr = FilterExpr::for_range(FilterKind::Time, Some(FilterRange::new(0.0, 250.0)));
        layer.set_sub_filter(FilterKind::Time, expr.clone());
        let once = layer.filter();
        layer.set_sub_filter(FilterKind::Time, expr);
        assert_eq!(layer.filter(), once);
        assert_eq!(layer.visible_features().count(), 2);
    }

    #[test]
    fn feature_layer_as_any() {
        let layer = FeatureLayer::default();
        assert!(layer.as_any().is::<FeatureLayer>());
    }
}
