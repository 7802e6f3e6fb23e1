//! GeoJSON import for features and export for boundaries.

use super::boundary::BoundaryLayer;
use super::features::{FeatureGeometry, FeatureLayer, MapFeature};
use crate::projection::GeoPos;
use crate::region::Region;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use log::debug;
use thiserror::Error;

/// Errors that can occur while loading features from GeoJSON.
#[derive(Error, Debug)]
pub enum FeatureLoadError {
    /// The text is not valid GeoJSON.
    #[error("Invalid GeoJSON")]
    Parse(#[from] geojson::Error),

    /// A feature has no geometry or a geometry type the layer cannot draw.
    #[error("Unsupported geometry `{0}`")]
    UnsupportedGeometry(String),

    /// A position has fewer than two coordinates.
    #[error("Position needs longitude and latitude")]
    ShortPosition,
}

fn geo_pos_to_vec(gp: &GeoPos) -> Vec<f64> {
    vec![gp.lon, gp.lat]
}

fn vec_to_geo_pos(pos: &[f64]) -> Result<GeoPos, FeatureLoadError> {
    match pos {
        [lon, lat, ..] => Ok(GeoPos {
            lon: *lon,
            lat: *lat,
        }),
        _ => Err(FeatureLoadError::ShortPosition),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Closed GeoJSON ring from an open one.
fn closed_ring(points: &[GeoPos]) -> Vec<Vec<f64>> {
    points
        .iter()
        .chain(points.first())
        .map(geo_pos_to_vec)
        .collect()
}

impl TryFrom<Feature> for MapFeature {
    type Error = FeatureLoadError;

    fn try_from(feature: Feature) -> Result<Self, Self::Error> {
        let geometry = feature
            .geometry
            .ok_or_else(|| FeatureLoadError::UnsupportedGeometry("none".to_string()))?;

        let geometry = match geometry.value {
            Value::Point(pos) => FeatureGeometry::Point(vec_to_geo_pos(&pos)?),
            Value::Polygon(mut rings) => {
                if rings.is_empty() {
                    return Err(FeatureLoadError::UnsupportedGeometry(
                        "empty Polygon".to_string(),
                    ));
                }
                // Holes are not drawn.
                let exterior = rings.swap_remove(0);
                let mut points = exterior
                    .iter()
                    .map(|p| vec_to_geo_pos(p))
                    .collect::<Result<Vec<_>, _>>()?;
                if points.len() > 1 && points.first() == points.last() {
                    points.pop();
                }
                FeatureGeometry::Polygon(points)
            }
            other => {
                return Err(FeatureLoadError::UnsupportedGeometry(
                    value_kind(&other).to_string(),
                ));
            }
        };

        Ok(MapFeature {
            geometry,
            properties: feature.properties.unwrap_or_default(),
        })
    }
}

impl From<&Region> for Feature {
    fn from(region: &Region) -> Self {
        Feature {
            geometry: Some(Geometry::new(Value::Polygon(vec![closed_ring(&region.ring())]))),
            ..Feature::default()
        }
    }
}

impl FeatureLayer {
    /// Loads the drawable features of a GeoJSON document. Features with unsupported geometry are
    /// skipped; any other problem fails the whole load.
    pub fn from_geojson_str(s: &str) -> Result<Self, FeatureLoadError> {
        let features = match s.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(geometry) => vec![Feature::from(geometry)],
        };

        let mut loaded = Vec::with_capacity(features.len());
        for feature in features {
            match MapFeature::try_from(feature) {
                Ok(f) => loaded.push(f),
                Err(FeatureLoadError::UnsupportedGeometry(kind)) => {
                    debug!("Skipping feature with geometry {}", kind)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(FeatureLayer::new(loaded))
    }
}

impl BoundaryLayer {
    /// The boundary as a GeoJSON feature collection with one polygon.
    pub fn to_geojson_str(&self) -> Result<String, serde_json::Error> {
        let region = Region::Polygon(self.ring().to_vec());
        let collection = FeatureCollection {
            bbox: None,
            features: vec![Feature::from(&region)],
            foreign_members: None,
        };
        serde_json::to_string(&collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BUILDINGS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [10.0, 20.0] },
                "properties": { "_timestamp": 1400000000, "_userExperience": 12 }
            },
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                },
                "properties": { "_timestamp": 1500000000 }
            },
            {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] },
                "properties": {}
            }
        ]
    }"#;

    #[test]
    fn loads_points_and_polygons() {
        let layer = FeatureLayer::from_geojson_str(BUILDINGS).unwrap();
        let features = layer.features();
        assert_eq!(features.len(), 2);
        assert_eq!(
            features[0].geometry,
            FeatureGeometry::Point(GeoPos { lon: 10.0, lat: 20.0 })
        );
        assert_eq!(features[0].properties.get("_userExperience"), Some(&json!(12)));
        match &features[1].geometry {
            FeatureGeometry::Polygon(ring) => assert_eq!(ring.len(), 3),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn invalid_json_fails() {
        assert!(matches!(
            FeatureLayer::from_geojson_str("{ not json"),
            Err(FeatureLoadError::Parse(_))
        ));
    }

    #[test]
    fn short_position_fails() {
        let doc = r#"{ "type": "Point", "coordinates": [10.0] }"#;
        assert!(FeatureLayer::from_geojson_str(doc).is_err());
    }

    #[test]
    fn boundary_exports_closed_ring() {
        let region = Region::BBox([0.0, 0.0, 2.0, 1.0]);
        let layer = BoundaryLayer::new(region.ring());
        let text = layer.to_geojson_str().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let ring = &value["features"][0]["geometry"]["coordinates"][0];
        assert_eq!(ring.as_array().unwrap().len(), 5);
        assert_eq!(ring[0], ring[4]);
    }
}
