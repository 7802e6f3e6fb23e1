#![warn(missing_docs)]

//! A map view component for `egui` that binds a slippy map to application state.
//!
//! The crate provides a `Map` widget (tiles, panning, zooming and a stack of layers) and a
//! [`view::RegionMapView`] that keeps the map in sync with a [`state::Store`]: it renders the
//! selected region as an editable boundary, moves the camera when the region changes, and pushes
//! time and experience range filters into a feature layer.
//!
//! # Example
//!
//! ```no_run
//! use eframe::egui;
//! use egui_region_map::{config::OpenStreetMapConfig, state::Store, view::{RegionMapView, UrlParams}};
//!
//! struct MyApp {
//!     store: Store,
//!     view: RegionMapView,
//! }
//!
//! impl Default for MyApp {
//!     fn default() -> Self {
//!         let mut store = Store::default();
//!         let mut view = RegionMapView::new(OpenStreetMapConfig::default());
//!         view.mount(&mut store, UrlParams::default());
//!         Self { store, view }
//!     }
//! }
//!
//! impl eframe::App for MyApp {
//!     fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
//!         egui::CentralPanel::default()
//!             .frame(egui::Frame::NONE)
//!             .show(ctx, |ui| {
//!                 self.view.ui(ui, &mut self.store);
//!             });
//!     }
//! }
//! ```

/// Animated camera moves.
pub mod camera;

/// Configuration traits and types for the map widget.
pub mod config;

/// Debouncing of bursty events.
pub mod debounce;

/// Attribute filters for rendered features.
pub mod filter;

/// Viewport transition decisions.
pub mod geometry;

/// Map layers.
pub mod layers;

/// Map projection.
pub mod projection;

/// Selected regions and their URL form.
pub mod region;

/// Application state store.
pub mod state;

mod tiles;

/// The region map view component.
pub mod view;

use eframe::egui;
use egui::{Color32, Rect, Response, Sense, Ui, Widget, pos2, vec2};
use log::debug;
use std::time::Instant;
use thiserror::Error;

use crate::camera::{CameraView, FlyTo};
use crate::config::{MapConfig, ViewPadding};
use crate::layers::Layer;
use crate::projection::{GeoBounds, GeoPos, MAX_LATITUDE, MapProjection};
use crate::tiles::TileCache;

pub use crate::tiles::TileId;

// The size of a map tile in pixels.
const TILE_SIZE: u32 = 256;
/// The minimum zoom level.
pub const MIN_ZOOM: u8 = 0;
/// The maximum zoom level.
pub const MAX_ZOOM: u8 = 19;

/// Errors that can occur while using the map widget.
#[derive(Error, Debug)]
pub enum MapError {
    /// An error occurred while making a web request.
    #[error("Connection error")]
    ConnectionError(#[from] reqwest::Error),

    /// A map tile failed to download.
    #[error("A map tile failed to download. HTTP Status: `{0}`")]
    TileDownloadError(String),

    /// The downloaded tile bytes could not be converted to an image.
    #[error("Unable to convert downloaded map tile bytes as image")]
    TileBytesConversionError(#[from] image::ImageError),
}

/// The map widget.
pub struct Map {
    /// The geographical center of the map.
    pub center: GeoPos,

    /// The zoom level of the map.
    pub zoom: u8,

    /// The geographical position under the mouse pointer, if any.
    pub mouse_pos: Option<GeoPos>,

    tiles: TileCache,
    layers: Vec<(String, Box<dyn Layer>)>,
    animation: Option<FlyTo>,
    rect: Rect,

    /// Configuration for the map, such as the tile server URL.
    config: Box<dyn MapConfig>,
}

impl Map {
    /// Creates a new `Map` widget.
    ///
    /// # Arguments
    ///
    /// * `config` - A type that implements `MapConfig`, which provides configuration for the map.
    pub fn new<C: MapConfig + 'static>(config: C) -> Self {
        let center = config.default_center();
        let zoom = config.default_zoom();
        Self {
            center,
            zoom,
            mouse_pos: None,
            tiles: TileCache::new(),
            layers: Vec::new(),
            animation: None,
            // Replaced by the allocated widget rect on the first frame.
            rect: Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0)),
            config: Box::new(config),
        }
    }

    /// Adds a layer on top of the existing ones. A layer with the same key is replaced in place.
    pub fn add_layer(&mut self, key: impl Into<String>, layer: impl Layer) {
        let key = key.into();
        let layer: Box<dyn Layer> = Box::new(layer);
        if let Some(slot) = self.layers.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = layer;
        } else {
            self.layers.push((key, layer));
        }
    }

    /// Removes a layer, returning it if it existed.
    pub fn remove_layer(&mut self, key: &str) -> Option<Box<dyn Layer>> {
        let index = self.layers.iter().position(|(k, _)| k == key)?;
        Some(self.layers.remove(index).1)
    }

    /// Keys of all layers, bottom to top.
    pub fn layer_keys(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(k, _)| k.as_str())
    }

    /// Whether a layer with `key` exists.
    pub fn has_layer(&self, key: &str) -> bool {
        self.layers.iter().any(|(k, _)| k == key)
    }

    /// Gets a layer by key, downcast to its concrete type.
    pub fn layer<T: Layer>(&self, key: &str) -> Option<&T> {
        self.layers
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, l)| l.as_any().downcast_ref::<T>())
    }

    /// Gets a mutable layer by key, downcast to its concrete type.
    pub fn layer_mut<T: Layer>(&mut self, key: &str) -> Option<&mut T> {
        self.layers
            .iter_mut()
            .find(|(k, _)| k == key)
            .and_then(|(_, l)| l.as_any_mut().downcast_mut::<T>())
    }

    /// The screen rect the map occupied on the last frame.
    pub fn viewport(&self) -> Rect {
        self.rect
    }

    /// Sets the screen rect of the map. The widget does this itself on every frame.
    pub fn set_viewport(&mut self, rect: Rect) {
        self.rect = rect;
    }

    /// The projection for the current view.
    pub fn projection(&self) -> MapProjection {
        MapProjection::new(self.zoom, self.center, self.rect)
    }

    /// The geographical bounds currently visible.
    pub fn bounds(&self) -> GeoBounds {
        self.projection().unproject_rect(self.rect)
    }

    /// Whether a fly animation is in progress.
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Moves the camera immediately so that `bounds` fits inside the padded viewport.
    pub fn fit_bounds(&mut self, bounds: GeoBounds, padding: ViewPadding) {
        let target = self.view_for_bounds(bounds, padding);
        debug!("Snapping to {:?}", target);
        self.animation = None;
        self.center = target.center;
        self.zoom = target.zoom;
    }

    /// Animates the camera towards the view that fits `bounds` inside the padded viewport.
    pub fn fly_to_bounds(&mut self, bounds: GeoBounds, padding: ViewPadding) {
        let target = self.view_for_bounds(bounds, padding);
        debug!("Flying to {:?}", target);
        let from = CameraView {
            center: self.center,
            zoom: self.zoom,
        };
        self.animation = Some(FlyTo::new(from, target, Instant::now()));
    }

    /// Advances the fly animation to `now`. Returns `true` while it is still running.
    pub fn step_animation(&mut self, now: Instant) -> bool {
        let Some(animation) = &self.animation else {
            return false;
        };
        let (view, finished) = animation.view_at(now);
        self.center = view.center;
        self.zoom = view.zoom;
        if finished {
            self.animation = None;
        }
        !finished
    }

    /// The largest zoom at which `bounds` fits the padded viewport, centered in the padded area.
    fn view_for_bounds(&self, bounds: GeoBounds, padding: ViewPadding) -> CameraView {
        let available_w = (self.rect.width() - padding.horizontal()) as f64;
        let available_h = (self.rect.height() - padding.vertical()) as f64;

        let north = bounds.north.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let south = bounds.south.clamp(-MAX_LATITUDE, MAX_LATITUDE);

        let fits = |z: u8| {
            let w = (lon_to_x(bounds.east, z) - lon_to_x(bounds.west, z)) * TILE_SIZE as f64;
            let h = (lat_to_y(south, z) - lat_to_y(north, z)) * TILE_SIZE as f64;
            w <= available_w && h <= available_h
        };
        let zoom = (MIN_ZOOM..=MAX_ZOOM)
            .take_while(|z| fits(*z))
            .last()
            .unwrap_or(MIN_ZOOM);

        // Shift the center so the bounds sit in the middle of the unpadded area.
        let offset_x = (padding.right - padding.left) as f64 / 2.0 / TILE_SIZE as f64;
        let offset_y = (padding.bottom - padding.top) as f64 / 2.0 / TILE_SIZE as f64;
        let center_x = (lon_to_x(bounds.west, zoom) + lon_to_x(bounds.east, zoom)) / 2.0;
        let center_y = (lat_to_y(north, zoom) + lat_to_y(south, zoom)) / 2.0;

        CameraView {
            center: GeoPos {
                lon: x_to_lon(center_x + offset_x, zoom),
                lat: y_to_lat(center_y + offset_y, zoom),
            },
            zoom,
        }
    }

    /// Handles user input for panning and zooming.
    fn handle_input(&mut self, ui: &Ui, response: &Response) {
        let rect = self.rect;

        if response.dragged() {
            self.animation = None;
            let delta = response.drag_delta();
            let mut center_x =
                lon_to_x(self.center.lon, self.zoom) - (delta.x as f64 / TILE_SIZE as f64);
            let mut center_y =
                lat_to_y(self.center.lat, self.zoom) - (delta.y as f64 / TILE_SIZE as f64);

            // Clamp the new center to the map boundaries.
            let world_size_in_tiles = 2.0_f64.powi(self.zoom as i32);
            let half_view_x = rect.width() as f64 / TILE_SIZE as f64 / 2.0;
            let half_view_y = rect.height() as f64 / TILE_SIZE as f64 / 2.0;
            center_x = clamp_or_center(center_x, half_view_x, world_size_in_tiles);
            center_y = clamp_or_center(center_y, half_view_y, world_size_in_tiles);

            self.center = GeoPos {
                lon: x_to_lon(center_x, self.zoom),
                lat: y_to_lat(center_y, self.zoom),
            };
        }

        if response.double_clicked() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                let new_zoom = (self.zoom + 1).clamp(MIN_ZOOM, MAX_ZOOM);
                if new_zoom != self.zoom {
                    self.animation = None;
                    self.center = self.projection().unproject(pointer_pos);
                    self.zoom = new_zoom;
                }
            }
        }

        self.mouse_pos = None;
        if let Some(mouse_pos) = response.hover_pos() {
            let projection = self.projection();
            let target = projection.unproject(mouse_pos);
            self.mouse_pos = Some(target);

            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let old_zoom = self.zoom;
                let mut new_zoom = (old_zoom as i32 + scroll.signum() as i32)
                    .clamp(MIN_ZOOM as i32, MAX_ZOOM as i32) as u8;

                // Refuse zooming out past the point where the world is smaller than the widget.
                if scroll < 0.0 {
                    let world_pixel_size = 2.0_f64.powi(new_zoom as i32) * TILE_SIZE as f64;
                    if world_pixel_size < rect.width() as f64
                        || world_pixel_size < rect.height() as f64
                    {
                        new_zoom = old_zoom;
                    }
                }

                if new_zoom != old_zoom {
                    self.animation = None;
                    // Keep the geo-coordinate under the mouse fixed.
                    let rel = mouse_pos - rect.center();
                    let new_center_x =
                        lon_to_x(target.lon, new_zoom) - rel.x as f64 / TILE_SIZE as f64;
                    let new_center_y =
                        lat_to_y(target.lat, new_zoom) - rel.y as f64 / TILE_SIZE as f64;
                    self.zoom = new_zoom;
                    self.center = GeoPos {
                        lon: x_to_lon(new_center_x, new_zoom),
                        lat: y_to_lat(new_center_y, new_zoom),
                    };
                }
            }
        }
    }

    /// Draws the attribution text.
    fn draw_attribution(&self, ui: &mut Ui) {
        if let Some(attribution) = self.config.attribution() {
            let bg_color = if ui.visuals().dark_mode {
                Color32::from_black_alpha(150)
            } else {
                Color32::from_white_alpha(150)
            };

            let frame = egui::Frame::NONE
                .inner_margin(egui::Margin::same(5))
                .fill(bg_color)
                .corner_radius(3.0);

            egui::Area::new(ui.id().with("attribution"))
                .fixed_pos(self.rect.left_bottom())
                .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(5.0, -5.0))
                .show(ui.ctx(), |ui| {
                    frame.show(ui, |ui| {
                        ui.style_mut().override_text_style = Some(egui::TextStyle::Small);
                        ui.style_mut().wrap_mode = Some(egui::TextWrapMode::Extend);

                        if let Some(url) = self.config.attribution_url() {
                            ui.hyperlink_to(attribution, url);
                        } else {
                            ui.label(attribution);
                        }
                    });
                });
        }
    }
}

fn clamp_or_center(value: f64, half_view: f64, world: f64) -> f64 {
    let (min, max) = (half_view, world - half_view);
    // A world smaller than the viewport is centered.
    if min > max {
        world / 2.0
    } else {
        value.clamp(min, max)
    }
}

/// Converts longitude to the x-coordinate of a tile at a given zoom level.
pub(crate) fn lon_to_x(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * (2.0_f64.powi(zoom as i32))
}

/// Converts latitude to the y-coordinate of a tile at a given zoom level.
pub(crate) fn lat_to_y(lat: f64, zoom: u8) -> f64 {
    (1.0 - lat.to_radians().tan().asinh() / std::f64::consts::PI) / 2.0
        * (2.0_f64.powi(zoom as i32))
}

/// Converts the x-coordinate of a tile to longitude at a given zoom level.
pub(crate) fn x_to_lon(x: f64, zoom: u8) -> f64 {
    x / (2.0_f64.powi(zoom as i32)) * 360.0 - 180.0
}

/// Converts the y-coordinate of a tile to latitude at a given zoom level.
pub(crate) fn y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / (2.0_f64.powi(zoom as i32));
    n.sinh().atan().to_degrees()
}

impl Widget for &mut Map {
    fn ui(self, ui: &mut Ui) -> Response {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), Sense::drag().union(Sense::click()));
        self.rect = rect;

        if self.step_animation(Instant::now()) {
            ui.ctx().request_repaint();
        }

        // Topmost layer gets the first chance to consume input.
        let projection = self.projection();
        let mut handled = false;
        for (_, layer) in self.layers.iter_mut().rev() {
            if layer.handle_input(&response, &projection) {
                handled = true;
                break;
            }
        }
        if !handled {
            self.handle_input(ui, &response);
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_rgb(220, 220, 220));

        let projection = self.projection();
        self.tiles
            .draw_visible(ui, &projection, self.config.as_ref());
        for (_, layer) in &self.layers {
            layer.draw(&painter, &projection);
        }

        self.draw_attribution(ui);

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DynMapConfig;

    const EPSILON: f64 = 1e-9;

    fn test_map() -> Map {
        let mut map = Map::new(DynMapConfig::new(|_| String::new()));
        map.set_viewport(Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0)));
        map
    }

    #[test]
    fn test_coord_conversion_roundtrip() {
        let zoom: u8 = 10;
        for (lon, lat) in [(24.93545, 60.16952), (-122.4194, 37.7749)] {
            let final_lon = x_to_lon(lon_to_x(lon, zoom), zoom);
            let final_lat = y_to_lat(lat_to_y(lat, zoom), zoom);
            assert!((lon - final_lon).abs() < EPSILON);
            assert!((lat - final_lat).abs() < EPSILON);
        }
    }

    #[test]
    fn test_y_to_lat_conversion() {
        // y, zoom, expected_lat
        let test_cases = vec![
            (0.5, 0, 0.0),
            (128.0, 8, 0.0),
            (0.0, 0, 85.0511287798),
            (1.0, 0, -85.0511287798),
            (9.262574089998255, 5, 60.16952),
        ];

        for (y, zoom, expected_lat) in test_cases {
            assert!((y_to_lat(y, zoom) - expected_lat).abs() < EPSILON);
        }
    }

    #[test]
    fn test_lon_to_x_conversion() {
        // lon, zoom, expected_x
        let test_cases = vec![
            (0.0, 0, 0.5),
            (0.0, 8, 128.0),
            (-180.0, 0, 0.0),
            (180.0, 8, 256.0),
            (24.93545, 5, 18.216484444444444),
        ];

        for (lon, zoom, expected_x) in test_cases {
            assert!((lon_to_x(lon, zoom) - expected_x).abs() < EPSILON);
        }
    }

    #[test]
    fn test_map_new() {
        let map = Map::new(DynMapConfig::new(|_| String::new()));
        assert_eq!(map.center, GeoPos { lon: 35.0, lat: 0.0 });
        assert_eq!(map.zoom, 2);
        assert!(map.mouse_pos.is_none());
        assert_eq!(map.tiles.len(), 0);
        assert_eq!(map.layer_keys().count(), 0);
        assert!(!map.is_animating());
    }

    #[test]
    fn bounds_are_centered_on_map_center() {
        let mut map = test_map();
        map.center = GeoPos { lon: 10.0, lat: 0.0 };
        map.zoom = 4;
        let bounds = map.bounds();
        assert!((bounds.center().lon - 10.0).abs() < 1e-6);
        assert!(bounds.center().lat.abs() < 1e-6);
        assert!(bounds.west < bounds.east);
        assert!(bounds.south < bounds.north);
    }

    #[test]
    fn fit_bounds_without_padding_contains_bounds() {
        let mut map = test_map();
        let target = GeoBounds::from_bbox([10.0, 40.0, 12.0, 42.0]);
        let padding = ViewPadding {
            left: 0.0,
            top: 0.0,
            right: 0.0,
            bottom: 0.0,
        };
        map.fit_bounds(target, padding);

        let visible = map.bounds();
        assert!(visible.west <= target.west && visible.east >= target.east);
        assert!(visible.south <= target.south && visible.north >= target.north);
        assert!((map.center.lon - 11.0).abs() < 1e-6);

        // One more zoom level would no longer fit.
        map.zoom += 1;
        let visible = map.bounds();
        assert!(
            visible.west > target.west
                || visible.east < target.east
                || visible.south > target.south
                || visible.north < target.north
        );
    }

    #[test]
    fn fit_bounds_offsets_center_for_asymmetric_padding() {
        let mut map = test_map();
        let target = GeoBounds::from_bbox([10.0, -1.0, 12.0, 1.0]);
        map.fit_bounds(target, ViewPadding::default());
        // More padding at the bottom pushes the center south of the bounds' center.
        assert!(map.center.lat < 0.0);
        let projection = map.projection();
        let top = projection.project(GeoPos { lon: 11.0, lat: 1.0 });
        let bottom = projection.project(GeoPos { lon: 11.0, lat: -1.0 });
        assert!(top.y >= 62.0 - 1e-3);
        assert!(bottom.y <= 600.0 - 222.0 + 1e-3);
    }

    #[test]
    fn fly_to_bounds_animates_to_fit_target() {
        let mut map = test_map();
        let target = GeoBounds::from_bbox([10.0, 40.0, 12.0, 42.0]);
        let mut snapped = test_map();
        snapped.fit_bounds(target, ViewPadding::default());

        map.fly_to_bounds(target, ViewPadding::default());
        assert!(map.is_animating());
        assert!(!map.step_animation(Instant::now() + camera::FLY_DURATION));
        assert!(!map.is_animating());
        assert_eq!(map.zoom, snapped.zoom);
        assert!((map.center.lon - snapped.center.lon).abs() < 1e-9);
        assert!((map.center.lat - snapped.center.lat).abs() < 1e-9);
    }

    #[test]
    fn fit_bounds_cancels_flight() {
        let mut map = test_map();
        map.fly_to_bounds(GeoBounds::from_bbox([0.0, 0.0, 1.0, 1.0]), ViewPadding::default());
        map.fit_bounds(GeoBounds::from_bbox([5.0, 5.0, 6.0, 6.0]), ViewPadding::default());
        assert!(!map.is_animating());
    }
}
