//! Base map tile download and caching.

use egui::{Color32, Pos2, Rect, Sense, Ui, Vec2, pos2};
use eyre::Context;
use log::{debug, error};
use once_cell::sync::Lazy;
use poll_promise::Promise;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::MapConfig;
use crate::projection::MapProjection;
use crate::{MapError, TILE_SIZE, lat_to_y, lon_to_x};

// Reuse the reqwest client for all tile downloads by making it a static variable.
static CLIENT: Lazy<reqwest::blocking::Client> = Lazy::new(|| {
    reqwest::blocking::Client::builder()
        .user_agent(format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .expect("Failed to build reqwest client")
});

/// A unique identifier for a map tile.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct TileId {
    /// The zoom level.
    pub z: u8,

    /// The x-coordinate of the tile.
    pub x: u32,

    /// The y-coordinate of the tile.
    pub y: u32,
}

impl TileId {
    pub(crate) fn to_url(self, config: &dyn MapConfig) -> String {
        config.tile_url(&self)
    }
}

type TileResult = Result<egui::ColorImage, Arc<eyre::Report>>;

enum Tile {
    Loading(Promise<TileResult>),
    Loaded(egui::TextureHandle),
    Failed(Arc<eyre::Report>),
}

/// Downloaded tiles, keyed by id.
pub(crate) struct TileCache {
    tiles: HashMap<TileId, Tile>,
}

impl TileCache {
    pub(crate) fn new() -> Self {
        Self {
            tiles: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Draws every tile intersecting the projection's widget rect, starting downloads as needed.
    pub(crate) fn draw_visible(
        &mut self,
        ui: &mut Ui,
        projection: &MapProjection,
        config: &dyn MapConfig,
    ) {
        self.evict_other_zooms(projection.zoom());
        let painter = ui.painter_at(projection.widget_rect());
        for (tile_id, tile_pos) in visible_tiles(projection) {
            self.poll(ui, tile_id, config);
            self.draw(ui, &painter, tile_id, tile_pos);
        }
    }

    /// Drops tiles of zoom levels other than `zoom` and its neighbours.
    fn evict_other_zooms(&mut self, zoom: u8) {
        let before = self.tiles.len();
        self.tiles.retain(|id, _| id.z.abs_diff(zoom) <= 1);
        let evicted = before - self.tiles.len();
        if evicted > 0 {
            debug!("Evicted {} tiles outside zoom {}", evicted, zoom);
        }
    }

    fn poll(&mut self, ui: &Ui, tile_id: TileId, config: &dyn MapConfig) {
        let tile = self
            .tiles
            .entry(tile_id)
            .or_insert_with(|| Tile::Loading(download(tile_id.to_url(config))));

        if let Tile::Loading(promise) = tile {
            match promise.ready() {
                Some(Ok(color_image)) => {
                    let texture = ui.ctx().load_texture(
                        format!("tile_{}_{}_{}", tile_id.z, tile_id.x, tile_id.y),
                        color_image.clone(),
                        Default::default(),
                    );
                    *tile = Tile::Loaded(texture);
                }
                Some(Err(e)) => {
                    error!("{:?}", e);
                    *tile = Tile::Failed(e.clone());
                }
                None => {}
            }
        }
    }

    fn draw(&self, ui: &mut Ui, painter: &egui::Painter, tile_id: TileId, tile_pos: Pos2) {
        let tile_rect =
            Rect::from_min_size(tile_pos, Vec2::new(TILE_SIZE as f32, TILE_SIZE as f32));

        match self.tiles.get(&tile_id) {
            Some(Tile::Loaded(texture)) => {
                painter.image(
                    texture.id(),
                    tile_rect,
                    Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            Some(Tile::Failed(e)) => {
                placeholder(painter, tile_rect, "!", Color32::RED);
                let response = ui.interact(tile_rect, ui.id().with(tile_id), Sense::hover());
                response.on_hover_text(format!("{}", e));
            }
            _ => {
                placeholder(painter, tile_rect, "?", Color32::ORANGE);
                // Keep repainting until the download resolves.
                ui.ctx().request_repaint();
            }
        }
    }
}

fn placeholder(painter: &egui::Painter, rect: Rect, glyph: &str, color: Color32) {
    painter.rect_filled(rect, 0.0, Color32::from_gray(220));
    painter.rect_stroke(
        rect,
        0.0,
        egui::Stroke::new(1.0, Color32::GRAY),
        egui::StrokeKind::Inside,
    );
    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        glyph,
        egui::FontId::proportional(40.0),
        color,
    );
}

fn download(url: String) -> Promise<TileResult> {
    Promise::spawn_thread("download_tile", move || {
        let result: Result<_, eyre::Report> = (|| {
            debug!("Downloading tile from {}", &url);
            let response = CLIENT.get(&url).send().map_err(MapError::from)?;

            if !response.status().is_success() {
                return Err(MapError::TileDownloadError(response.status().to_string()));
            }

            let bytes = response.bytes().map_err(MapError::from)?.to_vec();
            let image = image::load_from_memory(&bytes)
                .map_err(MapError::from)?
                .to_rgba8();

            let size = [image.width() as _, image.height() as _];
            let pixels = image.into_raw();
            Ok(egui::ColorImage::from_rgba_unmultiplied(size, &pixels))
        })()
        .with_context(|| format!("Failed to download tile from {}", &url));

        result.map_err(Arc::new)
    })
}

/// Tiles covering the projection's widget rect with their screen positions.
///
/// Columns wrap around the antimeridian; rows outside the world are skipped.
pub(crate) fn visible_tiles(projection: &MapProjection) -> impl Iterator<Item = (TileId, Pos2)> {
    let rect = projection.widget_rect();
    let zoom = projection.zoom();
    let center = projection.unproject(rect.center());
    let center_x = lon_to_x(center.lon, zoom);
    let center_y = lat_to_y(center.lat, zoom);

    let half_w = rect.width() as f64 / 2.0 / TILE_SIZE as f64;
    let half_h = rect.height() as f64 / 2.0 / TILE_SIZE as f64;

    let x_min = (center_x - half_w).floor() as i64;
    let x_max = (center_x + half_w).ceil() as i64;
    let y_min = ((center_y - half_h).floor() as i64).max(0);
    let world = 1_i64 << zoom;
    let y_max = ((center_y + half_h).ceil() as i64).min(world - 1);

    let rect_center = rect.center();
    (x_min..=x_max).flat_map(move |x| {
        (y_min..=y_max).map(move |y| {
            let tile_id = TileId {
                z: zoom,
                x: x.rem_euclid(world) as u32,
                y: y as u32,
            };
            let offset = egui::vec2(
                ((x as f64 - center_x) * TILE_SIZE as f64) as f32,
                ((y as f64 - center_y) * TILE_SIZE as f64) as f32,
            );
            (tile_id, rect_center + offset)
        })
    })
}
