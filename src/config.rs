//! Configuration for map providers and for the region view.

use std::time::Duration;

use crate::TileId;
use crate::projection::GeoPos;

/// Configuration for a map provider.
pub trait MapConfig {
    /// Returns the URL for a given tile.
    fn tile_url(&self, tile: &TileId) -> String;

    /// Returns the attribution text to be displayed on the map. If returns `None`, no attribution is shown.
    fn attribution(&self) -> Option<&String>;

    /// Returns the attribution URL to be linked from the attribution text.
    fn attribution_url(&self) -> Option<&String>;

    /// The default geographical center of the map.
    fn default_center(&self) -> GeoPos;

    /// The default zoom level of the map.
    fn default_zoom(&self) -> u8;
}

// The whole world, slightly shifted east so Africa and Asia are in view.
const WORLD_CENTER: GeoPos = GeoPos { lon: 35.0, lat: 0.0 };
const WORLD_ZOOM: u8 = 2;

/// Configuration for the OpenStreetMap tile server.
///
/// # Example
///
/// ```
/// use egui_region_map::config::OpenStreetMapConfig;
/// let config = OpenStreetMapConfig::default();
/// ```
#[cfg(feature = "openstreetmap")]
pub struct OpenStreetMapConfig {
    base_url: String,
    attribution: String,
    attribution_url: String,
    default_center: GeoPos,
    default_zoom: u8,
}

#[cfg(feature = "openstreetmap")]
impl Default for OpenStreetMapConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tile.openstreetmap.org".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            attribution_url: "https://www.openstreetmap.org/copyright".to_string(),
            default_center: WORLD_CENTER,
            default_zoom: WORLD_ZOOM,
        }
    }
}

#[cfg(feature = "openstreetmap")]
impl MapConfig for OpenStreetMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        format!("{}/{}/{}/{}.png", self.base_url, tile.z, tile.x, tile.y)
    }

    fn attribution(&self) -> Option<&String> {
        Some(&self.attribution)
    }

    fn attribution_url(&self) -> Option<&String> {
        Some(&self.attribution_url)
    }

    fn default_center(&self) -> GeoPos {
        self.default_center
    }

    fn default_zoom(&self) -> u8 {
        self.default_zoom
    }
}

/// Configuration for the Karttapaikka tile server.
#[cfg(feature = "karttapaikka")]
pub struct KarttapaikkaMapConfig {
    base_url: String,
    attribution: String,
    attribution_url: String,
    api_key: String,
}

#[cfg(feature = "karttapaikka")]
impl KarttapaikkaMapConfig {
    /// Creates a new `KarttapaikkaMapConfig` with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            base_url: "https://avoin-karttakuva.maanmittauslaitos.fi/avoin/wmts/1.0.0/maastokartta/default/WGS84_Pseudo-Mercator".to_string(),
            attribution: "© Maanmittauslaitos".to_string(),
            attribution_url: "https://www.maanmittauslaitos.fi/asioi-verkossa/karttapaikka".to_string(),
            api_key,
        }
    }
}

#[cfg(feature = "karttapaikka")]
impl MapConfig for KarttapaikkaMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        // WMTS orders the path as row before column.
        format!(
            "{}/{}/{}/{}.png?api-key={}",
            self.base_url, tile.z, tile.y, tile.x, self.api_key
        )
    }

    fn attribution(&self) -> Option<&String> {
        Some(&self.attribution)
    }

    fn attribution_url(&self) -> Option<&String> {
        Some(&self.attribution_url)
    }

    fn default_center(&self) -> GeoPos {
        GeoPos {
            lon: 24.93545,
            lat: 60.16952,
        }
    }

    fn default_zoom(&self) -> u8 {
        5
    }
}

/// A dynamic map configuration that allows defining a custom tile URL function at runtime.
///
/// # Example
///
/// ```
/// use egui_region_map::config::DynMapConfig;
/// let config = DynMapConfig::new(|tile| format!("https://my-tile-server/{}/{}/{}.png", tile.z, tile.x, tile.y));
/// ```
pub struct DynMapConfig {
    tile_url: Box<dyn Fn(&TileId) -> String>,
}

impl DynMapConfig {
    /// Creates a new `DynMapConfig` with a custom tile URL function.
    pub fn new(tile_url: impl Fn(&TileId) -> String + 'static) -> Self {
        Self {
            tile_url: Box::new(tile_url),
        }
    }
}

impl MapConfig for DynMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        (self.tile_url)(tile)
    }

    fn attribution(&self) -> Option<&String> {
        None
    }

    fn attribution_url(&self) -> Option<&String> {
        None
    }

    fn default_center(&self) -> GeoPos {
        WORLD_CENTER
    }

    fn default_zoom(&self) -> u8 {
        WORLD_ZOOM
    }
}

/// Screen space reserved for UI chrome drawn on top of the map, in points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewPadding {
    /// Left inset.
    pub left: f32,
    /// Top inset.
    pub top: f32,
    /// Right inset.
    pub right: f32,
    /// Bottom inset.
    pub bottom: f32,
}

/// Height of the header bar.
const HEADER_HEIGHT: f32 = 52.0;
/// Height of the statistics panel docked to the bottom.
const PANEL_HEIGHT: f32 = 212.0;
/// Gap kept between a region and the chrome around it.
const CHROME_MARGIN: f32 = 10.0;

impl Default for ViewPadding {
    fn default() -> Self {
        Self {
            left: 20.0,
            top: HEADER_HEIGHT + CHROME_MARGIN,
            right: 20.0,
            bottom: PANEL_HEIGHT + CHROME_MARGIN,
        }
    }
}

impl ViewPadding {
    /// Total horizontal inset.
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    /// Total vertical inset.
    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

/// Behavior knobs of [`crate::view::RegionMapView`].
#[derive(Clone, Debug, PartialEq)]
pub struct ViewOptions {
    /// Chrome insets used when fitting a region and when outlining the viewport.
    pub padding: ViewPadding,
    /// Fraction of the padded viewport span removed on every side by "Outline Custom Area".
    pub outline_margin: f64,
    /// A region covering less than this fraction of the viewport makes the camera fly to it.
    pub min_coverage: f64,
    /// Quiet period after the last boundary edit before the region is stored.
    pub edit_debounce: Duration,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            padding: ViewPadding::default(),
            outline_margin: 0.15,
            min_coverage: 0.1,
            edit_debounce: Duration::from_millis(200),
        }
    }
}
