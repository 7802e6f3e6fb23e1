//! Application state shared between the map view and the rest of the UI.
//!
//! State changes only through [`Store::dispatch`]. Views keep a copy of the last state they saw
//! and react to the fields that differ.

use log::{debug, warn};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::filter::FilterRange;
use crate::region::Region;

/// Errors that can occur while parsing an overlay name.
#[derive(Error, Debug, PartialEq)]
#[error("Unknown overlay `{0}`")]
pub struct UnknownOverlay(pub String);

/// The thematic overlay drawn over the features.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Overlay {
    /// Feature density.
    #[default]
    Density,
    /// Time since the last edit.
    Recency,
    /// Experience of the last editor.
    Experience,
}

impl Overlay {
    /// All overlays, in display order.
    pub const ALL: [Overlay; 3] = [Overlay::Density, Overlay::Recency, Overlay::Experience];

    /// The URL and display name.
    pub fn name(self) -> &'static str {
        match self {
            Overlay::Density => "density",
            Overlay::Recency => "recency",
            Overlay::Experience => "experience",
        }
    }
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Overlay {
    type Err = UnknownOverlay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Overlay::ALL
            .into_iter()
            .find(|o| o.name() == s)
            .ok_or_else(|| UnknownOverlay(s.to_string()))
    }
}

/// Everything the map view reads from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct MapState {
    /// The selected region.
    pub region: Option<Region>,
    /// Enabled feature classes.
    pub filters: Vec<String>,
    /// The active overlay.
    pub overlay: Overlay,
    /// Range of edit times to highlight.
    pub time_filter: Option<FilterRange>,
    /// Range of editor experience to highlight.
    pub experience_filter: Option<FilterRange>,
}

/// Feature classes enabled when nothing else is requested.
pub const DEFAULT_FILTERS: [&str; 1] = ["buildings"];

impl Default for MapState {
    fn default() -> Self {
        Self {
            region: None,
            filters: DEFAULT_FILTERS.iter().map(|f| f.to_string()).collect(),
            overlay: Overlay::default(),
            time_filter: None,
            experience_filter: None,
        }
    }
}

/// State changes.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Select a region, or clear the selection.
    SetRegion(Option<Region>),
    /// Select a region from its URL form.
    SetRegionFromUrl(String),
    /// Replace the enabled feature classes.
    SetFilters(Vec<String>),
    /// Enable feature classes from a comma separated URL parameter.
    SetFiltersFromUrl(String),
    /// Choose the overlay.
    SetOverlay(Overlay),
    /// Choose the overlay from its URL form.
    SetOverlayFromUrl(String),
    /// Set or clear the time range filter.
    SetTimeFilter(Option<FilterRange>),
    /// Set or clear the experience range filter.
    SetExperienceFilter(Option<FilterRange>),
}

/// Holds the current [`MapState`].
#[derive(Debug, Default)]
pub struct Store {
    state: MapState,
}

impl Store {
    /// Creates a store with the given initial state.
    pub fn new(state: MapState) -> Self {
        Self { state }
    }

    /// The current state.
    pub fn state(&self) -> &MapState {
        &self.state
    }

    /// Applies an action. Malformed URL parameters are logged and leave the state unchanged.
    pub fn dispatch(&mut self, action: Action) {
        debug!("Dispatching {:?}", action);
        let state = &mut self.state;
        match action {
            Action::SetRegion(region) => state.region = region,
            Action::SetRegionFromUrl(text) => match text.parse::<Region>() {
                Ok(region) => state.region = Some(region),
                Err(e) => warn!("Ignoring region parameter `{}`: {}", text, e),
            },
            Action::SetFilters(filters) => state.filters = filters,
            Action::SetFiltersFromUrl(text) => state.filters = parse_filters(&text),
            Action::SetOverlay(overlay) => state.overlay = overlay,
            Action::SetOverlayFromUrl(text) => match text.parse::<Overlay>() {
                Ok(overlay) => state.overlay = overlay,
                Err(e) => warn!("Ignoring overlay parameter: {}", e),
            },
            Action::SetTimeFilter(range) => state.time_filter = range,
            Action::SetExperienceFilter(range) => state.experience_filter = range,
        }
    }
}

fn parse_filters(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_from_url() {
        let mut store = Store::default();
        store.dispatch(Action::SetRegionFromUrl("bbox:1,2,3,4".to_string()));
        assert_eq!(store.state().region, Some(Region::BBox([1.0, 2.0, 3.0, 4.0])));
    }

    #[test]
    fn malformed_region_keeps_state() {
        let mut store = Store::default();
        store.dispatch(Action::SetRegion(Some(Region::BBox([1.0, 2.0, 3.0, 4.0]))));
        store.dispatch(Action::SetRegionFromUrl("bbox:oops".to_string()));
        assert_eq!(store.state().region, Some(Region::BBox([1.0, 2.0, 3.0, 4.0])));
    }

    #[test]
    fn huge_polyline_region_keeps_state() {
        let mut store = Store::default();
        store.dispatch(Action::SetRegion(Some(Region::BBox([1.0, 2.0, 3.0, 4.0]))));
        let deltas = "____________C?".repeat(4);
        store.dispatch(Action::SetRegionFromUrl(format!("polygon:{}", deltas)));
        assert_eq!(store.state().region, Some(Region::BBox([1.0, 2.0, 3.0, 4.0])));
    }

    #[test]
    fn clear_region() {
        let mut store = Store::default();
        store.dispatch(Action::SetRegion(Some(Region::BBox([1.0, 2.0, 3.0, 4.0]))));
        store.dispatch(Action::SetRegion(None));
        assert!(store.state().region.is_none());
    }

    #[test]
    fn filters_from_url() {
        let mut store = Store::default();
        assert_eq!(store.state().filters, vec!["buildings".to_string()]);
        store.dispatch(Action::SetFiltersFromUrl("highways, waterways,,".to_string()));
        assert_eq!(
            store.state().filters,
            vec!["highways".to_string(), "waterways".to_string()]
        );
    }

    #[test]
    fn overlay_from_url() {
        let mut store = Store::default();
        store.dispatch(Action::SetOverlayFromUrl("recency".to_string()));
        assert_eq!(store.state().overlay, Overlay::Recency);
        store.dispatch(Action::SetOverlayFromUrl("heatmap".to_string()));
        assert_eq!(store.state().overlay, Overlay::Recency);
        assert_eq!(Overlay::Experience.to_string(), "experience");
    }

    #[test]
    fn range_filters() {
        let mut store = Store::default();
        store.dispatch(Action::SetTimeFilter(Some(FilterRange::new(1.0, 2.0))));
        store.dispatch(Action::SetExperienceFilter(Some(FilterRange::new(3.0, 4.0))));
        assert_eq!(store.state().time_filter, Some(FilterRange::new(1.0, 2.0)));
        assert_eq!(store.state().experience_filter, Some(FilterRange::new(3.0, 4.0)));
        store.dispatch(Action::SetTimeFilter(None));
        assert!(store.state().time_filter.is_none());
    }
}
