//! The region map view: a [`Map`] bound to a [`Store`].
//!
//! The view owns the map and the boundary and feature layers on it. The hosting application calls
//! [`RegionMapView::mount`] once, then [`RegionMapView::ui`] every frame. `ui` forwards store
//! changes into the map through [`RegionMapView::sync`] and turns user interaction into actions.

use egui::{Ui, Widget};
use log::debug;
use std::time::Instant;

use crate::Map;
use crate::config::{MapConfig, ViewOptions};
use crate::debounce::Debouncer;
use crate::filter::{FilterExpr, FilterKind, FilterRange};
use crate::geometry::{Transition, choose_transition};
use crate::layers::boundary::BoundaryLayer;
use crate::layers::features::FeatureLayer;
use crate::region::Region;
use crate::state::{Action, MapState, Overlay, Store};

/// Key of the boundary layer on the map.
pub const BOUNDARY_LAYER: &str = "boundary";
/// Key of the feature layer on the map.
pub const FEATURE_LAYER: &str = "features";

/// Feature classes offered by the filter toggles.
pub const FEATURE_CLASSES: [&str; 4] = ["buildings", "highways", "waterways", "pois"];

/// Raw URL parameters the view was opened with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UrlParams {
    /// `region` parameter, e.g. `bbox:1,2,3,4`.
    pub region: Option<String>,
    /// `filters` parameter, e.g. `buildings,highways`.
    pub filters: Option<String>,
    /// `overlay` parameter, e.g. `recency`.
    pub overlay: Option<String>,
}

/// Map view that keeps the map in sync with the application state.
pub struct RegionMapView {
    map: Map,
    options: ViewOptions,
    mounted: bool,
    move_directly: bool,
    edits: Debouncer,
    params: UrlParams,
    seen: MapState,
    search: String,
}

impl RegionMapView {
    /// Creates an unmounted view over a map with an empty feature layer.
    pub fn new<C: MapConfig + 'static>(config: C) -> Self {
        Self::with_options(config, ViewOptions::default())
    }

    /// Creates an unmounted view with custom options.
    pub fn with_options<C: MapConfig + 'static>(config: C, options: ViewOptions) -> Self {
        let mut map = Map::new(config);
        map.add_layer(FEATURE_LAYER, FeatureLayer::default());
        Self {
            map,
            edits: Debouncer::new(options.edit_debounce),
            options,
            mounted: false,
            move_directly: false,
            params: UrlParams::default(),
            seen: MapState::default(),
            search: String::new(),
        }
    }

    /// Replaces the features shown on the map. Active sub-filters carry over.
    pub fn set_features(&mut self, mut features: FeatureLayer) {
        if let Some(current) = self.map.layer::<FeatureLayer>(FEATURE_LAYER) {
            for kind in [FilterKind::Time, FilterKind::Experience] {
                if let Some(expr) = current.sub_filter(kind) {
                    features.set_sub_filter(kind, expr.clone());
                }
            }
        }
        // Keep features below the boundary.
        let boundary = self.map.remove_layer(BOUNDARY_LAYER);
        self.map.add_layer(FEATURE_LAYER, features);
        if let Some(boundary) = boundary {
            self.map.layers.push((BOUNDARY_LAYER.to_string(), boundary));
        }
    }

    /// The underlying map.
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// The underlying map, mutably.
    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    /// Whether the view is mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// The rendered boundary, if a region is selected.
    pub fn boundary(&self) -> Option<&BoundaryLayer> {
        self.map.layer::<BoundaryLayer>(BOUNDARY_LAYER)
    }

    /// The feature layer.
    pub fn features(&self) -> Option<&FeatureLayer> {
        self.map.layer::<FeatureLayer>(FEATURE_LAYER)
    }

    /// Starts the view. Regions coming from the URL are shown without animation.
    pub fn mount(&mut self, store: &mut Store, params: UrlParams) {
        debug!("Mounting region map with {:?}", params);
        self.mounted = true;
        self.seen = MapState::default();

        if let Some(region) = &params.region {
            store.dispatch(Action::SetRegionFromUrl(region.clone()));
            // Unparsable regions leave the store unchanged.
            self.move_directly = region.parse::<Region>().is_ok();
        }
        if let Some(filters) = &params.filters {
            store.dispatch(Action::SetFiltersFromUrl(filters.clone()));
        }
        if let Some(overlay) = &params.overlay {
            store.dispatch(Action::SetOverlayFromUrl(overlay.clone()));
        }
        self.params = params;
    }

    /// Stops the view and removes everything it put on the map.
    pub fn unmount(&mut self) {
        debug!("Unmounting region map");
        self.map.remove_layer(BOUNDARY_LAYER);
        self.move_directly = false;
        self.edits.cancel();
        self.mounted = false;
    }

    /// Dispatches the URL parameters that changed since the last call.
    pub fn set_params(&mut self, store: &mut Store, params: UrlParams) {
        if params.region != self.params.region {
            match &params.region {
                Some(region) => store.dispatch(Action::SetRegionFromUrl(region.clone())),
                None => store.dispatch(Action::SetRegion(None)),
            }
        }
        if params.filters != self.params.filters {
            if let Some(filters) = &params.filters {
                store.dispatch(Action::SetFiltersFromUrl(filters.clone()));
            }
        }
        if params.overlay != self.params.overlay {
            if let Some(overlay) = &params.overlay {
                store.dispatch(Action::SetOverlayFromUrl(overlay.clone()));
            }
        }
        self.params = params;
    }

    /// Applies the parts of `state` that changed since the last call.
    pub fn sync(&mut self, state: &MapState) {
        if !self.mounted {
            return;
        }
        if state.region != self.seen.region {
            self.reconcile_region(state.region.as_ref());
        }
        if state.time_filter != self.seen.time_filter {
            self.apply_filter(FilterKind::Time, state.time_filter);
        }
        if state.experience_filter != self.seen.experience_filter {
            self.apply_filter(FilterKind::Experience, state.experience_filter);
        }
        self.seen = state.clone();
    }

    /// Replaces the boundary with one for `region` and moves the camera if warranted.
    ///
    /// Returns the transition applied, or `None` when the region was cleared or its geometry could
    /// not be evaluated.
    pub fn reconcile_region(&mut self, region: Option<&Region>) -> Option<Transition> {
        if self.map.remove_layer(BOUNDARY_LAYER).is_some() {
            debug!("Removed previous boundary");
        }
        let region = region?;

        self.map
            .add_layer(BOUNDARY_LAYER, BoundaryLayer::new(region.ring()).enable_edit());

        let transition = if std::mem::take(&mut self.move_directly) {
            Transition::Snap
        } else {
            let viewport = self.map.bounds().to_polygon();
            match choose_transition(&viewport, &region.to_polygon(), self.options.min_coverage) {
                Ok(transition) => transition,
                Err(e) => {
                    // Rings are often briefly invalid while being edited.
                    debug!("Keeping viewport: {}", e);
                    return None;
                }
            }
        };

        let bounds = region.bounds()?;
        match transition {
            Transition::Snap => self.map.fit_bounds(bounds, self.options.padding),
            Transition::Fly => self.map.fly_to_bounds(bounds, self.options.padding),
            Transition::Stay => {}
        }
        Some(transition)
    }

    /// Pushes a range filter, or a match-nothing filter when `range` is `None`, into the feature layer.
    pub fn apply_filter(&mut self, kind: FilterKind, range: Option<FilterRange>) {
        if let Some(layer) = self.map.layer_mut::<FeatureLayer>(FEATURE_LAYER) {
            layer.set_sub_filter(kind, FilterExpr::for_range(kind, range));
        }
    }

    /// The region outlining what is visible between the UI chrome, shrunk by the outline margin.
    pub fn outline_viewport(&self) -> Region {
        let padding = self.options.padding;
        let rect = self.map.viewport();
        let inner = egui::Rect::from_min_max(
            rect.min + egui::vec2(padding.left, padding.top),
            rect.max - egui::vec2(padding.right, padding.bottom),
        );
        let bounds = self
            .map
            .projection()
            .unproject_rect(inner)
            .pad(-self.options.outline_margin);
        Region::BBox(bounds.to_bbox())
    }

    /// Dispatches the outline of the current viewport as the selected region.
    pub fn select_viewport(&self, store: &mut Store) {
        store.dispatch(Action::SetRegion(Some(self.outline_viewport())));
    }

    /// Picks up boundary edits and, once they settle, stores the edited polygon.
    ///
    /// Returns `true` when an update was dispatched.
    pub fn poll_edits(&mut self, store: &mut Store, now: Instant) -> bool {
        if let Some(boundary) = self.map.layer_mut::<BoundaryLayer>(BOUNDARY_LAYER) {
            if boundary.take_edited() {
                self.edits.trigger(now);
            }
        }
        if !self.edits.poll(now) {
            return false;
        }
        let Some(boundary) = self.boundary() else {
            return false;
        };
        let region = Region::Polygon(boundary.ring().to_vec());
        store.dispatch(Action::SetRegion(Some(region)));
        true
    }

    /// Draws the view and processes its interaction.
    pub fn ui(&mut self, ui: &mut Ui, store: &mut Store) {
        self.sync(store.state());

        (&mut self.map).ui(ui);
        let rect = self.map.viewport();

        if self.poll_edits(store, Instant::now()) {
            ui.ctx().request_repaint();
        } else if let Some(deadline) = self.edits.deadline() {
            ui.ctx()
                .request_repaint_after(deadline.saturating_duration_since(Instant::now()));
        }

        egui::Area::new(ui.id().with("region_controls"))
            .fixed_pos(rect.left_top() + egui::vec2(10.0, 10.0))
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    self.controls_ui(ui, store);
                });
            });
    }

    fn controls_ui(&mut self, ui: &mut Ui, store: &mut Store) {
        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.search)
                    .hint_text("bbox:west,south,east,north"),
            );
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                match self.search.parse::<Region>() {
                    Ok(region) => store.dispatch(Action::SetRegion(Some(region))),
                    Err(e) => debug!("Search text is not a region: {}", e),
                }
            }
            if let Some(region) = &store.state().region {
                if ui.small_button("✖").on_hover_text(region.to_string()).clicked() {
                    store.dispatch(Action::SetRegion(None));
                }
            }
            ui.label("or");
            if ui.button("Outline Custom Area").clicked() {
                self.select_viewport(store);
            }
        });

        ui.horizontal(|ui| {
            let mut filters = store.state().filters.clone();
            let mut changed = false;
            for class in FEATURE_CLASSES {
                let mut enabled = filters.iter().any(|f| f == class);
                if ui.checkbox(&mut enabled, class).changed() {
                    changed = true;
                    if enabled {
                        filters.push(class.to_string());
                    } else {
                        filters.retain(|f| f != class);
                    }
                }
            }
            if changed {
                store.dispatch(Action::SetFilters(filters));
            }
        });

        ui.horizontal(|ui| {
            let mut overlay = store.state().overlay;
            for option in Overlay::ALL {
                ui.radio_value(&mut overlay, option, option.name());
            }
            if overlay != store.state().overlay {
                store.dispatch(Action::SetOverlay(overlay));
            }
        });
    }
}

impl Drop for RegionMapView {
    fn drop(&mut self) {
        if self.mounted {
            self.unmount();
        }
    }
}
