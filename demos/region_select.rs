#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release
#![allow(rustdoc::missing_crate_level_docs)] // it's an example

use eframe::egui;
use egui_region_map::{
    config::OpenStreetMapConfig,
    filter::{FilterRange, Properties},
    layers::features::{FeatureGeometry, FeatureLayer, MapFeature},
    projection::GeoPos,
    state::{Action, Store},
    view::{RegionMapView, UrlParams},
};
use serde_json::json;

fn main() -> eframe::Result {
    env_logger::init();

    // Usage: region_select [region] [filters] [overlay]
    // e.g. region_select bbox:13.3,52.5,13.45,52.55 buildings,highways recency
    let mut args = std::env::args().skip(1);
    let params = UrlParams {
        region: args.next(),
        filters: args.next(),
        overlay: args.next(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1024.0, 768.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Select a region on a map",
        options,
        Box::new(|_cc| Ok(Box::new(MyApp::new(params)))),
    )
}

struct MyApp {
    store: Store,
    view: RegionMapView,
    time: (f64, f64),
    time_enabled: bool,
    experience: (f64, f64),
    experience_enabled: bool,
}

impl MyApp {
    fn new(params: UrlParams) -> Self {
        let mut store = Store::default();
        let mut view = RegionMapView::new(OpenStreetMapConfig::default());
        view.set_features(sample_buildings(view.map().center));
        view.mount(&mut store, params);
        Self {
            store,
            view,
            time: (0.0, 100.0),
            time_enabled: false,
            experience: (0.0, 1000.0),
            experience_enabled: false,
        }
    }
}

/// A grid of fake buildings around `center` with varying edit age and editor experience.
fn sample_buildings(center: GeoPos) -> FeatureLayer {
    let mut features = Vec::new();
    for i in 0..20 {
        for j in 0..20 {
            let mut properties = Properties::new();
            properties.insert("_timestamp".to_string(), json!((i * 5) as f64));
            properties.insert("_userExperience".to_string(), json!((j * 50) as f64));
            features.push(MapFeature {
                geometry: FeatureGeometry::Point(GeoPos {
                    lon: center.lon - 10.0 + i as f64,
                    lat: center.lat - 10.0 + j as f64,
                }),
                properties,
            });
        }
    }
    FeatureLayer::new(features)
}

fn range_ui(ui: &mut egui::Ui, label: &str, range: &mut (f64, f64), max: f64) -> bool {
    ui.label(label);
    let min_changed = ui
        .add(egui::Slider::new(&mut range.0, 0.0..=max).text("min"))
        .changed();
    let max_changed = ui
        .add(egui::Slider::new(&mut range.1, 0.0..=max).text("max"))
        .changed();
    min_changed || max_changed
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.view.ui(ui, &mut self.store);
            });

        egui::Window::new("Filters")
            .resizable(false)
            .default_width(280.0)
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
            .show(ctx, |ui| {
                let mut changed = ui.checkbox(&mut self.time_enabled, "Filter by time").changed();
                changed |= range_ui(ui, "Edited", &mut self.time, 100.0);
                if changed {
                    let range = self
                        .time_enabled
                        .then(|| FilterRange::new(self.time.0, self.time.1));
                    self.store.dispatch(Action::SetTimeFilter(range));
                }

                ui.separator();

                let mut changed = ui
                    .checkbox(&mut self.experience_enabled, "Filter by experience")
                    .changed();
                changed |= range_ui(ui, "Editor experience", &mut self.experience, 1000.0);
                if changed {
                    let range = self
                        .experience_enabled
                        .then(|| FilterRange::new(self.experience.0, self.experience.1));
                    self.store.dispatch(Action::SetExperienceFilter(range));
                }

                ui.separator();

                if let Some(boundary) = self.view.boundary() {
                    ui.label(format!("Boundary has {} nodes", boundary.ring().len()));
                }
                if let Some(region) = &self.store.state().region {
                    ui.label(region.to_string());
                }
            });
    }
}
