//! The viewer application: a map screen that loads a bundled GeoJSON file.
//!
//! On construction the screen lays out the map, points the camera at a fixed
//! region, and kicks off two background units of work: loading the bundled
//! `geo.json` and requesting a single user-location fix. Results are applied
//! on the UI thread when the promises resolve. A failed load is logged and
//! leaves the map empty; there is no retry.

use crate::Map;
use crate::color::color_from_hex;
use crate::config::MapConfig;
use crate::layers::geojson::{
    GeoJsonError, GeoJsonLayer, LineCap, MapContent, Overlay, RendererStyle, decode_geojson,
};
use crate::layers::location::LocationLayer;
use crate::location::{LocationError, LocationSource, request_location};
use crate::projection::GeoPos;
use eframe::egui;
use egui::Stroke;
use log::{debug, error};
use poll_promise::Promise;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The coordinate the camera centers on at startup.
const INITIAL_CENTER: GeoPos = GeoPos {
    lon: 102.0,
    lat: 0.5,
};

/// The camera span at startup, in meters.
const INITIAL_RADIUS_M: f64 = 1_000_000.0;

/// The bundled GeoJSON resource name.
const GEOJSON_RESOURCE: &str = "geo.json";

/// The hex color every overlay style is built from.
const OVERLAY_COLOR: &str = "#ff40ff";

const GEOJSON_LAYER: &str = "geojson";
const LOCATION_LAYER: &str = "location";

/// The state of the one-shot GeoJSON load.
enum LoadPhase {
    /// The load is running in the background.
    Loading(Promise<Result<MapContent, GeoJsonError>>),

    /// Overlays and annotations have been added to the map.
    Loaded,

    /// The load failed; the map stays empty.
    Failed,
}

/// The map screen.
pub struct ViewerApp {
    map: Map,
    load: LoadPhase,
    location: Option<Promise<Result<GeoPos, LocationError>>>,
}

impl ViewerApp {
    /// Creates the screen with its map provider and location source.
    pub fn new(config: impl MapConfig + 'static, source: impl LocationSource) -> Self {
        let mut map = Map::new(config);
        map.set_region(INITIAL_CENTER, INITIAL_RADIUS_M);
        map.add_layer(GEOJSON_LAYER, GeoJsonLayer::with_style(overlay_style));
        map.add_layer(LOCATION_LAYER, LocationLayer::new());

        let load = LoadPhase::Loading(Promise::spawn_thread("load_geojson", || {
            load_bundled_geojson(GEOJSON_RESOURCE)
        }));

        Self {
            map,
            load,
            location: Some(request_location(source)),
        }
    }

    /// Applies a finished GeoJSON load, if one is ready.
    fn poll_load(&mut self) {
        let outcome = match &self.load {
            LoadPhase::Loading(promise) => match promise.ready() {
                Some(Ok(content)) => Some(Ok(content.clone())),
                Some(Err(e)) => Some(Err(describe_error(e))),
                None => None,
            },
            _ => None,
        };

        match outcome {
            Some(Ok(content)) => {
                Self::apply_content(&mut self.map, content);
                self.load = LoadPhase::Loaded;
            }
            Some(Err(message)) => {
                error!("Error parsing GeoJSON: {}", message);
                self.load = LoadPhase::Failed;
            }
            None => {}
        }
    }

    /// Adds decoded overlays and annotations to the map, each in one batch.
    fn apply_content(map: &mut Map, content: MapContent) {
        if let Some(layer) = map.layer_mut::<GeoJsonLayer>(GEOJSON_LAYER) {
            layer.add_overlays(content.overlays);
            layer.add_annotations(content.annotations);
        }
    }

    /// Applies a finished location request, if one is ready.
    fn poll_location(&mut self) {
        let result = {
            let Some(promise) = &self.location else {
                return;
            };
            match promise.ready() {
                Some(result) => result.clone(),
                None => return,
            }
        };

        self.location = None;
        match result {
            Ok(fix) => {
                debug!("User location fix at ({}, {})", fix.lat, fix.lon);
                if let Some(layer) = self.map.layer_mut::<LocationLayer>(LOCATION_LAYER) {
                    layer.set_fix(fix);
                }
            }
            Err(e) => debug!("User location unavailable: {}", e),
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_load();
        self.poll_location();

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                ui.add_sized(ui.available_size_before_wrap(), &mut self.map)
                    .clicked();
            });

        // Keep polling while background work is in flight.
        if matches!(self.load, LoadPhase::Loading(_)) || self.location.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

/// Maps each overlay kind to its fixed style.
fn overlay_style(overlay: &Overlay) -> RendererStyle {
    let stroke_color = color_from_hex(OVERLAY_COLOR, 1.0);
    match overlay {
        Overlay::Polygon(_) => RendererStyle {
            fill: Some(color_from_hex(OVERLAY_COLOR, 0.3)),
            stroke: Stroke::new(2.0, stroke_color),
            line_cap: LineCap::Butt,
            stroke_start: 0.5,
        },
        Overlay::Polyline(_) => RendererStyle {
            fill: None,
            stroke: Stroke::new(20.0, stroke_color),
            line_cap: LineCap::Round,
            stroke_start: 0.0,
        },
        Overlay::MultiPolygon(_) => RendererStyle {
            fill: Some(color_from_hex(OVERLAY_COLOR, 0.3)),
            stroke: Stroke::new(2.0, stroke_color),
            line_cap: LineCap::Butt,
            stroke_start: 0.0,
        },
    }
}

/// Locates the bundled resource, checking the working directory, an `assets`
/// directory, and the executable's directory.
fn bundled_resource(name: &str) -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from(name), Path::new("assets").join(name)];
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join(name));
        }
    }
    candidates.into_iter().find(|path| path.is_file())
}

fn load_bundled_geojson(name: &str) -> Result<MapContent, GeoJsonError> {
    let path = bundled_resource(name).ok_or(GeoJsonError::ResourceNotFound)?;
    load_geojson_file(&path)
}

/// Reads and decodes a GeoJSON file.
///
/// A missing file is a `ResourceNotFound`; read and decode failures are
/// `ParseFailed` wrapping the underlying error.
pub fn load_geojson_file(path: &Path) -> Result<MapContent, GeoJsonError> {
    if !path.is_file() {
        return Err(GeoJsonError::ResourceNotFound);
    }
    let data = std::fs::read(path).map_err(|e| GeoJsonError::ParseFailed(e.into()))?;
    decode_geojson(&data)
}

/// Renders an error and its cause chain as one line.
fn describe_error(err: &GeoJsonError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
