#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use eframe::egui;
use geojson_map_viewer::app::ViewerApp;
use geojson_map_viewer::config::OpenStreetMapConfig;
use geojson_map_viewer::location::IpLocationSource;

fn main() -> eframe::Result {
    // Log to stdout (if you run with `RUST_LOG=debug`).
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "GeoJSON map viewer",
        options,
        Box::new(|_cc| {
            Ok(Box::new(ViewerApp::new(
                OpenStreetMapConfig::default(),
                IpLocationSource::default(),
            )))
        }),
    )
}
