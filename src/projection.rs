//! Map projection.

use egui::Rect;
use serde::{Deserialize, Serialize};

use crate::{TILE_SIZE, lat_to_y, lon_to_x, x_to_lon, y_to_lat};

/// A geographical position in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    /// Longitude in degrees.
    pub lon: f64,

    /// Latitude in degrees.
    pub lat: f64,
}

impl From<(f64, f64)> for GeoPos {
    /// Converts from a `(longitude, latitude)` tuple.
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

impl From<GeoPos> for (f64, f64) {
    fn from(pos: GeoPos) -> Self {
        (pos.lon, pos.lat)
    }
}

/// A helper for converting between geographical and screen coordinates.
pub struct MapProjection {
    zoom: u8,
    center: GeoPos,
    widget_rect: Rect,
}

impl MapProjection {
    /// Creates a new `MapProjection`.
    pub(crate) fn new(zoom: u8, center: GeoPos, widget_rect: Rect) -> Self {
        Self {
            zoom,
            center,
            widget_rect,
        }
    }

    /// Projects a geographical coordinate to a screen coordinate.
    pub fn project(&self, geo_pos: GeoPos) -> egui::Pos2 {
        let center_x = lon_to_x(self.center.lon, self.zoom);
        let center_y = lat_to_y(self.center.lat, self.zoom);

        let tile_x = lon_to_x(geo_pos.lon, self.zoom);
        let tile_y = lat_to_y(geo_pos.lat, self.zoom);

        let dx = (tile_x - center_x) * TILE_SIZE as f64;
        let dy = (tile_y - center_y) * TILE_SIZE as f64;

        let widget_center = self.widget_rect.center();
        widget_center + egui::vec2(dx as f32, dy as f32)
    }

    /// Un-projects a screen coordinate to a geographical coordinate.
    pub fn unproject(&self, screen_pos: egui::Pos2) -> GeoPos {
        let rel_pos = screen_pos - self.widget_rect.min;
        let widget_center_x = self.widget_rect.width() as f64 / 2.0;
        let widget_center_y = self.widget_rect.height() as f64 / 2.0;

        let center_x = lon_to_x(self.center.lon, self.zoom);
        let center_y = lat_to_y(self.center.lat, self.zoom);

        let target_x = center_x + (rel_pos.x as f64 - widget_center_x) / TILE_SIZE as f64;
        let target_y = center_y + (rel_pos.y as f64 - widget_center_y) / TILE_SIZE as f64;

        GeoPos {
            lon: x_to_lon(target_x, self.zoom),
            lat: y_to_lat(target_y, self.zoom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{Rect, pos2};

    #[test]
    fn project_unproject_roundtrip() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(800.0, 600.0));
        let center = GeoPos {
            lon: 102.0,
            lat: 0.5,
        };
        let projection = MapProjection::new(5, center, rect);

        // The map center lands on the widget center.
        let projected = projection.project(center);
        assert!((projected.x - 400.0).abs() < 1e-3);
        assert!((projected.y - 300.0).abs() < 1e-3);

        let geo = projection.unproject(pos2(520.0, 210.0));
        let back = projection.project(geo);
        assert!((back.x - 520.0).abs() < 1e-2);
        assert!((back.y - 210.0).abs() < 1e-2);
    }

    #[test]
    fn geo_pos_tuple_conversion() {
        let pos: GeoPos = (24.93545, 60.16952).into();
        assert_eq!(
            pos,
            GeoPos {
                lon: 24.93545,
                lat: 60.16952
            }
        );
        let tuple: (f64, f64) = pos.into();
        assert_eq!(tuple, (24.93545, 60.16952));
    }
}
