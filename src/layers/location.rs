//! A layer that marks the user's location on the map.

use crate::layers::Layer;
use crate::projection::{GeoPos, MapProjection};
use egui::{Color32, Painter, Response, Stroke};
use std::any::Any;

/// A layer that draws a dot at the user's last known location.
///
/// The layer draws nothing until a fix is set.
#[derive(Clone, Debug)]
pub struct LocationLayer {
    /// Whether the dot is drawn when a fix is available.
    pub visible: bool,

    fix: Option<GeoPos>,
}

impl Default for LocationLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationLayer {
    /// Creates a visible layer with no fix yet.
    pub fn new() -> Self {
        Self {
            visible: true,
            fix: None,
        }
    }

    /// Sets the location to mark.
    pub fn set_fix(&mut self, fix: GeoPos) {
        self.fix = Some(fix);
    }

    /// The last known location, if any.
    pub fn fix(&self) -> Option<GeoPos> {
        self.fix
    }
}

impl Layer for LocationLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, _response: &Response, _projection: &MapProjection) -> bool {
        false
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        if !self.visible {
            return;
        }

        if let Some(fix) = self.fix {
            let screen_pos = projection.project(fix);
            painter.circle(
                screen_pos,
                7.0,
                Color32::from_rgb(0, 122, 255),
                Stroke::new(2.5, Color32::WHITE),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_layer_new() {
        let layer = LocationLayer::new();
        assert!(layer.visible);
        assert!(layer.fix().is_none());
    }

    #[test]
    fn location_layer_set_fix() {
        let mut layer = LocationLayer::new();
        layer.set_fix(GeoPos {
            lon: 102.0,
            lat: 0.5,
        });
        assert_eq!(
            layer.fix(),
            Some(GeoPos {
                lon: 102.0,
                lat: 0.5
            })
        );
    }

    #[test]
    fn location_layer_as_any() {
        let layer = LocationLayer::new();
        assert!(layer.as_any().is::<LocationLayer>());
    }
}
