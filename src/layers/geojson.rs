//! GeoJSON overlays and point annotations for the map.
//!
//! Decoded GeoJSON objects are classified into two render buckets: shapes
//! that are drawn as map overlays (lines, polygons, multi-polygons) and
//! points that become titled annotations. Geometry kinds outside those four
//! are dropped during classification.

use crate::layers::Layer;
use crate::projection::{GeoPos, MapProjection};
use egui::epaint::Vertex;
use egui::{Align2, Color32, FontId, Mesh, Painter, Pos2, Rect, Response, Shape, Stroke};
use geojson::{Feature, GeoJson, Value};
use log::warn;
use std::any::Any;
use thiserror::Error;

/// The title given to every decoded point annotation.
pub const ANNOTATION_TITLE: &str = "SUPER DUPER PLACE";

/// Errors that can occur while loading GeoJSON map data.
#[derive(Error, Debug)]
pub enum GeoJsonError {
    /// The GeoJSON resource does not exist at any of the known locations.
    #[error("GeoJSON resource not found")]
    ResourceNotFound,

    /// Reading or decoding the GeoJSON data failed.
    #[error("Failed to parse GeoJSON data")]
    ParseFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A polygon as an exterior ring plus zero or more interior rings (holes).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolygonShape {
    /// The outer boundary of the polygon.
    pub exterior: Vec<GeoPos>,

    /// Holes cut out of the polygon.
    pub interiors: Vec<Vec<GeoPos>>,
}

/// A shape drawn on the map as an overlay.
#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    /// An open line through the given positions.
    Polyline(Vec<GeoPos>),

    /// A single polygon.
    Polygon(PolygonShape),

    /// A collection of polygons styled as one overlay.
    MultiPolygon(Vec<PolygonShape>),
}

/// A titled point marker on the map.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    /// The position of the marker.
    pub pos: GeoPos,

    /// The label shown next to the marker.
    pub title: String,
}

/// The result of decoding a GeoJSON document: overlays and annotations in
/// decode order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapContent {
    /// Shapes to draw as overlays.
    pub overlays: Vec<Overlay>,

    /// Points to place as annotations.
    pub annotations: Vec<Annotation>,
}

/// How the ends of a stroked line are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineCap {
    /// The line ends exactly at its endpoints.
    #[default]
    Butt,

    /// The line ends with a half-disc around its endpoints.
    Round,
}

/// The visual style applied to one overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererStyle {
    /// The interior fill color. `None` leaves the interior unfilled.
    pub fill: Option<Color32>,

    /// The outline stroke.
    pub stroke: Stroke,

    /// How the ends of stroked lines are drawn.
    pub line_cap: LineCap,

    /// The fraction of the outline path length at which stroking begins.
    /// The fill is unaffected.
    pub stroke_start: f32,
}

impl Default for RendererStyle {
    /// A renderer that draws nothing.
    fn default() -> Self {
        Self {
            fill: None,
            stroke: Stroke::NONE,
            line_cap: LineCap::Butt,
            stroke_start: 0.0,
        }
    }
}

/// Decodes a GeoJSON document and classifies its objects into overlays and
/// point annotations.
///
/// Accepts a FeatureCollection, a single Feature, or a bare Geometry.
/// Classification preserves decode order within each bucket. Geometry kinds
/// that are neither drawable shapes nor points are skipped.
pub fn decode_geojson(data: &[u8]) -> Result<MapContent, GeoJsonError> {
    let geojson: GeoJson =
        serde_json::from_slice(data).map_err(|e| GeoJsonError::ParseFailed(e.into()))?;

    let mut content = MapContent::default();
    match geojson {
        GeoJson::FeatureCollection(collection) => {
            for feature in collection.features {
                classify_feature(feature, &mut content);
            }
        }
        GeoJson::Feature(feature) => classify_feature(feature, &mut content),
        GeoJson::Geometry(geometry) => classify_geometry(geometry.value, &mut content),
    }
    Ok(content)
}

fn classify_feature(feature: Feature, content: &mut MapContent) {
    if let Some(geometry) = feature.geometry {
        classify_geometry(geometry.value, content);
    }
}

fn classify_geometry(value: Value, content: &mut MapContent) {
    match value {
        Value::Point(pos) => content.annotations.push(Annotation {
            pos: vec_to_geo_pos(&pos),
            title: ANNOTATION_TITLE.to_string(),
        }),
        Value::LineString(line) => content
            .overlays
            .push(Overlay::Polyline(positions_to_geo(&line))),
        Value::Polygon(rings) => content.overlays.push(Overlay::Polygon(rings_to_polygon(rings))),
        Value::MultiPolygon(polygons) => content.overlays.push(Overlay::MultiPolygon(
            polygons.into_iter().map(rings_to_polygon).collect(),
        )),
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                classify_geometry(geometry.value, content);
            }
        }
        // Anything that cannot be drawn as an overlay or placed as a point
        // annotation (MultiPoint, MultiLineString) is dropped.
        _ => {}
    }
}

fn vec_to_geo_pos(pos: &[f64]) -> GeoPos {
    GeoPos {
        lon: pos.first().copied().unwrap_or_default(),
        lat: pos.get(1).copied().unwrap_or_default(),
    }
}

fn positions_to_geo(positions: &[Vec<f64>]) -> Vec<GeoPos> {
    positions.iter().map(|pos| vec_to_geo_pos(pos)).collect()
}

fn rings_to_polygon(rings: Vec<Vec<Vec<f64>>>) -> PolygonShape {
    let mut rings = rings.into_iter();
    let exterior = rings.next().map(|ring| positions_to_geo(&ring)).unwrap_or_default();
    let interiors = rings.map(|ring| positions_to_geo(&ring)).collect();
    PolygonShape {
        exterior,
        interiors,
    }
}

/// A layer that draws GeoJSON overlays and point annotations.
///
/// # Example
///
/// ```no_run
/// use geojson_map_viewer::{Map, config::OpenStreetMapConfig};
/// use geojson_map_viewer::layers::geojson::{GeoJsonLayer, decode_geojson};
///
/// let data = std::fs::read("geo.json").unwrap();
/// let content = decode_geojson(&data).unwrap();
///
/// let mut layer = GeoJsonLayer::default();
/// layer.add_overlays(content.overlays);
/// layer.add_annotations(content.annotations);
///
/// let mut map = Map::new(OpenStreetMapConfig::default());
/// map.add_layer("geojson", layer);
/// ```
#[derive(Default)]
pub struct GeoJsonLayer {
    overlays: Vec<Overlay>,
    annotations: Vec<Annotation>,
    style: Option<Box<dyn Fn(&Overlay) -> RendererStyle>>,
}

impl GeoJsonLayer {
    /// Creates an empty layer with no style selector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty layer with the given style selector.
    pub fn with_style(style: impl Fn(&Overlay) -> RendererStyle + 'static) -> Self {
        Self {
            overlays: Vec::new(),
            annotations: Vec::new(),
            style: Some(Box::new(style)),
        }
    }

    /// Installs the style selector invoked once per overlay per frame.
    pub fn set_style(&mut self, style: impl Fn(&Overlay) -> RendererStyle + 'static) {
        self.style = Some(Box::new(style));
    }

    /// Appends a batch of overlays, preserving their order.
    pub fn add_overlays(&mut self, overlays: impl IntoIterator<Item = Overlay>) {
        self.overlays.extend(overlays);
    }

    /// Appends a batch of annotations, preserving their order.
    pub fn add_annotations(&mut self, annotations: impl IntoIterator<Item = Annotation>) {
        self.annotations.extend(annotations);
    }

    /// The overlays in the layer, in insertion order.
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    /// The annotations in the layer, in insertion order.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Resolves the style for an overlay. Without a selector installed every
    /// overlay gets the default style, which draws nothing.
    pub fn style_for(&self, overlay: &Overlay) -> RendererStyle {
        match &self.style {
            Some(style) => style(overlay),
            None => RendererStyle::default(),
        }
    }
}

impl Layer for GeoJsonLayer {
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
        for overlay in &self.overlays {
            let style = self.style_for(overlay);
            match overlay {
                Overlay::Polyline(points) => draw_polyline(painter, projection, points, &style),
                Overlay::Polygon(shape) => draw_polygon(painter, projection, shape, &style),
                Overlay::MultiPolygon(shapes) => {
                    for shape in shapes {
                        draw_polygon(painter, projection, shape, &style);
                    }
                }
            }
        }

        for annotation in &self.annotations {
            draw_annotation(painter, projection, annotation);
        }
    }
}

fn draw_polyline(
    painter: &Painter,
    projection: &MapProjection,
    points: &[GeoPos],
    style: &RendererStyle,
) {
    if points.len() < 2 || style.stroke.width <= 0.0 {
        return;
    }

    let screen_points: Vec<Pos2> = points.iter().map(|p| projection.project(*p)).collect();

    if style.line_cap == LineCap::Round {
        let radius = style.stroke.width / 2.0;
        painter.circle_filled(screen_points[0], radius, style.stroke.color);
        painter.circle_filled(screen_points[screen_points.len() - 1], radius, style.stroke.color);
    }

    painter.add(Shape::line(screen_points, style.stroke));
}

fn draw_polygon(
    painter: &Painter,
    projection: &MapProjection,
    shape: &PolygonShape,
    style: &RendererStyle,
) {
    if shape.exterior.len() < 3 {
        return;
    }

    let exterior: Vec<Pos2> = shape.exterior.iter().map(|p| projection.project(*p)).collect();
    let interiors: Vec<Vec<Pos2>> = shape
        .interiors
        .iter()
        .map(|ring| ring.iter().map(|p| projection.project(*p)).collect())
        .collect();

    if let Some(fill) = style.fill {
        fill_rings(painter, &exterior, &interiors, fill);
    }

    if style.stroke.width > 0.0 {
        let outline = trim_ring_start(&exterior, style.stroke_start);
        if outline.len() >= 2 {
            painter.add(Shape::line(outline, style.stroke));
        }

        for ring in &interiors {
            if ring.len() >= 3 {
                let mut closed = ring.clone();
                closed.push(ring[0]);
                painter.add(Shape::line(closed, style.stroke));
            }
        }
    }
}

/// Fills a polygon (with holes) by triangulating it into a mesh.
fn fill_rings(painter: &Painter, exterior: &[Pos2], interiors: &[Vec<Pos2>], fill: Color32) {
    let mut vertices: Vec<Pos2> = exterior.to_vec();
    let mut hole_indices: Vec<usize> = Vec::new();
    for ring in interiors {
        if ring.len() < 3 {
            continue;
        }
        hole_indices.push(vertices.len());
        vertices.extend_from_slice(ring);
    }

    let flat_points: Vec<f64> = vertices
        .iter()
        .flat_map(|p| [p.x as f64, p.y as f64])
        .collect();

    match earcutr::earcut(&flat_points, &hole_indices, 2) {
        Ok(indices) => {
            let mut mesh = Mesh::default();
            mesh.vertices = vertices
                .iter()
                .map(|p| Vertex {
                    pos: *p,
                    uv: Default::default(),
                    color: fill,
                })
                .collect();
            mesh.indices = indices.into_iter().map(|i| i as u32).collect();
            painter.add(Shape::Mesh(mesh.into()));
        }
        Err(e) => warn!("Failed to triangulate polygon fill: {:?}", e),
    }
}

/// Returns the closed outline of `ring` starting at the given fraction of its
/// perimeter. A `start` of 0.0 yields the full closed outline; a `start` of
/// 1.0 yields a path too short to draw.
fn trim_ring_start(ring: &[Pos2], start: f32) -> Vec<Pos2> {
    let mut closed: Vec<Pos2> = ring.to_vec();
    if let Some(first) = ring.first() {
        closed.push(*first);
    }

    if start <= 0.0 {
        return closed;
    }
    if start >= 1.0 {
        return Vec::new();
    }

    let lengths: Vec<f32> = closed
        .windows(2)
        .map(|pair| pair[0].distance(pair[1]))
        .collect();
    let total: f32 = lengths.iter().sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut remaining = total * start;
    for (i, segment) in lengths.iter().enumerate() {
        if remaining < *segment {
            let t = if *segment > 0.0 { remaining / segment } else { 0.0 };
            let mut trimmed = vec![closed[i].lerp(closed[i + 1], t)];
            trimmed.extend_from_slice(&closed[i + 1..]);
            return trimmed;
        }
        remaining -= segment;
    }

    Vec::new()
}

fn draw_annotation(painter: &Painter, projection: &MapProjection, annotation: &Annotation) {
    let screen_pos = projection.project(annotation.pos);

    painter.circle(
        screen_pos,
        6.0,
        Color32::from_rgb(234, 67, 53),
        Stroke::new(2.0, Color32::WHITE),
    );

    let galley = painter.layout_no_wrap(
        annotation.title.clone(),
        FontId::proportional(12.0),
        Color32::BLACK,
    );

    // Label below the marker.
    let anchor = screen_pos + egui::vec2(0.0, 10.0);
    let rect = Align2::CENTER_TOP.anchor_rect(Rect::from_min_size(anchor, galley.size()));
    painter.rect_filled(
        rect.expand(2.0),
        3.0,
        Color32::from_rgba_unmultiplied(255, 255, 255, 180),
    );
    painter.galley(rect.min, galley, Color32::TRANSPARENT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    const EPSILON: f32 = 1e-4;

    fn feature(geometry: &str) -> String {
        format!(
            r#"{{"type": "Feature", "properties": {{}}, "geometry": {geometry}}}"#
        )
    }

    #[test]
    fn classification_buckets_and_order() {
        let doc = format!(
            r#"{{"type": "FeatureCollection", "features": [{}, {}, {}]}}"#,
            feature(r#"{"type": "Polygon", "coordinates": [[[100.0, 0.0], [101.0, 0.0], [101.0, 1.0], [100.0, 0.0]]]}"#),
            feature(r#"{"type": "LineString", "coordinates": [[102.0, 0.0], [103.0, 1.0]]}"#),
            feature(r#"{"type": "Point", "coordinates": [102.0, 0.5]}"#),
        );

        let content = decode_geojson(doc.as_bytes()).unwrap();

        assert_eq!(content.overlays.len(), 2);
        assert_eq!(content.annotations.len(), 1);

        // Input order is preserved among overlays.
        assert!(matches!(content.overlays[0], Overlay::Polygon(_)));
        assert!(matches!(content.overlays[1], Overlay::Polyline(_)));

        let annotation = &content.annotations[0];
        assert_eq!(annotation.title, ANNOTATION_TITLE);
        assert_eq!(
            annotation.pos,
            GeoPos {
                lon: 102.0,
                lat: 0.5
            }
        );
    }

    #[test]
    fn unsupported_geometry_kinds_are_dropped() {
        let doc = format!(
            r#"{{"type": "FeatureCollection", "features": [{}, {}]}}"#,
            feature(r#"{"type": "MultiPoint", "coordinates": [[100.0, 0.0], [101.0, 1.0]]}"#),
            feature(r#"{"type": "MultiLineString", "coordinates": [[[100.0, 0.0], [101.0, 1.0]]]}"#),
        );

        let content = decode_geojson(doc.as_bytes()).unwrap();

        assert!(content.overlays.is_empty());
        assert!(content.annotations.is_empty());
    }

    #[test]
    fn bare_geometry_and_collections_are_classified() {
        let content =
            decode_geojson(br#"{"type": "Point", "coordinates": [24.9, 60.2]}"#).unwrap();
        assert_eq!(content.annotations.len(), 1);

        let content = decode_geojson(
            br#"{"type": "GeometryCollection", "geometries": [
                {"type": "Point", "coordinates": [1.0, 2.0]},
                {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(content.annotations.len(), 1);
        assert_eq!(content.overlays.len(), 1);
    }

    #[test]
    fn multi_polygon_keeps_all_shapes() {
        let doc = feature(
            r#"{"type": "MultiPolygon", "coordinates": [
                [[[102.0, 2.0], [103.0, 2.0], [103.0, 3.0], [102.0, 2.0]]],
                [[[100.0, 0.0], [101.0, 0.0], [101.0, 1.0], [100.0, 0.0]],
                 [[100.2, 0.2], [100.8, 0.2], [100.8, 0.8], [100.2, 0.2]]]
            ]}"#,
        );

        let content = decode_geojson(doc.as_bytes()).unwrap();

        assert_eq!(content.overlays.len(), 1);
        match &content.overlays[0] {
            Overlay::MultiPolygon(shapes) => {
                assert_eq!(shapes.len(), 2);
                assert!(shapes[0].interiors.is_empty());
                assert_eq!(shapes[1].interiors.len(), 1);
            }
            other => panic!("expected a multi-polygon, got {:?}", other),
        }
    }

    #[test]
    fn malformed_json_is_a_parse_failure() {
        let result = decode_geojson(b"{ not json");
        assert!(matches!(result, Err(GeoJsonError::ParseFailed(_))));

        let result = decode_geojson(br#"{"type": "Zorp"}"#);
        assert!(matches!(result, Err(GeoJsonError::ParseFailed(_))));
    }

    #[test]
    fn layer_batch_adds_preserve_order() {
        let mut layer = GeoJsonLayer::new();
        layer.add_overlays([
            Overlay::Polyline(vec![GeoPos { lon: 0.0, lat: 0.0 }, GeoPos { lon: 1.0, lat: 1.0 }]),
            Overlay::Polygon(PolygonShape::default()),
        ]);
        layer.add_annotations([Annotation {
            pos: GeoPos { lon: 2.0, lat: 2.0 },
            title: "A".to_string(),
        }]);

        assert_eq!(layer.overlays().len(), 2);
        assert!(matches!(layer.overlays()[0], Overlay::Polyline(_)));
        assert!(matches!(layer.overlays()[1], Overlay::Polygon(_)));
        assert_eq!(layer.annotations().len(), 1);
    }

    #[test]
    fn layer_without_selector_uses_the_default_style() {
        let layer = GeoJsonLayer::new();
        let overlay = Overlay::Polyline(vec![]);

        let style = layer.style_for(&overlay);

        assert_eq!(style, RendererStyle::default());
        assert!(style.fill.is_none());
        assert_eq!(style.stroke, Stroke::NONE);
        assert_eq!(style.line_cap, LineCap::Butt);
        assert_eq!(style.stroke_start, 0.0);
    }

    #[test]
    fn layer_selector_is_applied_per_overlay() {
        let layer = GeoJsonLayer::with_style(|overlay| match overlay {
            Overlay::Polyline(_) => RendererStyle {
                stroke: Stroke::new(20.0, Color32::RED),
                line_cap: LineCap::Round,
                ..Default::default()
            },
            _ => RendererStyle::default(),
        });

        let styled = layer.style_for(&Overlay::Polyline(vec![]));
        assert_eq!(styled.stroke.width, 20.0);
        assert_eq!(styled.line_cap, LineCap::Round);

        let unstyled = layer.style_for(&Overlay::Polygon(PolygonShape::default()));
        assert_eq!(unstyled, RendererStyle::default());
    }

    #[test]
    fn trim_ring_start_full_outline() {
        let ring = vec![
            pos2(0.0, 0.0),
            pos2(10.0, 0.0),
            pos2(10.0, 10.0),
            pos2(0.0, 10.0),
        ];

        let outline = trim_ring_start(&ring, 0.0);

        // Closed: the first point repeats at the end.
        assert_eq!(outline.len(), 5);
        assert_eq!(outline[0], outline[4]);
    }

    #[test]
    fn trim_ring_start_halfway() {
        let ring = vec![
            pos2(0.0, 0.0),
            pos2(10.0, 0.0),
            pos2(10.0, 10.0),
            pos2(0.0, 10.0),
        ];

        // Half of the 40-unit perimeter lands on the corner opposite the start.
        let outline = trim_ring_start(&ring, 0.5);

        assert_eq!(outline.len(), 3);
        assert!((outline[0].x - 10.0).abs() < EPSILON);
        assert!((outline[0].y - 10.0).abs() < EPSILON);
        assert_eq!(outline[outline.len() - 1], pos2(0.0, 0.0));
    }

    #[test]
    fn trim_ring_start_past_the_end() {
        let ring = vec![pos2(0.0, 0.0), pos2(10.0, 0.0), pos2(10.0, 10.0)];
        assert!(trim_ring_start(&ring, 1.0).is_empty());
    }

    #[test]
    fn polygon_rings_split_into_exterior_and_interiors() {
        let shape = rings_to_polygon(vec![
            vec![vec![0.0, 0.0], vec![4.0, 0.0], vec![4.0, 4.0], vec![0.0, 0.0]],
            vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![2.0, 2.0], vec![1.0, 1.0]],
        ]);

        assert_eq!(shape.exterior.len(), 4);
        assert_eq!(shape.interiors.len(), 1);
        assert_eq!(shape.exterior[1], GeoPos { lon: 4.0, lat: 0.0 });
    }
}
