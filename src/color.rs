//! Hex color string parsing.

use egui::Color32;

/// Parses a hex color string like `"#ff40ff"` or `"ff40ff"` into a color
/// with the given alpha in `[0, 1]`.
///
/// Scanning is best-effort: a leading `#` is skipped, hexadecimal digits are
/// consumed until the first non-hex character, and the low 24 bits of the
/// scanned value become the red, green, and blue bytes. Malformed input is
/// not rejected; it produces a partial or black color.
///
/// # Example
///
/// ```
/// use egui::Color32;
/// use geojson_map_viewer::color::color_from_hex;
///
/// assert_eq!(
///     color_from_hex("#ff40ff", 1.0),
///     Color32::from_rgba_unmultiplied(255, 64, 255, 255)
/// );
/// ```
pub fn color_from_hex(hex: &str, alpha: f32) -> Color32 {
    let digits = hex.strip_prefix('#').unwrap_or(hex);

    let mut value: u64 = 0;
    for c in digits.chars() {
        match c.to_digit(16) {
            Some(digit) => value = value.saturating_mul(16).saturating_add(digit as u64),
            None => break,
        }
    }

    let r = ((value & 0xFF0000) >> 16) as u8;
    let g = ((value & 0x00FF00) >> 8) as u8;
    let b = (value & 0x0000FF) as u8;
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(r, g, b, a)
}
