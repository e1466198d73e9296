//! Color swatches and color helpers.

use egui::{vec2, Color32, CornerRadius, CursorIcon, Rect, Sense, Stroke, StrokeKind, Ui};

use crate::sizing;

/// Lightness removed from a swatch while it is hovered.
pub const HOVER_DARKEN: f32 = 0.1;

/// A clickable, rounded color swatch.
///
/// Hovering darkens the fill and switches the cursor to a pointing hand.
pub struct ColorSwatch<'a> {
    color: Color32,
    tooltip: &'a str,
    selected: bool,
}

impl<'a> ColorSwatch<'a> {
    /// Create a new color swatch.
    pub fn new(color: Color32, tooltip: &'a str) -> Self {
        Self {
            color,
            tooltip,
            selected: false,
        }
    }

    /// Set whether this swatch is selected.
    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Show the swatch and return (clicked, rect).
    pub fn show(self, ui: &mut Ui) -> (bool, Rect) {
        let size = vec2(sizing::SWATCH, sizing::SWATCH);
        let (rect, response) = ui.allocate_exact_size(size, Sense::click());

        if ui.is_rect_visible(rect) {
            let fill = if response.hovered() {
                darken(self.color, HOVER_DARKEN)
            } else {
                self.color
            };
            let radius = CornerRadius::same(sizing::SWATCH_RADIUS);
            ui.painter().rect_filled(rect, radius, fill);

            if self.selected {
                ui.painter().rect_stroke(
                    rect,
                    radius,
                    Stroke::new(2.0, Color32::from_gray(60)),
                    StrokeKind::Inside,
                );
            }
        }

        let clicked = response.clicked();
        response
            .on_hover_text(self.tooltip)
            .on_hover_cursor(CursorIcon::PointingHand);
        (clicked, rect)
    }
}

/// Check if two colors match (for selection highlighting).
pub fn colors_match(a: Color32, b: Color32) -> bool {
    a.r() == b.r() && a.g() == b.g() && a.b() == b.b()
}

/// Reduce the HSL lightness of `color` by `amount` (0.0-1.0), keeping hue,
/// saturation and alpha.
pub fn darken(color: Color32, amount: f32) -> Color32 {
    let (h, s, l) = rgb_to_hsl(color);
    let (r, g, b) = hsl_to_rgb(h, s, (l - amount).clamp(0.0, 1.0));
    Color32::from_rgba_unmultiplied(r, g, b, color.a())
}

/// Convert to hue, saturation, lightness, each in 0.0-1.0.
pub fn rgb_to_hsl(color: Color32) -> (f32, f32, f32) {
    let r = color.r() as f32 / 255.0;
    let g = color.g() as f32 / 255.0;
    let b = color.b() as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h / 6.0, s, l)
}

/// Convert hue, saturation, lightness (each 0.0-1.0) to RGB bytes.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (u8, u8, u8) {
    let to_byte = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;

    if s == 0.0 {
        let v = to_byte(l);
        return (v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let channel = |t: f32| {
        let t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };

    (
        to_byte(channel(h + 1.0 / 3.0)),
        to_byte(channel(h)),
        to_byte(channel(h - 1.0 / 3.0)),
    )
}
