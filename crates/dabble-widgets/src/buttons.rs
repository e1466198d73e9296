//! Buttons and the brush size preview.

use egui::{vec2, Align2, Color32, CornerRadius, CursorIcon, FontId, Pos2, Sense, Stroke, Ui};

use crate::colors::darken;
use crate::{sizing, theme};

/// The top-right share button: a large pale-goldenrod button with an
/// uppercase label.
pub struct ShareButton<'a> {
    label: &'a str,
    tooltip: Option<&'a str>,
    enabled: bool,
}

impl<'a> Default for ShareButton<'a> {
    fn default() -> Self {
        Self::new("Share")
    }
}

impl<'a> ShareButton<'a> {
    /// Create a share button; the label is shown uppercase.
    pub fn new(label: &'a str) -> Self {
        Self {
            label,
            tooltip: None,
            enabled: true,
        }
    }

    /// Set hover text.
    pub fn tooltip(mut self, tooltip: &'a str) -> Self {
        self.tooltip = Some(tooltip);
        self
    }

    /// Disabled buttons are drawn muted and never report clicks.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Show the button and return true if clicked.
    pub fn show(self, ui: &mut Ui) -> bool {
        let size = vec2(sizing::SHARE_WIDTH, sizing::SHARE_HEIGHT);
        let (rect, response) = ui.allocate_exact_size(size, Sense::click());

        if ui.is_rect_visible(rect) {
            let fill = if !self.enabled {
                Color32::from_gray(235)
            } else if response.hovered() {
                darken(theme::PALE_GOLDENROD, 0.05)
            } else {
                theme::PALE_GOLDENROD
            };
            let radius = CornerRadius::same(sizing::CORNER_RADIUS);
            ui.painter().rect_filled(rect, radius, fill);
            ui.painter().rect_stroke(
                rect,
                radius,
                Stroke::new(1.0, Color32::from_gray(120)),
                egui::StrokeKind::Inside,
            );

            let text_color = if self.enabled {
                theme::TEXT
            } else {
                theme::TEXT_MUTED
            };
            ui.painter().text(
                rect.center(),
                Align2::CENTER_CENTER,
                self.label.to_uppercase(),
                FontId::proportional(15.0),
                text_color,
            );
        }

        let clicked = self.enabled && response.clicked();
        let response = if self.enabled {
            response.on_hover_cursor(CursorIcon::PointingHand)
        } else {
            response
        };
        if let Some(tooltip) = self.tooltip {
            response.on_hover_text(tooltip);
        }
        clicked
    }
}

/// A white circle showing the brush at its real size.
pub struct BrushPreview {
    radius: f32,
    max_radius: f32,
}

impl BrushPreview {
    /// Preview a brush of the given radius.
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            max_radius: radius,
        }
    }

    /// Reserve room for the largest radius so the layout does not jump
    /// while the slider moves.
    pub fn max_radius(mut self, max_radius: f32) -> Self {
        self.max_radius = max_radius.max(self.radius);
        self
    }

    /// Show the preview.
    pub fn show(self, ui: &mut Ui) {
        let side = self.max_radius * 2.0 + 2.0;
        let (rect, _response) = ui.allocate_exact_size(vec2(side, side), Sense::hover());

        if ui.is_rect_visible(rect) {
            let center: Pos2 = rect.center();
            ui.painter().circle_filled(center, self.radius, Color32::WHITE);
            ui.painter()
                .circle_stroke(center, self.radius, Stroke::new(1.0, Color32::GRAY));
        }
    }
}

/// A plain text button.
pub struct TextButton<'a> {
    label: &'a str,
}

impl<'a> TextButton<'a> {
    /// Create a new text button.
    pub fn new(label: &'a str) -> Self {
        Self { label }
    }

    /// Show the button and return true if clicked.
    pub fn show(self, ui: &mut Ui) -> bool {
        let size = vec2(0.0, 24.0);
        let (rect, response) = ui.allocate_at_least(size, Sense::click());

        if ui.is_rect_visible(rect) {
            let bg_color = if response.hovered() {
                theme::HOVER_BG
            } else {
                Color32::TRANSPARENT
            };

            ui.painter()
                .rect_filled(rect, CornerRadius::same(sizing::CORNER_RADIUS), bg_color);
            ui.painter().text(
                Pos2::new(rect.left() + 8.0, rect.center().y),
                Align2::LEFT_CENTER,
                self.label,
                FontId::proportional(12.0),
                theme::TEXT,
            );
        }

        let clicked = response.clicked();
        response.on_hover_cursor(CursorIcon::PointingHand);
        clicked
    }
}
