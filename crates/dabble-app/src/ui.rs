//! UI components using egui.

use dabble_core::brush::{BrushColor, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE, PALETTE};
use dabble_core::sync::ConnectionState;
use dabble_widgets::{
    bare_frame, colors_match, panel_frame, sizing, theme, BrushPreview, ColorSwatch, ShareButton,
    TextButton,
};
use egui::{Align2, Color32, Context, RichText, Vec2};

/// Seconds the control panel takes to fade out or back in.
const FADE_SECONDS: f32 = 0.3;
/// Distance of the floating panels from the window edges.
const MARGIN: f32 = 10.0;

/// UI state that persists across frames.
#[derive(Debug, Clone)]
pub struct UiState {
    /// Brush radius shown on the slider.
    pub brush_size: f64,
    /// Currently selected palette color.
    pub color: BrushColor,
    /// Whether a stroke is in progress (the controls fade out).
    pub drawing: bool,
    /// Relay connection state.
    pub connection_state: ConnectionState,
    /// Session the drawing is shared in.
    pub session: Option<String>,
    /// Other participants in the session.
    pub peer_count: usize,
    /// Last error reported by the relay or the connection.
    pub last_error: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            brush_size: dabble_core::brush::DEFAULT_BRUSH_SIZE,
            color: PALETTE[0],
            drawing: false,
            connection_state: ConnectionState::Disconnected,
            session: None,
            peer_count: 0,
            last_error: None,
        }
    }
}

impl UiState {
    /// Whether sharing has started or completed.
    pub fn is_shared(&self) -> bool {
        self.session.is_some()
    }
}

/// Actions that can be triggered by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    /// Change the brush radius.
    SetBrushSize(f64),
    /// Change the brush color.
    SetColor(BrushColor),
    /// Share the drawing in a new session.
    Share,
    /// Export the drawing as PNG file.
    ExportPng,
}

/// Convert a palette color for egui.
pub fn to_color32(color: BrushColor) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

/// Render all UI and return any triggered action.
pub fn render_ui(ctx: &Context, ui_state: &mut UiState) -> Option<UiAction> {
    let share_action = render_share_panel(ctx, ui_state);
    let controls_action = render_controls(ctx, ui_state);
    share_action.or(controls_action)
}

/// Top-right share button with session status below it.
fn render_share_panel(ctx: &Context, ui_state: &UiState) -> Option<UiAction> {
    let mut action = None;

    egui::Area::new(egui::Id::new("share_panel"))
        .anchor(Align2::RIGHT_TOP, Vec2::new(-23.0, 20.0))
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            bare_frame().show(ui, |ui| {
                ui.vertical(|ui| {
                    let connecting = ui_state.connection_state == ConnectionState::Connecting;
                    let tooltip = if ui_state.is_shared() {
                        "Already shared"
                    } else {
                        "Share this drawing"
                    };
                    if ShareButton::new("Share")
                        .tooltip(tooltip)
                        .enabled(!ui_state.is_shared() && !connecting)
                        .show(ui)
                    {
                        action = Some(UiAction::Share);
                    }

                    if let Some(session) = &ui_state.session {
                        ui.label(
                            RichText::new(format!("/{}", session))
                                .size(10.0)
                                .color(theme::TEXT_MUTED),
                        );
                        let peers = match ui_state.peer_count {
                            1 => "1 other viewer".to_string(),
                            n => format!("{} other viewers", n),
                        };
                        ui.label(RichText::new(peers).size(10.0).color(theme::TEXT_MUTED));
                    } else if connecting {
                        ui.label(RichText::new("Connecting...").size(10.0).color(theme::TEXT_MUTED));
                    }

                    if let Some(error) = &ui_state.last_error {
                        ui.label(
                            RichText::new(error)
                                .size(10.0)
                                .color(Color32::from_rgb(220, 38, 38)),
                        );
                    }
                });
            });
        });

    action
}

/// Bottom-left brush controls. Fades out while drawing.
fn render_controls(ctx: &Context, ui_state: &mut UiState) -> Option<UiAction> {
    let opacity = ctx.animate_bool_with_time(
        egui::Id::new("controls_fade"),
        !ui_state.drawing,
        FADE_SECONDS,
    );
    if opacity <= 0.0 {
        return None;
    }

    let mut action = None;

    egui::Area::new(egui::Id::new("controls"))
        .anchor(Align2::LEFT_BOTTOM, Vec2::new(MARGIN, -MARGIN))
        .interactable(!ui_state.drawing)
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            ui.set_opacity(opacity);
            panel_frame().show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.horizontal(|ui| {
                        ui.set_width(sizing::BRUSH_ROW_WIDTH);
                        ui.spacing_mut().item_spacing = Vec2::new(12.0, 0.0);

                        let mut size = ui_state.brush_size;
                        let slider = egui::Slider::new(&mut size, MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE)
                            .step_by(1.0)
                            .show_value(false);
                        if ui.add(slider).changed() {
                            ui_state.brush_size = size;
                            action = Some(UiAction::SetBrushSize(size));
                        }
                        ui.label(RichText::new("Brush Size").color(theme::TEXT));
                        BrushPreview::new(ui_state.brush_size as f32)
                            .max_radius(MAX_BRUSH_SIZE as f32)
                            .show(ui);
                    });

                    ui.horizontal(|ui| {
                        ui.spacing_mut().item_spacing = Vec2::new(sizing::SWATCH_SPACING, 0.0);
                        for color in PALETTE {
                            let swatch = to_color32(color);
                            let hex = color.to_hex();
                            let selected = colors_match(swatch, to_color32(ui_state.color));
                            let (clicked, _) = ColorSwatch::new(swatch, &hex).selected(selected).show(ui);
                            if clicked {
                                ui_state.color = color;
                                action = Some(UiAction::SetColor(color));
                            }
                        }
                    });

                    if TextButton::new("Export PNG").show(ui) {
                        action = Some(UiAction::ExportPng);
                    }
                });
            });
        });

    action
}
