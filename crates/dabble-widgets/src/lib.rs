//! Reusable egui widget components for the Dabble drawing pad.
//!
//! - **Buttons**: share button, text buttons, brush size preview
//! - **Colors**: palette swatches and HSL helpers
//! - **Panel**: floating panel frames

pub mod buttons;
pub mod colors;
pub mod panel;

pub use buttons::{BrushPreview, ShareButton, TextButton};
pub use colors::{colors_match, darken, hsl_to_rgb, rgb_to_hsl, ColorSwatch};
pub use panel::{bare_frame, panel_frame};

/// Standard sizing constants used across widgets.
pub mod sizing {
    /// Palette swatch side length
    pub const SWATCH: f32 = 50.0;
    /// Palette swatch corner radius
    pub const SWATCH_RADIUS: u8 = 3;
    /// Gap between swatches
    pub const SWATCH_SPACING: f32 = 4.0;
    /// Share button size
    pub const SHARE_WIDTH: f32 = 100.0;
    pub const SHARE_HEIGHT: f32 = 60.0;
    /// Width of the brush size row
    pub const BRUSH_ROW_WIDTH: f32 = 300.0;
    /// Standard corner radius
    pub const CORNER_RADIUS: u8 = 4;
    /// Panel corner radius
    pub const PANEL_RADIUS: u8 = 8;
}

/// Standard colors used across widgets.
pub mod theme {
    use egui::Color32;

    /// Text color (dark gray)
    pub const TEXT: Color32 = Color32::from_rgb(60, 60, 60);
    /// Muted text color
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(120, 120, 120);
    /// Border color
    pub const BORDER: Color32 = Color32::from_rgb(220, 220, 220);
    /// Hover background
    pub const HOVER_BG: Color32 = Color32::from_rgb(245, 245, 245);
    /// Panel background
    pub const PANEL_BG: Color32 = Color32::from_rgba_premultiplied(250, 250, 252, 230);
    /// Share button fill (CSS `palegoldenrod`)
    pub const PALE_GOLDENROD: Color32 = Color32::from_rgb(238, 232, 170);
}
